//! Distributed relay abstraction
//!
//! A relay fans events out across process boundaries. The bus publishes every
//! non-local event to `<prefix><event_type>` and ingests everything matching
//! `<prefix>*`. [`MemoryRelay`] connects buses inside one process; the Redis
//! relay (feature `redis-relay`) connects processes.

use crate::error::{BusError, Result};
use crate::pattern::Pattern;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Message carried by a relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    /// Channel the message was published to
    pub channel: String,

    /// Encoded payload
    pub payload: String,
}

/// Transport that carries events between buses
#[async_trait]
pub trait EventRelay: Send + Sync + fmt::Debug {
    /// Publish a message on a channel
    async fn publish(&self, channel: &str, payload: String) -> Result<()>;

    /// Subscribe to every channel matching a glob pattern
    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn RelaySubscription>>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Live relay subscription
#[async_trait]
pub trait RelaySubscription: Send + fmt::Debug {
    /// Wait for the next message
    ///
    /// Returns `None` once the subscription is closed. Must be cancel safe.
    async fn next_message(&mut self) -> Option<RelayMessage>;

    /// Close the subscription
    async fn close(&mut self) -> Result<()>;
}

/// In-process relay backed by a broadcast channel
#[derive(Clone)]
pub struct MemoryRelay {
    sender: broadcast::Sender<RelayMessage>,
    available: Arc<AtomicBool>,
    published: Arc<AtomicUsize>,
}

impl fmt::Debug for MemoryRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRelay")
            .field("available", &self.is_available())
            .field("published", &self.published_count())
            .finish()
    }
}

impl MemoryRelay {
    /// Create a new in-memory relay
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new in-memory relay with a message buffer of the given size
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            available: Arc::new(AtomicBool::new(true)),
            published: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate the relay going away or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether the relay currently accepts operations
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of messages published through this relay
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(BusError::relay_unavailable("memory relay is offline"))
        }
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventRelay for MemoryRelay {
    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        self.ensure_available()?;
        self.published.fetch_add(1, Ordering::SeqCst);

        // No subscribers is not an error for a pub/sub channel
        let _ = self.sender.send(RelayMessage {
            channel: channel.to_string(),
            payload,
        });

        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn RelaySubscription>> {
        self.ensure_available()?;

        Ok(Box::new(MemorySubscription {
            receiver: Some(self.sender.subscribe()),
            pattern: Pattern::new(pattern),
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }
}

#[derive(Debug)]
struct MemorySubscription {
    receiver: Option<broadcast::Receiver<RelayMessage>>,
    pattern: Pattern,
}

#[async_trait]
impl RelaySubscription for MemorySubscription {
    async fn next_message(&mut self) -> Option<RelayMessage> {
        let receiver = self.receiver.as_mut()?;

        loop {
            match receiver.recv().await {
                Ok(message) if self.pattern.matches(&message.channel) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Memory relay subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.receiver = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_relay_filters_by_pattern() {
        let relay = MemoryRelay::new();
        let mut sub = relay.subscribe("dashboard:*").await.unwrap();

        relay.publish("other:x", "1".into()).await.unwrap();
        relay.publish("dashboard:x", "2".into()).await.unwrap();

        let message = sub.next_message().await.unwrap();
        assert_eq!(message.channel, "dashboard:x");
        assert_eq!(message.payload, "2");
        assert_eq!(relay.published_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_relay_offline() {
        let relay = MemoryRelay::new();
        relay.set_available(false);

        assert!(relay.ping().await.is_err());
        assert!(relay.subscribe("*").await.is_err());
        assert!(matches!(
            relay.publish("a", String::new()).await,
            Err(BusError::RelayUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_subscription_yields_none() {
        let relay = MemoryRelay::new();
        let mut sub = relay.subscribe("*").await.unwrap();
        sub.close().await.unwrap();
        assert!(sub.next_message().await.is_none());
    }
}
