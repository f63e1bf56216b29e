//! Redis relay implementation

use crate::error::Result;
use crate::relay::{EventRelay, RelayMessage, RelaySubscription};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, trace, warn};

/// Relay over Redis pub/sub
///
/// Publishing goes through a shared connection manager; every subscription
/// opens its own pub/sub connection with a pattern subscription.
#[derive(Clone)]
pub struct RedisRelay {
    client: redis::Client,
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRelay")
            .field("addr", &self.client.get_connection_info().addr)
            .finish()
    }
}

impl RedisRelay {
    /// Connect to Redis
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;

        debug!(url, "Redis relay connected");

        Ok(Self { client, conn })
    }
}

#[async_trait]
impl EventRelay for RedisRelay {
    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        trace!(channel, "Redis PUBLISH");

        let mut conn = self.conn.clone();
        let _receivers: i64 = conn.publish(channel, payload).await?;

        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn RelaySubscription>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;

        debug!(pattern, "Redis PSUBSCRIBE");

        Ok(Box::new(RedisSubscription {
            stream: Some(pubsub.into_on_message().boxed()),
        }))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

struct RedisSubscription {
    stream: Option<BoxStream<'static, redis::Msg>>,
}

impl std::fmt::Debug for RedisSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSubscription")
            .field("open", &self.stream.is_some())
            .finish()
    }
}

#[async_trait]
impl RelaySubscription for RedisSubscription {
    async fn next_message(&mut self) -> Option<RelayMessage> {
        let stream = self.stream.as_mut()?;

        loop {
            let msg = stream.next().await?;
            match msg.get_payload::<String>() {
                Ok(payload) => {
                    return Some(RelayMessage {
                        channel: msg.get_channel_name().to_string(),
                        payload,
                    })
                }
                Err(e) => {
                    warn!(channel = %msg.get_channel_name(), error = %e, "Dropping non-text Redis message");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the stream closes the pub/sub connection
        self.stream = None;
        Ok(())
    }
}
