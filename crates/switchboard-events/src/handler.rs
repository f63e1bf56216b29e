//! Handler registration types

use crate::error::BoxError;
use crate::event::Event;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Result returned by an event handler
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Something that reacts to events
///
/// Closures are registered through [`EventBus::subscribe`](crate::EventBus::subscribe);
/// implement this trait directly for handlers that carry their own state.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event
    async fn handle(&self, event: Event) -> HandlerResult;
}

/// Adapter turning an async closure into an [`EventHandler`]
pub(crate) struct FnHandler<F>(pub(crate) F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, event: Event) -> HandlerResult {
        (self.0)(event).await
    }
}

/// Unique handler registration token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId(Uuid);

impl HandlerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Subscription options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Remove the handler after its first dispatch
    pub once: bool,

    /// Higher priorities run first
    pub priority: i32,
}

impl SubscribeOptions {
    /// Options for a one-shot handler
    pub fn once() -> Self {
        Self {
            once: true,
            priority: 0,
        }
    }

    /// Options with the given priority
    pub fn priority(priority: i32) -> Self {
        Self {
            once: false,
            priority,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark the handler as one-shot
    pub fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }
}

/// Entry in the registration table
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) id: HandlerId,
    pub(crate) once: bool,
    pub(crate) priority: i32,
    /// Global registration sequence, breaks priority ties
    pub(crate) seq: u64,
    pub(crate) handler: Arc<dyn EventHandler>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("once", &self.once)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_options() {
        let options = SubscribeOptions::default();
        assert!(!options.once);
        assert_eq!(options.priority, 0);

        let options = SubscribeOptions::once().with_priority(5);
        assert!(options.once);
        assert_eq!(options.priority, 5);

        assert_eq!(SubscribeOptions::priority(-3).priority, -3);
    }

    #[test]
    fn test_handler_ids_are_unique() {
        assert_ne!(HandlerId::new(), HandlerId::new());
    }
}
