//! # Switchboard Events
//!
//! In-process publish/subscribe for the Switchboard module host.
//!
//! ## Features
//!
//! - **Pattern subscriptions**: exact event types or `*` / `?` globs
//! - **Deterministic dispatch**: descending priority, ties in registration order
//! - **One-shot handlers**: removed after their first dispatch
//! - **Request/response**: correlation ids and private response types
//! - **Distributed relay**: optional fan-out across processes, degrading to
//!   local-only delivery when the relay is unavailable
//!
//! ## Example
//!
//! ```rust
//! use switchboard_events::{payload, EventBus, SubscribeOptions};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//!
//! bus.subscribe_with("module.*", SubscribeOptions::priority(10), |event| async move {
//!     tracing::info!(event_type = %event.event_type(), "Module event");
//!     Ok(())
//! });
//!
//! bus.start().await;
//! bus.publish("module.loaded", payload(serde_json::json!({"module_name": "system_info"})))
//!     .await;
//! bus.stop().await;
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod bus;
pub mod error;
pub mod event;
pub mod handler;
pub mod pattern;
pub mod relay;

#[cfg(feature = "redis-relay")]
pub mod redis_relay;

pub use bus::{BusStats, EventBus, EventBusBuilder, DEFAULT_CHANNEL_PREFIX, RESPONSE_MARKER};
pub use error::{BoxError, BusError, Result};
pub use event::{payload, Event, Payload};
pub use handler::{EventHandler, HandlerId, HandlerResult, SubscribeOptions};
pub use pattern::Pattern;
pub use relay::{EventRelay, MemoryRelay, RelayMessage, RelaySubscription};

#[cfg(feature = "redis-relay")]
pub use redis_relay::RedisRelay;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::bus::EventBus;
    pub use crate::error::{BoxError, BusError};
    pub use crate::event::{payload, Event, Payload};
    pub use crate::handler::{EventHandler, HandlerId, HandlerResult, SubscribeOptions};
}
