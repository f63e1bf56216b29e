//! # Switchboard Module API
//!
//! SDK for writing modules hosted by the Switchboard runtime.
//!
//! A module is a unit of behavior with a lifecycle. The host constructs it
//! through a factory, runs its initialization hooks, serves its routes, and
//! later runs its cleanup hooks on unload or reload. Modules talk to each other
//! only through the [`EventBus`](switchboard_events::EventBus).
//!
//! ## Example
//!
//! ```rust,no_run
//! use switchboard_module_api::prelude::*;
//!
//! #[derive(Debug)]
//! struct Greeter {
//!     ctx: ModuleContext,
//! }
//!
//! #[async_trait]
//! impl Module for Greeter {
//!     fn context(&self) -> &ModuleContext {
//!         &self.ctx
//!     }
//!
//!     async fn initialize(&self) -> Result<(), ModuleError> {
//!         self.ctx.subscribe("greeter.hello", |event| async move {
//!             tracing::info!(payload = ?event.payload(), "Hello received");
//!             Ok(())
//!         });
//!         Ok(())
//!     }
//!
//!     fn routes(&self) -> Vec<RouteDescriptor> {
//!         vec![RouteDescriptor::get("/hello")]
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod error;
pub mod module;
pub mod route;
pub mod state;

#[cfg(feature = "testing")]
pub mod testing;

// Re-export commonly used types
pub use context::ModuleContext;
pub use error::{ModuleError, Result};
pub use module::{Module, ModuleInfo};
pub use route::RouteDescriptor;
pub use state::ModuleState;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::context::ModuleContext;
    pub use crate::error::ModuleError;
    pub use crate::module::{Module, ModuleInfo};
    pub use crate::route::RouteDescriptor;
    pub use crate::state::ModuleState;
    pub use async_trait::async_trait;
    pub use switchboard_events::{payload, Event, EventBus, Payload};
}
