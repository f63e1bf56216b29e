//! # Switchboard Runtime
//!
//! Lifecycle management for Switchboard modules.
//!
//! ## Features
//!
//! - **Discovery**: one directory per module, each with an entry-point manifest
//! - **Lifecycle Management**: load, unload, reload with per-name records
//! - **Dependency Safety**: unloading a module others depend on needs `force`
//! - **Hot Reload**: entry-point changes trigger reloads without a restart
//! - **Bus Control**: `module.*` command events drive the manager remotely
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use switchboard_events::EventBus;
//! use switchboard_runtime::{ModuleManager, StaticModuleSource};
//!
//! # async fn example() -> switchboard_runtime::Result<()> {
//! let bus = EventBus::new();
//! bus.start().await;
//!
//! // Factories are registered at build time, entry points select them by name
//! let source = StaticModuleSource::new();
//! let manager = ModuleManager::new(bus.clone(), Arc::new(source));
//!
//! manager.discover_and_load_all(Path::new("modules")).await?;
//! manager.reload("system_info", false).await?;
//! manager.unload_all(true).await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod control;
pub mod error;
pub mod hot_reload;
pub mod manager;
pub mod record;
pub mod source;

pub use error::{Result, RuntimeError};
pub use hot_reload::HotReloadWatcher;
pub use manager::{
    events, BatchResults, ManagerOptions, ModuleManager, Outcome, DEFAULT_ENTRY_POINT,
    DEFAULT_RESERVED_PREFIX,
};
pub use record::{DependencyGraph, ManagerStats, ModuleListing, ModuleRecord};
pub use source::{FactoryContext, ModuleFactory, ModuleManifest, ModuleSource, StaticModuleSource};

// Re-export module API types for convenience
pub use switchboard_module_api::{
    Module, ModuleContext, ModuleError, ModuleInfo, ModuleState, RouteDescriptor,
};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::error::{Result, RuntimeError};
    pub use crate::manager::{ModuleManager, Outcome};
    pub use crate::source::{FactoryContext, ModuleSource, StaticModuleSource};
    pub use switchboard_module_api::prelude::*;
}
