//! Core module trait and types

use crate::context::ModuleContext;
use crate::error::Result;
use crate::route::RouteDescriptor;
use crate::state::ModuleState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use switchboard_events::EventBus;
use tokio::task::JoinHandle;

/// Capability contract every module implements
///
/// The host drives the hooks in this order:
///
/// - load: `pre_initialize → initialize → post_initialize`
/// - unload: `pre_cleanup → cleanup → post_cleanup`
///
/// Only [`initialize`](Self::initialize), [`routes`](Self::routes) and
/// [`context`](Self::context) are required. Bus handlers should be registered
/// through [`ModuleContext::subscribe`] and background work through
/// [`ModuleContext::spawn`] so the default [`cleanup`](Self::cleanup) can
/// release them.
#[async_trait]
pub trait Module: Send + Sync + fmt::Debug {
    /// Per-instance bookkeeping
    fn context(&self) -> &ModuleContext;

    /// Module name (unique within a host)
    fn name(&self) -> &str {
        self.context().name()
    }

    /// Event bus the module was created with
    fn bus(&self) -> &EventBus {
        self.context().bus()
    }

    /// Runs before [`initialize`](Self::initialize)
    async fn pre_initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Acquire resources, subscribe to events, start background tasks
    async fn initialize(&self) -> Result<()>;

    /// Runs after [`initialize`](Self::initialize)
    async fn post_initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Runs before [`cleanup`](Self::cleanup)
    async fn pre_cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources
    ///
    /// The default drops the module's bus subscriptions, then cancels every
    /// scheduled task and awaits it. Overrides should call
    /// `self.context().shutdown().await` as well.
    async fn cleanup(&self) -> Result<()> {
        self.context().shutdown().await;
        Ok(())
    }

    /// Runs after [`cleanup`](Self::cleanup)
    async fn post_cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Routes exposed to the transport layer, in order
    fn routes(&self) -> Vec<RouteDescriptor>;

    /// Declare a dependency on another module
    fn add_dependency(&self, name: &str) {
        self.context().add_dependency(name);
    }

    /// Record a module that depends on this one
    fn add_dependent(&self, name: &str) {
        self.context().add_dependent(name);
    }

    /// Declared dependencies
    fn dependencies(&self) -> BTreeSet<String> {
        self.context().dependencies()
    }

    /// Recorded dependents
    fn dependents(&self) -> BTreeSet<String> {
        self.context().dependents()
    }

    /// Hand a task to the module so cleanup cancels it
    fn schedule_cleanup_task(&self, task: JoinHandle<()>) {
        self.context().schedule_cleanup_task(task);
    }

    /// Runtime snapshot
    fn info(&self) -> ModuleInfo {
        let ctx = self.context();
        ModuleInfo {
            name: self.name().to_string(),
            state: ctx.state(),
            route_count: self.routes().len(),
            dependencies: ctx.dependencies(),
            dependents: ctx.dependents(),
            pending_task_count: ctx.pending_task_count(),
        }
    }
}

/// Module information (runtime state)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module name
    pub name: String,

    /// Lifecycle state
    pub state: ModuleState,

    /// Number of routes
    pub route_count: usize,

    /// Declared dependencies
    pub dependencies: BTreeSet<String>,

    /// Recorded dependents
    pub dependents: BTreeSet<String>,

    /// Scheduled tasks still running
    pub pending_task_count: usize,
}
