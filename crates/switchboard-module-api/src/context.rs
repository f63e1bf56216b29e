//! Per-instance module bookkeeping
//!
//! Every module owns one [`ModuleContext`]. It carries the bus handle, the
//! lifecycle state the host assigns, declared dependency edges, and the scoped
//! resources (background tasks and bus subscriptions) that base cleanup tears
//! down.

use crate::state::ModuleState;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use switchboard_events::{Event, EventBus, HandlerId, HandlerResult, SubscribeOptions};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Shared state and scoped resources of one module instance
pub struct ModuleContext {
    name: String,
    bus: EventBus,
    state: RwLock<ModuleState>,
    dependencies: RwLock<BTreeSet<String>>,
    dependents: RwLock<BTreeSet<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<(String, HandlerId)>>,
}

impl ModuleContext {
    /// Create a context for the module `name`
    pub fn new(name: impl Into<String>, bus: EventBus) -> Self {
        Self {
            name: name.into(),
            bus,
            state: RwLock::new(ModuleState::Unloaded),
            dependencies: RwLock::new(BTreeSet::new()),
            dependents: RwLock::new(BTreeSet::new()),
            tasks: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event bus handle
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModuleState {
        *self.state.read()
    }

    /// Set the lifecycle state
    ///
    /// Called by the host while it drives transitions.
    pub fn set_state(&self, state: ModuleState) {
        *self.state.write() = state;
    }

    /// Declare a dependency on another module
    pub fn add_dependency(&self, name: impl Into<String>) {
        self.dependencies.write().insert(name.into());
    }

    /// Forget a dependency, returning whether it was declared
    pub fn remove_dependency(&self, name: &str) -> bool {
        self.dependencies.write().remove(name)
    }

    /// Record a module that depends on this one
    pub fn add_dependent(&self, name: impl Into<String>) {
        self.dependents.write().insert(name.into());
    }

    /// Forget a dependent, returning whether it was present
    pub fn remove_dependent(&self, name: &str) -> bool {
        self.dependents.write().remove(name)
    }

    /// Copy of the declared dependencies
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.dependencies.read().clone()
    }

    /// Copy of the recorded dependents
    pub fn dependents(&self) -> BTreeSet<String> {
        self.dependents.read().clone()
    }

    /// Hand a background task to the context so cleanup cancels it
    pub fn schedule_cleanup_task(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Spawn a future on the runtime and schedule it for cleanup
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.schedule_cleanup_task(tokio::spawn(future));
    }

    /// Number of scheduled tasks that have not finished
    pub fn pending_task_count(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    /// Subscribe on the bus on behalf of this module
    ///
    /// The subscription is released by [`release_subscriptions`](Self::release_subscriptions).
    pub fn subscribe<F, Fut>(&self, pattern: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe_with(pattern, SubscribeOptions::default(), handler)
    }

    /// Subscribe with explicit options on behalf of this module
    pub fn subscribe_with<F, Fut>(
        &self,
        pattern: impl Into<String>,
        options: SubscribeOptions,
        handler: F,
    ) -> HandlerId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let pattern = pattern.into();
        let id = self.bus.subscribe_with(pattern.clone(), options, handler);
        self.subscriptions.lock().push((pattern, id));
        id
    }

    /// Number of bus subscriptions held for this module
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Remove every bus subscription made through this context
    pub fn release_subscriptions(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for (pattern, id) in subscriptions {
            self.bus.unsubscribe(&pattern, Some(id));
        }
    }

    /// Abort every scheduled task and wait for each to finish
    ///
    /// Cancellation is expected and swallowed. A task that panicked is logged.
    pub async fn cancel_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        if tasks.is_empty() {
            return;
        }

        debug!(module = %self.name, count = tasks.len(), "Cancelling module tasks");

        for task in &tasks {
            task.abort();
        }

        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(module = %self.name, error = %e, "Module task panicked");
                }
            }
        }
    }

    /// Release subscriptions and cancel tasks
    pub async fn shutdown(&self) {
        self.release_subscriptions();
        self.cancel_tasks().await;
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("dependencies", &self.dependencies())
            .field("dependents", &self.dependents())
            .field("pending_tasks", &self.pending_task_count())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
