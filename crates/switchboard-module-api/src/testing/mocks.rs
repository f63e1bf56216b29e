//! Mock implementations for testing

use crate::context::ModuleContext;
use crate::error::{ModuleError, Result};
use crate::module::Module;
use crate::route::RouteDescriptor;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_events::EventBus;

/// Lifecycle hook identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// `pre_initialize`
    PreInitialize,
    /// `initialize`
    Initialize,
    /// `post_initialize`
    PostInitialize,
    /// `pre_cleanup`
    PreCleanup,
    /// `cleanup`
    Cleanup,
    /// `post_cleanup`
    PostCleanup,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::PreInitialize => "pre_initialize",
            Hook::Initialize => "initialize",
            Hook::PostInitialize => "post_initialize",
            Hook::PreCleanup => "pre_cleanup",
            Hook::Cleanup => "cleanup",
            Hook::PostCleanup => "post_cleanup",
        };
        f.write_str(name)
    }
}

/// Observation point shared by every [`MockModule`] built from it
///
/// A probe outlives individual instances, so tests can follow a module
/// across reloads.
#[derive(Debug, Default)]
pub struct MockProbe {
    calls: Mutex<Vec<Hook>>,
    fail_on: Mutex<Option<Hook>>,
    spawn_task: AtomicBool,
    created: AtomicUsize,
    live: AtomicUsize,
}

impl MockProbe {
    /// Create a new probe
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the given hook fail from now on
    pub fn fail_on(&self, hook: Hook) {
        *self.fail_on.lock() = Some(hook);
    }

    /// Stop failing hooks
    pub fn clear_failure(&self) {
        *self.fail_on.lock() = None;
    }

    /// Start a background task during `initialize`
    pub fn spawn_background_task(&self, enabled: bool) {
        self.spawn_task.store(enabled, Ordering::SeqCst);
    }

    /// Hooks called so far, in order
    pub fn calls(&self) -> Vec<Hook> {
        self.calls.lock().clone()
    }

    /// Number of times `hook` ran
    pub fn count(&self, hook: Hook) -> usize {
        self.calls.lock().iter().filter(|h| **h == hook).count()
    }

    /// Instances constructed
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Instances initialized and not yet cleaned up
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn record(&self, hook: Hook) -> Result<()> {
        self.calls.lock().push(hook);
        if *self.fail_on.lock() == Some(hook) {
            return Err(ModuleError::runtime(format!("{hook} failed")));
        }
        Ok(())
    }
}

/// Mock module for testing
#[derive(Debug)]
pub struct MockModule {
    ctx: ModuleContext,
    probe: Arc<MockProbe>,
}

impl MockModule {
    /// Create a new mock module reporting to `probe`
    pub fn new(name: impl Into<String>, bus: EventBus, probe: Arc<MockProbe>) -> Self {
        probe.created.fetch_add(1, Ordering::SeqCst);
        Self {
            ctx: ModuleContext::new(name, bus),
            probe,
        }
    }

    /// Probe this module reports to
    pub fn probe(&self) -> &Arc<MockProbe> {
        &self.probe
    }
}

#[async_trait]
impl Module for MockModule {
    fn context(&self) -> &ModuleContext {
        &self.ctx
    }

    async fn pre_initialize(&self) -> Result<()> {
        self.probe.record(Hook::PreInitialize)
    }

    async fn initialize(&self) -> Result<()> {
        self.probe.record(Hook::Initialize)?;

        self.ctx
            .subscribe(format!("{}.ping", self.ctx.name()), |_| async { Ok(()) });

        if self.probe.spawn_task.load(Ordering::SeqCst) {
            self.ctx.spawn(async {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            });
        }

        self.probe.live.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn post_initialize(&self) -> Result<()> {
        self.probe.record(Hook::PostInitialize)
    }

    async fn pre_cleanup(&self) -> Result<()> {
        self.probe.record(Hook::PreCleanup)
    }

    async fn cleanup(&self) -> Result<()> {
        self.probe.record(Hook::Cleanup)?;
        self.ctx.shutdown().await;
        // Saturating so a cleanup after a failed initialize stays at zero
        let _ = self
            .probe
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        Ok(())
    }

    async fn post_cleanup(&self) -> Result<()> {
        self.probe.record(Hook::PostCleanup)
    }

    fn routes(&self) -> Vec<RouteDescriptor> {
        vec![RouteDescriptor::get("/status")]
    }
}
