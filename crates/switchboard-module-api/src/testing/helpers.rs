//! Test harness for module lifecycle testing

use crate::error::Result;
use crate::module::Module;
use crate::state::ModuleState;
use std::sync::Arc;

/// Drives a module through its hooks the way the host does
#[derive(Debug)]
pub struct ModuleTestHarness {
    module: Arc<dyn Module>,
}

impl ModuleTestHarness {
    /// Wrap a module instance
    pub fn new(module: Arc<dyn Module>) -> Self {
        module.context().set_state(ModuleState::Loaded);
        Self { module }
    }

    /// The module under test
    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModuleState {
        self.module.context().state()
    }

    /// Run `pre_initialize → initialize → post_initialize`
    pub async fn initialize(&self) -> Result<()> {
        let ctx = self.module.context();
        ctx.set_state(ModuleState::Initializing);

        let outcome = async {
            self.module.pre_initialize().await?;
            self.module.initialize().await?;
            self.module.post_initialize().await
        }
        .await;

        ctx.set_state(match outcome {
            Ok(()) => ModuleState::Ready,
            Err(_) => ModuleState::Error,
        });
        outcome
    }

    /// Run `pre_cleanup → cleanup → post_cleanup`
    pub async fn cleanup(&self) -> Result<()> {
        let ctx = self.module.context();
        ctx.set_state(ModuleState::Unloading);

        let outcome = async {
            self.module.pre_cleanup().await?;
            self.module.cleanup().await?;
            self.module.post_cleanup().await
        }
        .await;

        ctx.set_state(match outcome {
            Ok(()) => ModuleState::Unloaded,
            Err(_) => ModuleState::Error,
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Hook, MockModule, MockProbe};
    use switchboard_events::EventBus;

    #[tokio::test]
    async fn test_harness_lifecycle() {
        let probe = MockProbe::new();
        let module = MockModule::new("mock", EventBus::new(), probe.clone());
        let harness = ModuleTestHarness::new(Arc::new(module));
        assert_eq!(harness.state(), ModuleState::Loaded);

        harness.initialize().await.unwrap();
        assert_eq!(harness.state(), ModuleState::Ready);
        assert_eq!(
            probe.calls(),
            vec![Hook::PreInitialize, Hook::Initialize, Hook::PostInitialize]
        );

        harness.cleanup().await.unwrap();
        assert_eq!(harness.state(), ModuleState::Unloaded);
        assert_eq!(probe.count(Hook::Cleanup), 1);
    }

    #[tokio::test]
    async fn test_harness_failed_hook() {
        let probe = MockProbe::new();
        probe.fail_on(Hook::Initialize);
        let module = MockModule::new("mock", EventBus::new(), probe.clone());
        let harness = ModuleTestHarness::new(Arc::new(module));

        assert!(harness.initialize().await.is_err());
        assert_eq!(harness.state(), ModuleState::Error);
        assert_eq!(probe.count(Hook::PostInitialize), 0);
    }
}
