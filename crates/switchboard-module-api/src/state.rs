//! Module lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Module lifecycle state
///
/// `Unloaded → Loading → Loaded → Initializing → Ready`, then
/// `Ready → Unloading → Unloaded` on teardown. `Error` is reachable from any
/// loading, initializing or unloading step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Not loaded
    Unloaded,

    /// Entry point is being resolved and instantiated
    Loading,

    /// Instance constructed, not yet initialized
    Loaded,

    /// Initialization hooks are running
    Initializing,

    /// Fully initialized and serving
    Ready,

    /// Last transition failed
    Error,

    /// Cleanup hooks are running
    Unloading,
}

impl ModuleState {
    /// Every state, in lifecycle order
    pub const ALL: [ModuleState; 7] = [
        ModuleState::Unloaded,
        ModuleState::Loading,
        ModuleState::Loaded,
        ModuleState::Initializing,
        ModuleState::Ready,
        ModuleState::Error,
        ModuleState::Unloading,
    ];

    /// Lowercase name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleState::Unloaded => "unloaded",
            ModuleState::Loading => "loading",
            ModuleState::Loaded => "loaded",
            ModuleState::Initializing => "initializing",
            ModuleState::Ready => "ready",
            ModuleState::Error => "error",
            ModuleState::Unloading => "unloading",
        }
    }

    /// Check if the module is ready
    pub fn is_ready(&self) -> bool {
        matches!(self, ModuleState::Ready)
    }

    /// Check if the module failed
    pub fn is_error(&self) -> bool {
        matches!(self, ModuleState::Error)
    }

    /// Check if a transition cycle has ended in this state
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ModuleState::Ready | ModuleState::Error | ModuleState::Unloaded
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_state() {
        assert!(ModuleState::Ready.is_ready());
        assert!(ModuleState::Ready.is_settled());
        assert!(!ModuleState::Loading.is_settled());
        assert!(ModuleState::Error.is_error());
        assert_eq!(ModuleState::Initializing.to_string(), "initializing");
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&ModuleState::Unloading).unwrap();
        assert_eq!(json, "\"unloading\"");

        let state: ModuleState = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(state, ModuleState::Ready);
    }
}
