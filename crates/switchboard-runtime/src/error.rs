//! Runtime error types

use std::fmt;
use std::path::Path;
use std::time::Duration;
use switchboard_events::BusError;
use switchboard_module_api::ModuleError;

/// Runtime error type
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Unknown module name
    #[error("Module not found: {0}")]
    NotFound(String),

    /// A live instance already exists under this name
    #[error("Module already loaded: {0}")]
    AlreadyLoaded(String),

    /// The module directory has no entry-point file
    #[error("Entry point missing: {0}")]
    EntryPointMissing(String),

    /// The entry point does not produce a usable module
    #[error("Contract violation in {module}: {reason}")]
    ContractViolation {
        /// Module name
        module: String,
        /// What is wrong
        reason: String,
    },

    /// Unload blocked by modules that depend on this one
    #[error("Cannot unload {module}: modules {} depend on it, use force to override", .dependents.join(", "))]
    DependencyConflict {
        /// Module being unloaded
        module: String,
        /// Modules that block the unload
        dependents: Vec<String>,
    },

    /// Request/response wait expired
    #[error("Timed out after {timeout:?} waiting for {event_type}")]
    Timeout {
        /// Request event type
        event_type: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Distributed relay could not be reached
    #[error("Relay unavailable: {0}")]
    RelayUnavailable(String),

    /// Error raised by a module hook
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Invalid entry-point manifest
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// Create a new not found error
    pub fn not_found(name: impl fmt::Display) -> Self {
        Self::NotFound(name.to_string())
    }

    /// Create a new already loaded error
    pub fn already_loaded(name: impl fmt::Display) -> Self {
        Self::AlreadyLoaded(name.to_string())
    }

    /// Create a new entry point missing error
    pub fn entry_point_missing(path: &Path) -> Self {
        Self::EntryPointMissing(path.display().to_string())
    }

    /// Create a new contract violation error
    pub fn contract(module: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ContractViolation {
            module: module.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new dependency conflict error
    pub fn dependency_conflict(
        module: impl Into<String>,
        dependents: impl IntoIterator<Item = String>,
    ) -> Self {
        Self::DependencyConflict {
            module: module.into(),
            dependents: dependents.into_iter().collect(),
        }
    }

    /// Create a new manifest error
    pub fn manifest(msg: impl fmt::Display) -> Self {
        Self::Manifest(msg.to_string())
    }

    /// Create a new other error
    pub fn other(msg: impl fmt::Display) -> Self {
        Self::Other(msg.to_string())
    }
}

impl From<BusError> for RuntimeError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Timeout {
                event_type,
                timeout,
            } => Self::Timeout {
                event_type,
                timeout,
            },
            BusError::RelayUnavailable(msg) => Self::RelayUnavailable(msg),
            other => Self::Module(ModuleError::from(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RuntimeError::not_found("test");
        assert!(matches!(err, RuntimeError::NotFound(_)));

        let err = RuntimeError::contract("test", "unknown factory");
        assert!(matches!(err, RuntimeError::ContractViolation { .. }));
    }

    #[test]
    fn test_dependency_conflict_display() {
        let err = RuntimeError::dependency_conflict("a", vec!["b".to_string(), "c".to_string()]);
        assert_eq!(
            err.to_string(),
            "Cannot unload a: modules b, c depend on it, use force to override"
        );
    }

    #[test]
    fn test_bus_timeout_maps_to_timeout() {
        let err: RuntimeError = BusError::timeout("ping", Duration::from_millis(50)).into();
        assert!(matches!(err, RuntimeError::Timeout { .. }));
    }
}
