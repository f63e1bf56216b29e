//! Module error types

use std::fmt;
use switchboard_events::BusError;

/// Module error type
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// Initialization failed
    #[error("Initialization failed: {0}")]
    InitError(String),

    /// Cleanup failed
    #[error("Cleanup failed: {0}")]
    CleanupError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Event bus error
    #[error("Event bus error: {0}")]
    BusError(#[from] BusError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Result type for module operations
pub type Result<T> = std::result::Result<T, ModuleError>;

impl ModuleError {
    /// Create a new initialization error
    pub fn init(msg: impl fmt::Display) -> Self {
        Self::InitError(msg.to_string())
    }

    /// Create a new cleanup error
    pub fn cleanup(msg: impl fmt::Display) -> Self {
        Self::CleanupError(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::ConfigError(msg.to_string())
    }

    /// Create a new runtime error
    pub fn runtime(msg: impl fmt::Display) -> Self {
        Self::RuntimeError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ModuleError::init("test");
        assert!(matches!(err, ModuleError::InitError(_)));

        let err = ModuleError::cleanup("test");
        assert!(matches!(err, ModuleError::CleanupError(_)));

        let err = ModuleError::config("test");
        assert!(matches!(err, ModuleError::ConfigError(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ModuleError::InitError("metrics loop".to_string());
        assert_eq!(err.to_string(), "Initialization failed: metrics loop");
    }
}
