//! Configuration error types

use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Format could not be derived from the file name
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Document could not be parsed
    #[error("Failed to parse {format}: {message}")]
    Parse {
        /// Format name
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// `${VAR}` reference without value or default
    #[error("Environment variable '{0}' not set and no default provided")]
    MissingEnvVar(String),

    /// Configuration parsed but is not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    /// Create a new I/O error
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a new parse error
    pub fn parse(format: &'static str, message: impl fmt::Display) -> Self {
        Self::Parse {
            format,
            message: message.to_string(),
        }
    }

    /// Create a new validation error
    pub fn invalid(msg: impl fmt::Display) -> Self {
        Self::Invalid(msg.to_string())
    }
}
