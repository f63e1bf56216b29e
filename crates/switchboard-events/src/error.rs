//! Event bus error types

use std::fmt;
use std::time::Duration;

/// Boxed error returned by event handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Event bus error type
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// No response arrived on the private response event in time
    #[error("Request timeout for {event_type} after {timeout:?}")]
    Timeout {
        /// Request event type
        event_type: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Relay could not be reached
    #[error("Relay unavailable: {0}")]
    RelayUnavailable(String),

    /// Relay operation failed
    #[error("Relay error: {0}")]
    Relay(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event bus operations
pub type Result<T> = std::result::Result<T, BusError>;

impl BusError {
    /// Create a new timeout error
    pub fn timeout(event_type: impl fmt::Display, timeout: Duration) -> Self {
        Self::Timeout {
            event_type: event_type.to_string(),
            timeout,
        }
    }

    /// Create a new relay unavailable error
    pub fn relay_unavailable(msg: impl fmt::Display) -> Self {
        Self::RelayUnavailable(msg.to_string())
    }

    /// Create a new relay error
    pub fn relay(msg: impl fmt::Display) -> Self {
        Self::Relay(msg.to_string())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::Timeout { .. })
    }
}

#[cfg(feature = "redis-relay")]
impl From<redis::RedisError> for BusError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            BusError::RelayUnavailable(err.to_string())
        } else {
            BusError::Relay(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BusError::timeout("ping", Duration::from_millis(50));
        assert!(err.is_timeout());

        let err = BusError::relay_unavailable("connection refused");
        assert!(matches!(err, BusError::RelayUnavailable(_)));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_error_display() {
        let err = BusError::Relay("broken pipe".to_string());
        assert_eq!(err.to_string(), "Relay error: broken pipe");
    }
}
