//! Module configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[config]` table of the module manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfoConfig {
    /// Publish `system.metrics` periodically
    #[serde(default = "default_collect_metrics")]
    pub collect_metrics: bool,

    /// Interval between metric samples
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Forward `system.metrics` to `websocket.broadcast`
    #[serde(default = "default_forward")]
    pub forward_to_websocket: bool,
}

fn default_collect_metrics() -> bool {
    true
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_forward() -> bool {
    true
}

impl Default for SystemInfoConfig {
    fn default() -> Self {
        Self {
            collect_metrics: default_collect_metrics(),
            interval: default_interval(),
            forward_to_websocket: default_forward(),
        }
    }
}

impl SystemInfoConfig {
    /// Parse from the manifest's config value, where null means defaults
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_default() {
        assert_eq!(
            SystemInfoConfig::from_value(&serde_json::Value::Null).unwrap(),
            SystemInfoConfig::default()
        );
    }

    #[test]
    fn test_partial_config() {
        let config =
            SystemInfoConfig::from_value(&json!({"interval": "250ms", "collect_metrics": false}))
                .unwrap();

        assert_eq!(config.interval, Duration::from_millis(250));
        assert!(!config.collect_metrics);
        assert!(config.forward_to_websocket);
    }

    #[test]
    fn test_invalid_interval() {
        assert!(SystemInfoConfig::from_value(&json!({"interval": "soon"})).is_err());
    }
}
