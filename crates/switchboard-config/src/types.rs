//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level host configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Module discovery and loading
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Event bus settings
    #[serde(default)]
    pub event_bus: EventBusConfig,

    /// File-watching reloads
    #[serde(default)]
    pub hot_reload: HotReloadConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Module discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Root directory holding one subdirectory per module
    #[serde(default = "default_modules_dir")]
    pub directory: PathBuf,

    /// File every module directory must contain
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Directories starting with this prefix are skipped
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,

    /// Load everything found at startup
    #[serde(default = "default_true")]
    pub auto_load: bool,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            directory: default_modules_dir(),
            entry_point: default_entry_point(),
            reserved_prefix: default_reserved_prefix(),
            auto_load: true,
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Distributed relay, local-only when absent
    #[serde(default)]
    pub relay: Option<RelayConfig>,

    /// Default timeout for request/response round trips
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            relay: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl EventBusConfig {
    /// Relay settings when the relay is switched on
    pub fn active_relay(&self) -> Option<&RelayConfig> {
        self.relay.as_ref().filter(|relay| relay.enabled)
    }
}

/// Distributed relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Enable the relay
    #[serde(default)]
    pub enabled: bool,

    /// Relay connection URL (e.g. `redis://localhost:6379`)
    #[serde(default)]
    pub url: Option<String>,

    /// Channel prefix shared by every cooperating host
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            channel_prefix: default_channel_prefix(),
        }
    }
}

/// Hot reload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotReloadConfig {
    /// Watch the modules directory for entry-point changes
    #[serde(default)]
    pub enabled: bool,

    /// Quiet period after the last change before reloading
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,

    /// Poll interval for polling watcher backends
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce: default_debounce(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Whether records should be emitted as JSON
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_entry_point() -> String {
    "module.toml".to_string()
}

fn default_reserved_prefix() -> String {
    "_".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_channel_prefix() -> String {
    "dashboard:".to_string()
}

fn default_debounce() -> Duration {
    Duration::from_secs(1)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();

        assert_eq!(config.modules.directory, PathBuf::from("modules"));
        assert_eq!(config.modules.entry_point, "module.toml");
        assert_eq!(config.modules.reserved_prefix, "_");
        assert!(config.modules.auto_load);
        assert!(config.event_bus.relay.is_none());
        assert_eq!(config.event_bus.request_timeout, Duration::from_secs(5));
        assert!(!config.hot_reload.enabled);
        assert_eq!(config.hot_reload.debounce, Duration::from_secs(1));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: HostConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn test_active_relay() {
        let mut config = EventBusConfig::default();
        assert!(config.active_relay().is_none());

        config.relay = Some(RelayConfig::default());
        assert!(config.active_relay().is_none());

        config.relay = Some(RelayConfig {
            enabled: true,
            url: Some("redis://localhost:6379".to_string()),
            ..Default::default()
        });
        assert_eq!(
            config.active_relay().map(|r| r.channel_prefix.as_str()),
            Some("dashboard:")
        );
    }

    #[test]
    fn test_humantime_durations() {
        let config: HotReloadConfig =
            serde_yaml::from_str("enabled: true\ndebounce: 250ms\npoll_interval: 5s").unwrap();

        assert!(config.enabled);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
