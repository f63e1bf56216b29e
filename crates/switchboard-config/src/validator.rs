//! Configuration validation

use crate::error::{ConfigError, Result};
use crate::HostConfig;
use std::time::Duration;

/// Validate configuration
pub fn validate_config(config: &HostConfig) -> Result<()> {
    validate_modules(config)?;
    validate_event_bus(config)?;
    validate_hot_reload(config)?;
    validate_logging(config)?;

    Ok(())
}

fn validate_modules(config: &HostConfig) -> Result<()> {
    let modules = &config.modules;

    if modules.directory.as_os_str().is_empty() {
        return Err(ConfigError::invalid("modules.directory cannot be empty"));
    }

    if modules.entry_point.is_empty() {
        return Err(ConfigError::invalid("modules.entry_point cannot be empty"));
    }

    // The entry point is a file name inside each module directory, not a path
    if modules.entry_point.contains(['/', '\\']) {
        return Err(ConfigError::invalid(format!(
            "modules.entry_point must be a file name: {}",
            modules.entry_point
        )));
    }

    if modules.reserved_prefix.is_empty() {
        tracing::warn!("modules.reserved_prefix is empty, no directory will be skipped");
    }

    Ok(())
}

fn validate_event_bus(config: &HostConfig) -> Result<()> {
    let bus = &config.event_bus;

    if bus.request_timeout.is_zero() {
        return Err(ConfigError::invalid("event_bus.request_timeout must be > 0"));
    }

    if bus.request_timeout > Duration::from_secs(300) {
        tracing::warn!("event_bus.request_timeout is very high (>5 minutes)");
    }

    if let Some(relay) = bus.active_relay() {
        let Some(raw) = relay.url.as_deref().filter(|url| !url.is_empty()) else {
            return Err(ConfigError::invalid(
                "event_bus.relay.url is required when the relay is enabled",
            ));
        };

        url::Url::parse(raw)
            .map_err(|e| ConfigError::invalid(format!("Invalid relay url {raw}: {e}")))?;

        if relay.channel_prefix.is_empty() {
            return Err(ConfigError::invalid(
                "event_bus.relay.channel_prefix cannot be empty",
            ));
        }
    }

    Ok(())
}

fn validate_hot_reload(config: &HostConfig) -> Result<()> {
    let hot_reload = &config.hot_reload;

    if hot_reload.poll_interval.is_zero() {
        return Err(ConfigError::invalid("hot_reload.poll_interval must be > 0"));
    }

    if hot_reload.enabled && hot_reload.debounce.is_zero() {
        tracing::warn!("hot_reload.debounce is zero, every write triggers a reload pass");
    }

    Ok(())
}

fn validate_logging(config: &HostConfig) -> Result<()> {
    match config.logging.format.to_ascii_lowercase().as_str() {
        "text" | "json" => Ok(()),
        other => Err(ConfigError::invalid(format!(
            "Invalid log format: {other} (must be text or json)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelayConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HostConfig::default()).is_ok());
    }

    #[test]
    fn test_entry_point_must_be_file_name() {
        let mut config = HostConfig::default();
        config.modules.entry_point = "nested/module.toml".to_string();
        assert!(validate_config(&config).is_err());

        config.modules.entry_point = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = HostConfig::default();
        config.event_bus.request_timeout = Duration::ZERO;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_enabled_relay_needs_valid_url() {
        let mut config = HostConfig::default();
        config.event_bus.relay = Some(RelayConfig {
            enabled: true,
            ..Default::default()
        });
        assert!(validate_config(&config).is_err());

        config.event_bus.relay = Some(RelayConfig {
            enabled: true,
            url: Some("not a url".to_string()),
            ..Default::default()
        });
        assert!(validate_config(&config).is_err());

        config.event_bus.relay = Some(RelayConfig {
            enabled: true,
            url: Some("redis://localhost:6379".to_string()),
            ..Default::default()
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disabled_relay_is_not_checked() {
        let mut config = HostConfig::default();
        config.event_bus.relay = Some(RelayConfig::default());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_log_format() {
        let mut config = HostConfig::default();
        config.logging.format = "JSON".to_string();
        assert!(validate_config(&config).is_ok());

        config.logging.format = "xml".to_string();
        assert!(validate_config(&config).is_err());
    }
}
