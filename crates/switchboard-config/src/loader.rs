//! Configuration loading

use crate::error::{ConfigError, Result};
use crate::{ConfigFormat, HostConfig};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;

/// Load configuration from a file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<HostConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let format = ConfigFormat::from_path(path)?;

    load_from_str(&content, format)
}

/// Expand environment variables in configuration text
///
/// Supports `${VAR}` and `${VAR:-default}`.
pub fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| ConfigError::invalid(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match (env::var(var_name.as_str()), default_value) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                return Err(ConfigError::MissingEnvVar(var_name.as_str().to_string()));
            }
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);

    Ok(result)
}

/// Load configuration from a string
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<HostConfig> {
    parse(content, format)
}

/// Load and validate configuration from a file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HostConfig> {
    let config = load_from_file(path)?;
    crate::validator::validate_config(&config)?;
    Ok(config)
}

/// Load and merge multiple configuration files
///
/// Files are merged in order, later files overriding earlier ones key by key.
/// This enables layered configuration:
/// - base.yaml (common defaults)
/// - production.yaml (env-specific)
///
/// # Example
///
/// ```no_run
/// use switchboard_config::load_and_merge;
///
/// let config = load_and_merge(&["config/base.yaml", "config/production.yaml"])?;
/// # Ok::<(), switchboard_config::ConfigError>(())
/// ```
pub fn load_and_merge<P: AsRef<Path>>(paths: &[P]) -> Result<HostConfig> {
    if paths.is_empty() {
        return Err(ConfigError::invalid("No configuration files provided"));
    }

    let mut layers = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let layer: Value = parse(&content, ConfigFormat::from_path(path)?)?;
        layers.push(layer);
    }

    let merged = crate::merger::merge_layers(layers);
    let config: HostConfig =
        serde_json::from_value(merged).map_err(|e| ConfigError::parse("merged config", e))?;

    crate::validator::validate_config(&config)?;

    Ok(config)
}

fn parse<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T> {
    let expanded = expand_env_vars(content)?;

    match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::parse("YAML", e))
        }
        ConfigFormat::Toml => toml::from_str(&expanded).map_err(|e| ConfigError::parse("TOML", e)),
        ConfigFormat::Json => {
            serde_json::from_str(&expanded).map_err(|e| ConfigError::parse("JSON", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    const YAML_CONFIG: &str = r#"
modules:
  directory: "/srv/dashboard/modules"
  auto_load: false

event_bus:
  relay:
    enabled: true
    url: "redis://localhost:6379"
  request_timeout: "10s"

hot_reload:
  enabled: true
  debounce: "500ms"

logging:
  level: "debug"
  format: "json"
"#;

    #[test]
    fn test_load_yaml() {
        let config = load_from_str(YAML_CONFIG, ConfigFormat::Yaml).unwrap();

        assert_eq!(
            config.modules.directory,
            PathBuf::from("/srv/dashboard/modules")
        );
        assert!(!config.modules.auto_load);
        assert_eq!(config.modules.entry_point, "module.toml");
        assert_eq!(config.event_bus.request_timeout, Duration::from_secs(10));
        assert_eq!(
            config.event_bus.active_relay().unwrap().channel_prefix,
            "dashboard:"
        );
        assert_eq!(config.hot_reload.debounce, Duration::from_millis(500));
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[modules]
directory = "plugins"
reserved_prefix = "."

[hot_reload]
enabled = true
"#;
        let config = load_from_str(toml, ConfigFormat::Toml).unwrap();

        assert_eq!(config.modules.directory, PathBuf::from("plugins"));
        assert_eq!(config.modules.reserved_prefix, ".");
        assert!(config.hot_reload.enabled);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = load_from_str("invalid: [yaml", ConfigFormat::Yaml);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("SWITCHBOARD_TEST_REDIS_HOST", "cache.internal");

        let config = r#"
event_bus:
  relay:
    enabled: ${SWITCHBOARD_TEST_USE_REDIS:-true}
    url: "redis://${SWITCHBOARD_TEST_REDIS_HOST}:6379"
"#;
        let config = load_from_str(config, ConfigFormat::Yaml).unwrap();
        let relay = config.event_bus.active_relay().unwrap();
        assert_eq!(relay.url.as_deref(), Some("redis://cache.internal:6379"));

        env::remove_var("SWITCHBOARD_TEST_REDIS_HOST");
    }

    #[test]
    fn test_env_var_default_value() {
        env::remove_var("SWITCHBOARD_TEST_UNSET");

        let expanded = expand_env_vars("level: ${SWITCHBOARD_TEST_UNSET:-warn}").unwrap();
        assert_eq!(expanded, "level: warn");

        let expanded = expand_env_vars("prefix: \"${SWITCHBOARD_TEST_UNSET:-}\"").unwrap();
        assert_eq!(expanded, "prefix: \"\"");
    }

    #[test]
    fn test_env_var_missing_no_default() {
        env::remove_var("SWITCHBOARD_TEST_MISSING");

        let result = expand_env_vars("url: ${SWITCHBOARD_TEST_MISSING}");
        match result {
            Err(ConfigError::MissingEnvVar(name)) => assert_eq!(name, "SWITCHBOARD_TEST_MISSING"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_text_without_references_is_untouched() {
        let text = "level: info # costs $5";
        assert_eq!(expand_env_vars(text).unwrap(), text);
    }

    #[test]
    fn test_load_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.yaml");
        fs::write(&path, "event_bus:\n  relay:\n    enabled: true\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_and_merge_layers() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        let local = dir.path().join("local.toml");

        fs::write(
            &base,
            "modules:\n  directory: modules\n  reserved_prefix: \"_\"\nlogging:\n  level: info\n",
        )
        .unwrap();
        fs::write(&local, "[modules]\ndirectory = \"dev-modules\"\n").unwrap();

        let config = load_and_merge(&[&base, &local]).unwrap();
        assert_eq!(config.modules.directory, PathBuf::from("dev-modules"));
        assert_eq!(config.modules.reserved_prefix, "_");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_and_merge_requires_paths() {
        let paths: [&str; 0] = [];
        assert!(load_and_merge(&paths).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = load_from_file("/nonexistent/host.yaml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
