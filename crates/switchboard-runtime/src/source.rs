//! Module code sources
//!
//! A [`ModuleSource`] turns a module name and its entry-point file into a
//! fresh instance. [`StaticModuleSource`] resolves entry points against
//! factories compiled into the host: the entry point is a TOML manifest naming
//! the factory, so editing the manifest and reloading produces a newly
//! configured instance while code changes need a host restart.

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use switchboard_events::EventBus;
use switchboard_module_api::{Module, ModuleError};
use tracing::debug;

/// Produces module instances from entry points
#[async_trait]
pub trait ModuleSource: Send + Sync + fmt::Debug {
    /// Build a fresh instance of `name` from its entry-point file
    ///
    /// Any state kept for an earlier instance of `name` is replaced.
    async fn instantiate(
        &self,
        name: &str,
        entry_point: &Path,
        bus: &EventBus,
    ) -> Result<Arc<dyn Module>>;

    /// Drop whatever state is kept for `name`
    fn release(&self, name: &str);
}

/// Entry-point manifest
///
/// ```toml
/// factory = "system_info"
/// dependencies = ["metrics"]
///
/// [config]
/// interval = "5s"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Name of a registered factory
    pub factory: Option<String>,

    /// Modules this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Opaque configuration handed to the factory
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ModuleManifest {
    /// Parse a manifest from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(RuntimeError::manifest)
    }

    /// Read and parse a manifest file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }
}

/// Factory arguments
#[derive(Debug, Clone)]
pub struct FactoryContext<'a> {
    /// Module name
    pub name: &'a str,

    /// Event bus to hand to the instance
    pub bus: EventBus,

    /// Parsed manifest
    pub manifest: &'a ModuleManifest,
}

/// Module factory
pub type ModuleFactory =
    Arc<dyn Fn(FactoryContext<'_>) -> std::result::Result<Arc<dyn Module>, ModuleError> + Send + Sync>;

/// Source backed by factories registered at startup
#[derive(Clone, Default)]
pub struct StaticModuleSource {
    factories: HashMap<String, ModuleFactory>,
    namespaces: Arc<DashMap<String, ModuleManifest>>,
}

impl StaticModuleSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(FactoryContext<'_>) -> std::result::Result<Arc<dyn Module>, ModuleError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registered factory names, sorted
    pub fn factory_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Manifest of the current instance of `name`
    pub fn namespace(&self, name: &str) -> Option<ModuleManifest> {
        self.namespaces.get(name).map(|entry| entry.value().clone())
    }
}

impl fmt::Debug for StaticModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticModuleSource")
            .field("factories", &self.factory_names())
            .field("namespaces", &self.namespaces.len())
            .finish()
    }
}

#[async_trait]
impl ModuleSource for StaticModuleSource {
    async fn instantiate(
        &self,
        name: &str,
        entry_point: &Path,
        bus: &EventBus,
    ) -> Result<Arc<dyn Module>> {
        let manifest = ModuleManifest::from_file(entry_point).await?;

        // Stale namespace goes first so a failed instantiate leaves nothing behind
        self.namespaces.remove(name);

        let factory_name = manifest
            .factory
            .as_deref()
            .ok_or_else(|| RuntimeError::contract(name, "entry point does not name a factory"))?;

        let factory = self.factories.get(factory_name).ok_or_else(|| {
            RuntimeError::contract(name, format!("unknown factory '{factory_name}'"))
        })?;

        let module = factory(FactoryContext {
            name,
            bus: bus.clone(),
            manifest: &manifest,
        })?;

        if module.name() != name {
            let err = RuntimeError::contract(
                name,
                format!("factory returned module named '{}'", module.name()),
            );
            // Never handed to the manager, so release what construction acquired
            module.context().shutdown().await;
            return Err(err);
        }

        for dependency in &manifest.dependencies {
            module.add_dependency(dependency);
        }

        debug!(module = %name, factory = %factory_name, "Module instantiated");
        self.namespaces.insert(name.to_string(), manifest);

        Ok(module)
    }

    fn release(&self, name: &str) {
        self.namespaces.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_module_api::testing::{MockModule, MockProbe};

    fn source() -> StaticModuleSource {
        StaticModuleSource::new().register("mock", |ctx| {
            Ok(Arc::new(MockModule::new(ctx.name, ctx.bus, MockProbe::new())) as Arc<dyn Module>)
        })
    }

    #[test]
    fn test_manifest_parse() {
        let manifest = ModuleManifest::parse(
            r#"
            factory = "system_info"
            dependencies = ["metrics"]

            [config]
            interval = "5s"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.factory.as_deref(), Some("system_info"));
        assert_eq!(manifest.dependencies, vec!["metrics".to_string()]);
        assert_eq!(manifest.config["interval"], "5s");
    }

    #[test]
    fn test_manifest_defaults() {
        let manifest = ModuleManifest::parse("").unwrap();
        assert!(manifest.factory.is_none());
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.config.is_null());
    }

    #[tokio::test]
    async fn test_instantiate_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("module.toml");
        std::fs::write(&entry, "factory = \"mock\"\ndependencies = [\"base\"]\n").unwrap();

        let source = source();
        let module = source
            .instantiate("alpha", &entry, &EventBus::new())
            .await
            .unwrap();

        assert_eq!(module.name(), "alpha");
        assert!(module.dependencies().contains("base"));
        assert!(source.namespace("alpha").is_some());

        source.release("alpha");
        assert!(source.namespace("alpha").is_none());
    }

    #[tokio::test]
    async fn test_misnamed_instance_is_shut_down() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("module.toml");
        std::fs::write(&entry, "factory = \"misnamed\"\n").unwrap();

        let source = StaticModuleSource::new().register("misnamed", |ctx| {
            let module = MockModule::new("other", ctx.bus, MockProbe::new());
            module
                .context()
                .subscribe("alpha.ping", |_| async { Ok(()) });
            module.context().spawn(std::future::pending());
            Ok(Arc::new(module) as Arc<dyn Module>)
        });

        let bus = EventBus::new();
        let err = source.instantiate("alpha", &entry, &bus).await.unwrap_err();

        assert!(matches!(err, RuntimeError::ContractViolation { .. }));
        assert_eq!(bus.handler_count("alpha.ping"), 0);
        assert!(source.namespace("alpha").is_none());
    }

    #[tokio::test]
    async fn test_missing_factory_is_contract_violation() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("module.toml");
        std::fs::write(&entry, "dependencies = []\n").unwrap();

        let err = source()
            .instantiate("alpha", &entry, &EventBus::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ContractViolation { .. }));

        std::fs::write(&entry, "factory = \"nope\"\n").unwrap();
        let err = source()
            .instantiate("alpha", &entry, &EventBus::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ContractViolation { .. }));
    }
}
