//! Host assembly: bus, module source, manager and hot reload

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use switchboard_config::{EventBusConfig, HostConfig, ModulesConfig};
use switchboard_events::{EventBus, Payload};
use switchboard_module_api::Module;
use switchboard_runtime::{
    control::commands, HotReloadWatcher, ManagerOptions, ModuleManager, ModuleManifest,
    StaticModuleSource,
};
use system_info::SystemInfoModule;
use tracing::{error, info, warn};

/// Factories compiled into this host
pub(crate) fn module_source() -> StaticModuleSource {
    StaticModuleSource::new().register(system_info::FACTORY_NAME, |ctx| {
        let module = SystemInfoModule::from_manifest(ctx.name, ctx.bus, &ctx.manifest.config)?;
        Ok(module as Arc<dyn Module>)
    })
}

pub(crate) fn manager_options(config: &ModulesConfig) -> ManagerOptions {
    ManagerOptions {
        entry_point: config.entry_point.clone(),
        reserved_prefix: config.reserved_prefix.clone(),
    }
}

/// Build the event bus, attaching the relay when one is configured
///
/// A relay that cannot be reached leaves the bus local-only.
pub(crate) async fn build_bus(config: &EventBusConfig) -> EventBus {
    let mut builder = EventBus::builder();

    if let Some(relay) = config.active_relay() {
        builder = builder.channel_prefix(relay.channel_prefix.clone());

        #[cfg(feature = "redis-relay")]
        {
            if let Some(url) = relay.url.as_deref() {
                match switchboard_events::RedisRelay::connect(url).await {
                    Ok(redis) => builder = builder.relay(Arc::new(redis)),
                    Err(e) => warn!(error = %e, "Redis relay unavailable, running local-only"),
                }
            }
        }

        #[cfg(not(feature = "redis-relay"))]
        {
            warn!("Relay configured but redis-relay feature is disabled, running local-only");
        }
    }

    builder.build()
}

/// Run the host until a shutdown signal arrives
pub(crate) async fn serve(config: HostConfig) -> Result<()> {
    let bus = build_bus(&config.event_bus).await;
    bus.start().await;
    info!(bus_id = %bus.id(), relay = bus.relay_enabled(), "Event bus started");

    let manager = ModuleManager::with_options(
        bus.clone(),
        Arc::new(module_source()),
        manager_options(&config.modules),
    );
    let modules_dir = &config.modules.directory;

    if config.modules.auto_load {
        let results = manager
            .discover_and_load_all(modules_dir)
            .await
            .with_context(|| format!("Failed to load modules from {}", modules_dir.display()))?;

        for (name, outcome) in results.iter().filter(|(_, o)| !o.is_success()) {
            error!(module = %name, outcome = %outcome, "Module failed to load");
        }
    }

    for (name, routes) in manager.list_routes() {
        for route in routes {
            info!(module = %name, route = %route, "Route available");
        }
    }

    let mut watcher = None;
    if config.hot_reload.enabled {
        let mut hot_reload = HotReloadWatcher::new(Arc::clone(&manager), modules_dir.clone())
            .with_debounce(config.hot_reload.debounce)
            .with_poll_interval(config.hot_reload.poll_interval);

        match hot_reload.start().and_then(|()| hot_reload.run()) {
            Ok(()) => watcher = Some(hot_reload),
            Err(e) => warn!(error = %e, "Hot reload disabled"),
        }
    }

    info!(loaded = manager.loaded_count(), "Switchboard host running");
    shutdown_signal().await;
    info!("Shutting down");

    if let Some(mut watcher) = watcher {
        watcher.stop().await;
    }

    let results = manager.unload_all(true).await;
    for (name, outcome) in results.iter().filter(|(_, o)| !o.is_success()) {
        warn!(module = %name, outcome = %outcome, "Module did not unload cleanly");
    }

    manager.detach_control_handlers();
    bus.stop().await;

    info!("Switchboard host stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    }
}

/// Module directory as seen without loading it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModuleSummary {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) factory: Option<String>,
    pub(crate) dependencies: Vec<String>,
    pub(crate) problem: Option<String>,
}

/// Inspect the modules directory without instantiating anything
pub(crate) async fn inspect_modules(config: &ModulesConfig) -> Result<Vec<ModuleSummary>> {
    let source = module_source();
    let known = source.factory_names();
    let manager = ModuleManager::with_options(
        EventBus::new(),
        Arc::new(source),
        manager_options(config),
    );

    let found = manager.discover(&config.directory).await?;
    let mut summaries = Vec::with_capacity(found.len());

    for (name, path) in found {
        let summary = match ModuleManifest::from_file(&manager.entry_point(&path)).await {
            Ok(manifest) => {
                let problem = match manifest.factory.as_deref() {
                    None => Some("manifest has no factory".to_string()),
                    Some(f) if !known.iter().any(|k| k == f) => {
                        Some(format!("unknown factory '{f}'"))
                    }
                    Some(_) => None,
                };
                ModuleSummary {
                    name,
                    path,
                    factory: manifest.factory,
                    dependencies: manifest.dependencies,
                    problem,
                }
            }
            Err(e) => ModuleSummary {
                name,
                path,
                factory: None,
                dependencies: Vec::new(),
                problem: Some(e.to_string()),
            },
        };
        summaries.push(summary);
    }

    Ok(summaries)
}

/// Ask running hosts for their module listing over the relay
pub(crate) async fn remote_listing(config: &EventBusConfig) -> Result<Value> {
    let bus = build_bus(config).await;
    bus.start().await;

    if !bus.relay_enabled() {
        bus.stop().await;
        anyhow::bail!("No relay available to reach a running host");
    }

    let response = bus
        .request_response(commands::LIST_REQUEST, Payload::new(), config.request_timeout)
        .await;
    bus.stop().await;

    Ok(Value::Object(response.context("Module listing request failed")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_source_registers_system_info() {
        assert_eq!(module_source().factory_names(), vec!["system_info"]);
    }

    #[tokio::test]
    async fn test_inspect_modules() {
        let root = tempfile::tempdir().unwrap();
        for (name, manifest) in [
            ("system_info", "factory = \"system_info\"\n"),
            ("custom", "factory = \"custom\"\ndependencies = [\"system_info\"]\n"),
            ("bare", "dependencies = []\n"),
            ("_disabled", "factory = \"system_info\"\n"),
        ] {
            let dir = root.path().join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("module.toml"), manifest).unwrap();
        }

        let config = ModulesConfig {
            directory: root.path().to_path_buf(),
            ..Default::default()
        };
        let summaries = inspect_modules(&config).await.unwrap();

        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["bare", "custom", "system_info"]);
        assert_eq!(
            summaries[0].problem.as_deref(),
            Some("manifest has no factory")
        );
        assert_eq!(
            summaries[1].problem.as_deref(),
            Some("unknown factory 'custom'")
        );
        assert_eq!(summaries[1].dependencies, vec!["system_info"]);
        assert!(summaries[2].problem.is_none());
    }

    #[tokio::test]
    async fn test_local_only_bus_without_relay() {
        let bus = build_bus(&EventBusConfig::default()).await;
        bus.start().await;
        assert!(!bus.relay_enabled());
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_remote_listing_requires_relay() {
        assert!(remote_listing(&EventBusConfig::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_system_info_loads_through_manager() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("system_info");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("module.toml"),
            "factory = \"system_info\"\n\n[config]\ncollect_metrics = false\n",
        )
        .unwrap();

        let manager = ModuleManager::new(EventBus::new(), Arc::new(module_source()));
        manager.load("system_info", &dir).await.unwrap();

        let routes = manager.list_routes();
        assert_eq!(routes["system_info"].len(), 3);

        manager.unload("system_info", false).await.unwrap();
        assert_eq!(manager.loaded_count(), 0);
    }
}
