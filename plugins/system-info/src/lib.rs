//! # System Info Module
//!
//! Reference Switchboard module exercising the whole capability contract:
//! lifecycle hooks, routes, owned bus subscriptions and a background task
//! cancelled by cleanup.
//!
//! ## Events
//!
//! | Direction | Type | Payload |
//! |-----------|------|---------|
//! | out | `system_info.initialized` | `{module, start_time}` |
//! | in | `system_info.refresh_requested` | any |
//! | out | `system_info.updated` | `{module, updated_at, uptime}` |
//! | in | `system_info.get_status` | any |
//! | out | `system_info.status_response` | `{module, state, uptime, routes, timestamp}` |
//! | out | `system.metrics` | [`SystemMetrics`] |
//! | in/out | `system.metrics` → `websocket.broadcast` | `{message: {type, payload}}` |
//! | out | `system_info.cleanup` | `{module, cleanup_at}` |
//!
//! ## Example
//!
//! ```rust,no_run
//! use switchboard_module_api::prelude::*;
//! use system_info::SystemInfoModule;
//!
//! # async fn example() -> Result<(), ModuleError> {
//! let bus = EventBus::new();
//! let module = SystemInfoModule::create("system_info", bus, Default::default());
//! module.initialize().await?;
//! println!("{}", module.system_info().hostname);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod config;
pub mod metrics;

pub use config::SystemInfoConfig;
pub use metrics::{Sampler, SystemInfoReport, SystemMetrics, Usage};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use std::time::Instant;
use switchboard_module_api::prelude::*;
use tracing::{debug, error, info};

/// Factory name used in `module.toml`
pub const FACTORY_NAME: &str = "system_info";

/// Event types used by the module
pub mod events {
    /// Published once initialization has subscribed everything
    pub const INITIALIZED: &str = "system_info.initialized";
    /// Asks the module to publish fresh information
    pub const REFRESH_REQUESTED: &str = "system_info.refresh_requested";
    /// Answer to a refresh request
    pub const UPDATED: &str = "system_info.updated";
    /// Asks the module for its status
    pub const GET_STATUS: &str = "system_info.get_status";
    /// Answer to a status request
    pub const STATUS_RESPONSE: &str = "system_info.status_response";
    /// Periodic resource sample
    pub const METRICS: &str = "system.metrics";
    /// Fan-out to connected clients
    pub const WEBSOCKET_BROADCAST: &str = "websocket.broadcast";
    /// Published after cleanup released everything
    pub const CLEANUP: &str = "system_info.cleanup";
}

/// Host information module
#[derive(Debug)]
pub struct SystemInfoModule {
    ctx: ModuleContext,
    config: SystemInfoConfig,
    this: Weak<SystemInfoModule>,
    sampler: Sampler,
    started: Instant,
    start_time: DateTime<Utc>,
}

impl SystemInfoModule {
    /// Create a module instance
    pub fn create(name: impl Into<String>, bus: EventBus, config: SystemInfoConfig) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| Self {
            ctx: ModuleContext::new(name, bus),
            config,
            this: this.clone(),
            sampler: Sampler::new(),
            started: Instant::now(),
            start_time: Utc::now(),
        })
    }

    /// Create a module instance from the manifest's `[config]` table
    pub fn from_manifest(
        name: &str,
        bus: EventBus,
        config: &Value,
    ) -> Result<Arc<Self>, ModuleError> {
        let config = SystemInfoConfig::from_value(config)
            .map_err(|e| ModuleError::config(format!("Invalid configuration: {e}")))?;
        Ok(Self::create(name, bus, config))
    }

    /// Active configuration
    pub fn config(&self) -> &SystemInfoConfig {
        &self.config
    }

    /// Seconds since the instance was created
    pub fn uptime(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// `GET /info`
    pub fn system_info(&self) -> SystemInfoReport {
        SystemInfoReport {
            hostname: metrics::hostname(),
            platform: metrics::platform(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime: self.uptime(),
            timestamp: Utc::now(),
        }
    }

    /// `GET /metrics`
    pub fn metrics(&self) -> SystemMetrics {
        self.sampler.sample()
    }

    /// `POST /refresh`
    pub async fn refresh(&self) -> Value {
        self.bus()
            .publish(
                events::REFRESH_REQUESTED,
                payload(json!({ "requested_at": Utc::now() })),
            )
            .await;
        json!({ "status": "refresh_requested" })
    }

    /// Status snapshot answered on `system_info.get_status`
    pub fn status(&self) -> Value {
        json!({
            "module": self.name(),
            "state": self.ctx.state(),
            "uptime": self.uptime(),
            "routes": self.routes().len(),
            "timestamp": Utc::now(),
        })
    }

    /// Subscribe a handler that runs against this instance while it is alive
    fn on<F, Fut>(&self, event_type: &'static str, handler: F)
    where
        F: Fn(Arc<SystemInfoModule>, Event) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let this = self.this.clone();
        self.ctx.subscribe(event_type, move |event| {
            let pending = this.upgrade().map(|module| handler(module, event));
            async move {
                if let Some(pending) = pending {
                    pending.await;
                }
                Ok(())
            }
        });
    }

    fn start_metrics_loop(&self) {
        let this = self.this.clone();
        let interval = self.config.interval;

        self.ctx.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(module) = this.upgrade() else {
                    break;
                };

                let sample = module.metrics();
                match serde_json::to_value(&sample) {
                    Ok(Value::Object(map)) => module.bus().publish(events::METRICS, map).await,
                    Ok(_) => {}
                    Err(e) => error!(module = %module.name(), error = %e, "Failed to encode metrics"),
                }
            }
        });
    }
}

#[async_trait]
impl Module for SystemInfoModule {
    fn context(&self) -> &ModuleContext {
        &self.ctx
    }

    async fn pre_initialize(&self) -> Result<(), ModuleError> {
        info!(module = %self.name(), "Pre-initializing SystemInfo module");
        Ok(())
    }

    async fn initialize(&self) -> Result<(), ModuleError> {
        info!(module = %self.name(), "Initializing SystemInfo module");

        self.on(events::REFRESH_REQUESTED, |module, _event| async move {
            debug!(module = %module.name(), "System info refresh requested");
            let update = payload(json!({
                "module": module.name(),
                "updated_at": Utc::now(),
                "uptime": module.uptime(),
            }));
            module.bus().publish(events::UPDATED, update).await;
        });

        self.on(events::GET_STATUS, |module, _event| async move {
            let status = module.status();
            module
                .bus()
                .publish(events::STATUS_RESPONSE, payload(status))
                .await;
        });

        if self.config.forward_to_websocket {
            self.on(events::METRICS, |module, event| async move {
                let message = payload(json!({
                    "message": {
                        "type": "system_metrics",
                        "payload": event.payload(),
                    }
                }));
                module
                    .bus()
                    .publish(events::WEBSOCKET_BROADCAST, message)
                    .await;
            });
        }

        if self.config.collect_metrics {
            self.start_metrics_loop();
            info!(
                module = %self.name(),
                interval = ?self.config.interval,
                "Started background metrics collection"
            );
        }

        self.bus()
            .publish(
                events::INITIALIZED,
                payload(json!({
                    "module": self.name(),
                    "start_time": self.start_time,
                })),
            )
            .await;

        Ok(())
    }

    async fn cleanup(&self) -> Result<(), ModuleError> {
        info!(module = %self.name(), "Cleaning up SystemInfo module");
        self.ctx.shutdown().await;

        self.bus()
            .publish(
                events::CLEANUP,
                payload(json!({
                    "module": self.name(),
                    "cleanup_at": Utc::now(),
                })),
            )
            .await;
        Ok(())
    }

    fn routes(&self) -> Vec<RouteDescriptor> {
        vec![
            RouteDescriptor::get("/info").describe("Basic host information"),
            RouteDescriptor::get("/metrics").describe("CPU, memory and disk usage"),
            RouteDescriptor::post("/refresh").describe("Request a system info refresh"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use switchboard_module_api::testing::ModuleTestHarness;

    fn recorder(bus: &EventBus, pattern: &str) -> Arc<Mutex<Vec<Event>>> {
        let log: Arc<Mutex<Vec<Event>>> = Arc::default();
        let sink = Arc::clone(&log);
        bus.subscribe(pattern, move |event| {
            sink.lock().push(event);
            async { Ok(()) }
        });
        log
    }

    fn quiet() -> SystemInfoConfig {
        SystemInfoConfig {
            collect_metrics: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_routes() {
        let module = SystemInfoModule::create("system_info", EventBus::new(), quiet());
        let routes: Vec<String> = module.routes().iter().map(ToString::to_string).collect();
        assert_eq!(routes, vec!["[GET] /info", "[GET] /metrics", "[POST] /refresh"]);
    }

    #[tokio::test]
    async fn test_initialize_announces_and_subscribes() {
        let bus = EventBus::new();
        let initialized = recorder(&bus, events::INITIALIZED);

        let module = SystemInfoModule::create("system_info", bus.clone(), quiet());
        let harness = ModuleTestHarness::new(module.clone());
        harness.initialize().await.unwrap();

        assert_eq!(harness.state(), ModuleState::Ready);
        assert_eq!(initialized.lock().len(), 1);
        assert_eq!(
            initialized.lock()[0].get_str("module"),
            Some("system_info")
        );
        assert_eq!(module.context().subscription_count(), 3);
        assert_eq!(module.context().pending_task_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_round_trip() {
        let bus = EventBus::new();
        let updated = recorder(&bus, events::UPDATED);

        let module = SystemInfoModule::create("system_info", bus.clone(), quiet());
        module.initialize().await.unwrap();

        let response = module.refresh().await;
        assert_eq!(response["status"], "refresh_requested");
        assert_eq!(updated.lock().len(), 1);
        assert!(updated.lock()[0].get("uptime").unwrap().is_number());
    }

    #[tokio::test]
    async fn test_status_request() {
        let bus = EventBus::new();
        let responses = recorder(&bus, events::STATUS_RESPONSE);

        let module = SystemInfoModule::create("system_info", bus.clone(), quiet());
        let harness = ModuleTestHarness::new(module);
        harness.initialize().await.unwrap();

        bus.publish(events::GET_STATUS, Payload::new()).await;

        let responses = responses.lock();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].get_str("state"), Some("ready"));
        assert_eq!(responses[0].get("routes"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_metrics_are_forwarded_to_websocket() {
        let bus = EventBus::new();
        let broadcasts = recorder(&bus, events::WEBSOCKET_BROADCAST);

        let module = SystemInfoModule::create("system_info", bus.clone(), quiet());
        module.initialize().await.unwrap();

        bus.publish(events::METRICS, payload(json!({"cpu_percent": 12.5})))
            .await;

        let broadcasts = broadcasts.lock();
        assert_eq!(broadcasts.len(), 1);
        let message = broadcasts[0].get("message").unwrap();
        assert_eq!(message["type"], "system_metrics");
        assert_eq!(message["payload"]["cpu_percent"], 12.5);
    }

    #[tokio::test]
    async fn test_metrics_loop_publishes_until_cleanup() {
        let bus = EventBus::new();
        let samples = recorder(&bus, events::METRICS);
        let cleanups = recorder(&bus, events::CLEANUP);

        let config = SystemInfoConfig {
            interval: Duration::from_millis(10),
            forward_to_websocket: false,
            ..Default::default()
        };
        let module = SystemInfoModule::create("system_info", bus.clone(), config);
        let harness = ModuleTestHarness::new(module.clone());
        harness.initialize().await.unwrap();
        assert_eq!(module.context().pending_task_count(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!samples.lock().is_empty());

        harness.cleanup().await.unwrap();
        assert_eq!(module.context().pending_task_count(), 0);
        assert_eq!(module.context().subscription_count(), 0);
        assert_eq!(cleanups.lock().len(), 1);

        let seen = samples.lock().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(samples.lock().len(), seen);
    }

    #[tokio::test]
    async fn test_from_manifest_rejects_bad_config() {
        let err = SystemInfoModule::from_manifest(
            "system_info",
            EventBus::new(),
            &json!({"interval": 5}),
        )
        .unwrap_err();
        assert!(matches!(err, ModuleError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_system_info_report() {
        let module = SystemInfoModule::create("system_info", EventBus::new(), quiet());
        let report = module.system_info();
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
        assert!(report.uptime >= 0.0);
    }
}
