//! Bus control surface of the manager
//!
//! Remote collaborators drive the manager by publishing `module.*` command
//! events. Query commands answer on the paired response event, or on the
//! private response type when the command arrived through
//! [`EventBus::request_response`](switchboard_events::EventBus::request_response).

use crate::error::Result;
use crate::manager::{to_value, ModuleManager};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use switchboard_events::{payload, BoxError, Event, HandlerId, Payload};
use tracing::{debug, warn};

/// Inbound command and outbound response event types
pub mod commands {
    /// `{module_name, force}`
    pub const RELOAD: &str = "module.reload";
    /// `{module_name, force}`
    pub const UNLOAD: &str = "module.unload";
    /// List records
    pub const LIST_REQUEST: &str = "module.list_request";
    /// `{modules, total}`
    pub const LIST_RESPONSE: &str = "module.list_response";
    /// `{force}`
    pub const RELOAD_ALL: &str = "module.reload_all";
    /// Reload modules whose entry point changed
    pub const AUTO_RELOAD: &str = "module.auto_reload";
    /// Report changed entry points
    pub const CHECK_CHANGES: &str = "module.check_changes";
    /// `{changes, changed_count}`
    pub const CHANGES_RESPONSE: &str = "module.changes_response";
    /// Report dependency edges
    pub const DEPENDENCY_GRAPH_REQUEST: &str = "module.dependency_graph_request";
    /// `{graph}`
    pub const DEPENDENCY_GRAPH_RESPONSE: &str = "module.dependency_graph_response";
}

impl ModuleManager {
    pub(crate) fn register_control_handlers(self: &Arc<Self>) {
        let handles = vec![
            self.on(commands::RELOAD, |manager, event| async move {
                manager.handle_reload(event).await
            }),
            self.on(commands::UNLOAD, |manager, event| async move {
                manager.handle_unload(event).await
            }),
            self.on(commands::LIST_REQUEST, |manager, event| async move {
                manager.handle_list_request(event).await
            }),
            self.on(commands::RELOAD_ALL, |manager, event| async move {
                manager.handle_reload_all(event).await
            }),
            self.on(commands::AUTO_RELOAD, |manager, _event| async move {
                manager.handle_auto_reload().await
            }),
            self.on(commands::CHECK_CHANGES, |manager, event| async move {
                manager.handle_check_changes(event).await
            }),
            self.on(commands::DEPENDENCY_GRAPH_REQUEST, |manager, event| async move {
                manager.handle_dependency_graph_request(event).await
            }),
        ];

        *self.control.lock() = handles;
    }

    /// Remove the control handlers from the bus
    ///
    /// Also happens when the manager is dropped.
    pub fn detach_control_handlers(&self) {
        let handles = std::mem::take(&mut *self.control.lock());
        for (pattern, id) in handles {
            self.bus().unsubscribe(&pattern, Some(id));
        }
    }

    /// Subscribe a command handler holding only a weak reference to the manager
    fn on<F, Fut>(self: &Arc<Self>, event_type: &'static str, handler: F) -> (String, HandlerId)
    where
        F: Fn(Arc<ModuleManager>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let manager = Arc::downgrade(self);
        let id = self.bus().subscribe(event_type, move |event| {
            let pending = manager.upgrade().map(|manager| handler(manager, event));
            async move {
                match pending {
                    Some(pending) => pending.await.map_err(BoxError::from),
                    None => Ok(()),
                }
            }
        });
        (event_type.to_string(), id)
    }

    async fn handle_reload(&self, event: Event) -> Result<()> {
        let Some(name) = event.get_str("module_name") else {
            warn!(event_type = %event.event_type(), "Command without module_name");
            return Ok(());
        };
        let force = event.get_bool("force").unwrap_or(false);
        self.reload(name, force).await
    }

    async fn handle_unload(&self, event: Event) -> Result<()> {
        let Some(name) = event.get_str("module_name") else {
            warn!(event_type = %event.event_type(), "Command without module_name");
            return Ok(());
        };
        let force = event.get_bool("force").unwrap_or(false);
        self.unload(name, force).await
    }

    async fn handle_list_request(&self, event: Event) -> Result<()> {
        let modules = self.list();
        let response = payload(json!({
            "modules": to_value(&modules),
            "total": modules.len(),
        }));
        self.respond(&event, commands::LIST_RESPONSE, response).await;
        Ok(())
    }

    async fn handle_reload_all(&self, event: Event) -> Result<()> {
        let force = event.get_bool("force").unwrap_or(false);
        self.reload_all(force).await;
        Ok(())
    }

    async fn handle_auto_reload(&self) -> Result<()> {
        self.auto_reload_changed().await;
        Ok(())
    }

    async fn handle_check_changes(&self, event: Event) -> Result<()> {
        let changes = self.check_file_changes().await;
        let changed_count = changes.values().filter(|changed| **changed).count();
        let response = payload(json!({
            "changes": changes,
            "changed_count": changed_count,
        }));
        self.respond(&event, commands::CHANGES_RESPONSE, response).await;
        Ok(())
    }

    async fn handle_dependency_graph_request(&self, event: Event) -> Result<()> {
        let response = payload(json!({ "graph": to_value(&self.dependency_graph()) }));
        self.respond(&event, commands::DEPENDENCY_GRAPH_RESPONSE, response)
            .await;
        Ok(())
    }

    async fn respond(&self, request: &Event, default_type: &str, response: Payload) {
        let event_type = request.response_event().unwrap_or(default_type).to_string();
        debug!(event_type = %event_type, "Answering control request");
        self.bus().publish(event_type, response).await;
    }
}
