//! Event bus

use crate::error::{BusError, Result};
use crate::event::{Event, Payload, META_ORIGIN, META_REQUEST_ID, META_RESPONSE_EVENT};
use crate::handler::{
    EventHandler, FnHandler, HandlerId, HandlerResult, Registration, SubscribeOptions,
};
use crate::pattern::Pattern;
use crate::relay::{EventRelay, RelayMessage, RelaySubscription};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Default relay channel prefix
pub const DEFAULT_CHANNEL_PREFIX: &str = "dashboard:";

/// Marker inserted between a request type and its correlation id
pub const RESPONSE_MARKER: &str = ".response.";

/// Pattern-based publish/subscribe dispatcher
///
/// Handlers are registered against exact event types or glob patterns. A
/// publish invokes every matching handler in descending priority order, ties
/// in registration order, and awaits each before moving on. When a relay is
/// configured and the bus is running, non-local events are also forwarded to
/// the relay and events from other buses are ingested.
///
/// Cloning is cheap; clones share the same registration table.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    /// Origin id stamped on relayed messages
    id: String,
    channel_prefix: String,
    handlers: RwLock<HashMap<String, PatternBucket>>,
    next_seq: AtomicU64,
    running: AtomicBool,
    relay: RwLock<Option<Arc<dyn EventRelay>>>,
    ingestion: Mutex<Option<Ingestion>>,
}

/// Handlers registered under one pattern, sorted by descending priority
struct PatternBucket {
    pattern: Pattern,
    handlers: Vec<Registration>,
}

struct Ingestion {
    cancel: CancellationToken,
    task: JoinHandle<Box<dyn RelaySubscription>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("id", &self.inner.id)
            .field("running", &self.is_running())
            .field("relay_enabled", &self.relay_enabled())
            .field("patterns", &self.inner.handlers.read().len())
            .finish()
    }
}

/// Builder for [`EventBus`]
#[derive(Debug, Default)]
pub struct EventBusBuilder {
    relay: Option<Arc<dyn EventRelay>>,
    channel_prefix: Option<String>,
}

impl EventBusBuilder {
    /// Attach a distributed relay
    pub fn relay(mut self, relay: Arc<dyn EventRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Override the relay channel prefix
    pub fn channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = Some(prefix.into());
        self
    }

    /// Build the bus
    pub fn build(self) -> EventBus {
        let mode = if self.relay.is_some() {
            "relay"
        } else {
            "local-only"
        };

        let bus = EventBus {
            inner: Arc::new(Inner {
                id: Uuid::new_v4().to_string(),
                channel_prefix: self
                    .channel_prefix
                    .unwrap_or_else(|| DEFAULT_CHANNEL_PREFIX.to_string()),
                handlers: RwLock::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                running: AtomicBool::new(false),
                relay: RwLock::new(self.relay),
                ingestion: Mutex::new(None),
            }),
        };

        info!(bus = %bus.id(), mode, "Event bus initialized");
        bus
    }
}

impl EventBus {
    /// Create a local-only event bus
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// Unique id of this bus instance
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Whether the bus has been started
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Whether a relay is attached
    ///
    /// Becomes `false` if the relay failed during [`start`](Self::start).
    pub fn relay_enabled(&self) -> bool {
        self.inner.relay.read().is_some()
    }

    /// Register an async closure for a pattern with default options
    pub fn subscribe<F, Fut>(&self, pattern: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe_with(pattern, SubscribeOptions::default(), handler)
    }

    /// Register an async closure for a pattern
    pub fn subscribe_with<F, Fut>(
        &self,
        pattern: impl Into<String>,
        options: SubscribeOptions,
        handler: F,
    ) -> HandlerId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe_handler(pattern, options, Arc::new(FnHandler(handler)))
    }

    /// Register a handler object for a pattern
    pub fn subscribe_handler(
        &self,
        pattern: impl Into<String>,
        options: SubscribeOptions,
        handler: Arc<dyn EventHandler>,
    ) -> HandlerId {
        let pattern = pattern.into();
        let registration = Registration {
            id: HandlerId::new(),
            once: options.once,
            priority: options.priority,
            seq: self.inner.next_seq.fetch_add(1, Ordering::SeqCst),
            handler,
        };
        let id = registration.id;

        let mut handlers = self.inner.handlers.write();
        let bucket = handlers
            .entry(pattern.clone())
            .or_insert_with(|| PatternBucket {
                pattern: Pattern::new(pattern.clone()),
                handlers: Vec::new(),
            });
        bucket.handlers.push(registration);
        // Stable sort keeps registration order among equal priorities
        bucket
            .handlers
            .sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!(
            pattern = %pattern,
            handler = %id,
            priority = options.priority,
            once = options.once,
            "Registered event handler"
        );

        id
    }

    /// Remove one handler, or every handler under `pattern` when `id` is `None`
    ///
    /// Returns whether anything was removed.
    pub fn unsubscribe(&self, pattern: &str, id: Option<HandlerId>) -> bool {
        let mut handlers = self.inner.handlers.write();

        let Some(id) = id else {
            return handlers.remove(pattern).is_some();
        };

        let Some(bucket) = handlers.get_mut(pattern) else {
            return false;
        };

        let before = bucket.handlers.len();
        bucket.handlers.retain(|h| h.id != id);
        let removed = bucket.handlers.len() != before;

        if bucket.handlers.is_empty() {
            handlers.remove(pattern);
        }

        removed
    }

    /// Number of handlers registered under `pattern`
    pub fn handler_count(&self, pattern: &str) -> usize {
        self.inner
            .handlers
            .read()
            .get(pattern)
            .map(|bucket| bucket.handlers.len())
            .unwrap_or(0)
    }

    /// Registered patterns, sorted
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.inner.handlers.read().keys().cloned().collect();
        patterns.sort();
        patterns
    }

    /// Publish an event locally and, unless the relay is absent, to the relay
    pub async fn publish(&self, event_type: impl Into<String>, payload: Payload) {
        self.emit(Event::new(event_type, payload)).await
    }

    /// Publish an event to local handlers only
    pub async fn publish_local(&self, event_type: impl Into<String>, payload: Payload) {
        self.emit(Event::local(event_type, payload)).await
    }

    /// Publish a prepared event
    pub async fn emit(&self, event: Event) {
        self.inner.dispatch(&event).await;

        if event.is_local_only() || !self.is_running() {
            return;
        }

        let relay = self.inner.relay.read().clone();
        if let Some(relay) = relay {
            self.inner.forward(relay.as_ref(), &event).await;
        }
    }

    /// Publish a request and wait for the first answer on its private response type
    ///
    /// The request payload is augmented with `_request_id` and
    /// `_response_event`; a responder publishes its answer to the latter. On
    /// timeout the one-shot response handler is removed.
    pub async fn request_response(
        &self,
        event_type: &str,
        mut payload: Payload,
        timeout: Duration,
    ) -> Result<Payload> {
        let request_id = Uuid::new_v4().to_string();
        let response_event = format!("{event_type}{RESPONSE_MARKER}{request_id}");

        let (tx, rx) = oneshot::channel::<Payload>();
        let tx = Mutex::new(Some(tx));
        self.subscribe_with(response_event.clone(), SubscribeOptions::once(), move |event| {
            let sender = tx.lock().take();
            async move {
                if let Some(sender) = sender {
                    let _ = sender.send(event.into_payload());
                }
                Ok(())
            }
        });

        payload.insert(META_REQUEST_ID.into(), Value::from(request_id));
        payload.insert(
            META_RESPONSE_EVENT.into(),
            Value::from(response_event.clone()),
        );
        self.publish(event_type, payload).await;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) | Err(_) => {
                self.unsubscribe(&response_event, None);
                warn!(event_type, ?timeout, "Request timed out");
                Err(BusError::timeout(event_type, timeout))
            }
        }
    }

    /// Start the bus
    ///
    /// Idempotent. With a relay attached this subscribes to the relay and
    /// spawns the ingestion loop; any relay failure downgrades the bus to
    /// local-only mode instead of failing.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let relay = self.inner.relay.read().clone();
        if let Some(relay) = relay {
            let pattern = format!("{}*", self.inner.channel_prefix);
            match relay.subscribe(&pattern).await {
                Ok(subscription) => {
                    let cancel = CancellationToken::new();
                    let task = tokio::spawn(run_ingestion(
                        Arc::clone(&self.inner),
                        subscription,
                        cancel.clone(),
                    ));
                    *self.inner.ingestion.lock() = Some(Ingestion { cancel, task });
                    info!(bus = %self.id(), pattern = %pattern, "Event bus started with relay");
                    return;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Failed to start relay subscriber, falling back to local-only mode"
                    );
                    *self.inner.relay.write() = None;
                }
            }
        }

        info!(bus = %self.id(), "Event bus started in local-only mode");
    }

    /// Stop the bus
    ///
    /// Cancels the ingestion loop, waits for it to exit and closes the relay
    /// subscription. Close errors are logged, never returned.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let ingestion = self.inner.ingestion.lock().take();
        if let Some(Ingestion { cancel, task }) = ingestion {
            cancel.cancel();
            match task.await {
                Ok(mut subscription) => {
                    if let Err(e) = subscription.close().await {
                        warn!(error = %e, "Error closing relay subscription");
                    }
                }
                Err(e) => warn!(error = %e, "Relay ingestion task failed"),
            }
        }

        info!(bus = %self.id(), "Event bus stopped");
    }

    /// Registration and relay statistics
    ///
    /// Relay connectivity is probed with a ping; a failed ping reports
    /// "not connected" rather than an error.
    pub async fn stats(&self) -> BusStats {
        let relay = self.inner.relay.read().clone();
        let relay_connected = match relay.as_ref() {
            Some(relay) => relay.ping().await.is_ok(),
            None => false,
        };

        let handlers: BTreeMap<String, usize> = self
            .inner
            .handlers
            .read()
            .iter()
            .map(|(pattern, bucket)| (pattern.clone(), bucket.handlers.len()))
            .collect();

        BusStats {
            running: self.is_running(),
            relay_enabled: relay.is_some(),
            relay_connected,
            pattern_count: handlers.len(),
            handler_count: handlers.values().sum(),
            handlers,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Collect the handlers matching `event_type` in dispatch order
    ///
    /// One-shot handlers are removed from the table here, under the write
    /// lock, so concurrent publishes can never both run them.
    fn take_matching(&self, event_type: &str) -> Vec<Registration> {
        let mut handlers = self.handlers.write();
        let mut matched = Vec::new();

        handlers.retain(|_, bucket| {
            if !bucket.pattern.matches(event_type) {
                return true;
            }
            matched.extend(bucket.handlers.iter().cloned());
            bucket.handlers.retain(|h| !h.once);
            !bucket.handlers.is_empty()
        });

        matched.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        matched
    }

    /// Invoke every matching handler, isolating failures
    async fn dispatch(&self, event: &Event) -> usize {
        let handlers = self.take_matching(event.event_type());
        if handlers.is_empty() {
            trace!(event_type = %event.event_type(), "No handlers for event");
            return 0;
        }

        for registration in &handlers {
            let call = registration.handler.handle(event.clone());
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        event_type = %event.event_type(),
                        handler = %registration.id,
                        error = %e,
                        "Error in event handler"
                    );
                }
                Err(panic) => {
                    error!(
                        event_type = %event.event_type(),
                        handler = %registration.id,
                        panic = %panic_message(panic.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        debug!(
            event_type = %event.event_type(),
            handlers = handlers.len(),
            "Handled event"
        );
        handlers.len()
    }

    async fn forward(&self, relay: &dyn EventRelay, event: &Event) {
        let channel = format!("{}{}", self.channel_prefix, event.event_type());
        let message = match serde_json::to_string(&event.to_wire(&self.id)) {
            Ok(message) => message,
            Err(e) => {
                error!(event_type = %event.event_type(), error = %e, "Failed to encode event");
                return;
            }
        };

        match relay.publish(&channel, message).await {
            Ok(()) => debug!(event_type = %event.event_type(), "Published event to relay"),
            Err(e) => {
                error!(event_type = %event.event_type(), error = %e, "Failed to publish event to relay")
            }
        }
    }

    async fn ingest(&self, message: RelayMessage) {
        let Some(event_type) = message.channel.strip_prefix(&self.channel_prefix) else {
            trace!(channel = %message.channel, "Ignoring relay message outside prefix");
            return;
        };

        let wire: Payload = match serde_json::from_str(&message.payload) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                error!(event_type, "Relay payload is not a JSON object");
                return;
            }
            Err(e) => {
                error!(event_type, error = %e, "Invalid JSON in relayed event");
                return;
            }
        };

        if wire.get(META_ORIGIN).and_then(Value::as_str) == Some(self.id.as_str()) {
            trace!(event_type, "Skipping relayed event published by this bus");
            return;
        }

        // Dispatch only: relayed events are never forwarded again
        let event = Event::from_wire(event_type, wire);
        self.dispatch(&event).await;
    }
}

async fn run_ingestion(
    inner: Arc<Inner>,
    mut subscription: Box<dyn RelaySubscription>,
    cancel: CancellationToken,
) -> Box<dyn RelaySubscription> {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = subscription.next_message() => message,
        };

        match message {
            Some(message) => inner.ingest(message).await,
            None => {
                warn!("Relay subscription closed, ingestion loop exiting");
                break;
            }
        }
    }

    debug!("Relay ingestion loop stopped");
    subscription
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Event bus statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Whether the bus is running
    pub running: bool,

    /// Whether a relay is attached
    pub relay_enabled: bool,

    /// Whether the relay answered a ping
    pub relay_connected: bool,

    /// Number of registered patterns
    pub pattern_count: usize,

    /// Number of registered handlers across all patterns
    pub handler_count: usize,

    /// Handler count per pattern
    pub handlers: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::payload;
    use crate::relay::MemoryRelay;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> impl Fn(Event) -> futures::future::Ready<HandlerResult> {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        move |_event| {
            log.lock().push(tag.clone());
            futures::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_priority_order_with_ties() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe_with("a.b", SubscribeOptions::priority(1), recorder(&log, "low-1"));
        bus.subscribe_with("a.*", SubscribeOptions::priority(10), recorder(&log, "high"));
        bus.subscribe_with("a.b", SubscribeOptions::priority(1), recorder(&log, "low-2"));
        bus.subscribe_with("a.?", SubscribeOptions::priority(5), recorder(&log, "mid"));
        bus.subscribe_with("*", SubscribeOptions::priority(1), recorder(&log, "low-3"));

        bus.publish("a.b", Payload::new()).await;

        assert_eq!(*log.lock(), vec!["high", "mid", "low-1", "low-2", "low-3"]);
    }

    #[tokio::test]
    async fn test_once_handler_fires_once() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        bus.subscribe_with("tick", SubscribeOptions::once(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });

        for _ in 0..3 {
            bus.publish("tick", Payload::new()).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count("tick"), 0);
        assert!(bus.patterns().is_empty());
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl EventHandler for Panicking {
        async fn handle(&self, _event: Event) -> HandlerResult {
            panic!("handler panicked")
        }
    }

    #[tokio::test]
    async fn test_handler_failure_is_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe_with("job.*", SubscribeOptions::priority(3), |_| async {
            Err("boom".into())
        });
        bus.subscribe_handler("job.*", SubscribeOptions::priority(2), Arc::new(Panicking));
        bus.subscribe("job.done", recorder(&log, "after"));

        bus.publish("job.done", Payload::new()).await;

        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBus::new();
        let first = bus.subscribe("x", |_| async { Ok(()) });
        bus.subscribe("x", |_| async { Ok(()) });
        assert_eq!(bus.handler_count("x"), 2);

        assert!(bus.unsubscribe("x", Some(first)));
        assert!(!bus.unsubscribe("x", Some(first)));
        assert_eq!(bus.handler_count("x"), 1);

        assert!(bus.unsubscribe("x", None));
        assert_eq!(bus.handler_count("x"), 0);
        assert!(!bus.unsubscribe("missing", None));
    }

    #[tokio::test]
    async fn test_request_response() {
        let bus = EventBus::new();
        let responder = bus.clone();
        bus.subscribe("ping", move |event| {
            let bus = responder.clone();
            async move {
                let target = event.response_event().ok_or("not a request")?.to_string();
                bus.publish(target, payload(json!({"pong": true}))).await;
                Ok(())
            }
        });

        let response = bus
            .request_response("ping", Payload::new(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(response.get("pong"), Some(&json!(true)));
        assert_eq!(bus.patterns(), vec!["ping".to_string()]);
    }

    #[tokio::test]
    async fn test_request_timeout_removes_handler() {
        let bus = EventBus::new();
        let started = tokio::time::Instant::now();

        let result = bus
            .request_response("ping", Payload::new(), Duration::from_millis(50))
            .await;

        assert!(matches!(result, Err(BusError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(bus.patterns().is_empty());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let bus = EventBus::new();
        bus.start().await;
        bus.start().await;
        assert!(bus.is_running());

        bus.stop().await;
        bus.stop().await;
        assert!(!bus.is_running());
    }

    #[tokio::test]
    async fn test_start_downgrades_when_relay_unavailable() {
        let relay = MemoryRelay::new();
        relay.set_available(false);
        let bus = EventBus::builder().relay(Arc::new(relay)).build();

        bus.start().await;

        assert!(bus.is_running());
        assert!(!bus.relay_enabled());
        bus.publish("still.local", Payload::new()).await;
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_relay_publish_failure_is_swallowed() {
        let relay = MemoryRelay::new();
        let bus = EventBus::builder().relay(Arc::new(relay.clone())).build();
        bus.start().await;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.subscribe("evt", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });

        relay.set_available(false);
        bus.publish("evt", Payload::new()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = bus.stats().await;
        assert!(stats.relay_enabled);
        assert!(!stats.relay_connected);

        relay.set_available(true);
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = EventBus::new();
        bus.subscribe("a", |_| async { Ok(()) });
        bus.subscribe("a", |_| async { Ok(()) });
        bus.subscribe("b.*", |_| async { Ok(()) });

        let stats = bus.stats().await;
        assert!(!stats.running);
        assert!(!stats.relay_enabled);
        assert!(!stats.relay_connected);
        assert_eq!(stats.pattern_count, 2);
        assert_eq!(stats.handler_count, 3);
        assert_eq!(stats.handlers.get("a"), Some(&2));
    }
}
