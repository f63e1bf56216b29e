//! Event value type and wire metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered event payload
pub type Payload = serde_json::Map<String, Value>;

/// Metadata key carrying the originating event type on the relay
pub const META_EVENT_TYPE: &str = "_event_type";

/// Metadata key carrying the publish timestamp on the relay
pub const META_TIMESTAMP: &str = "_timestamp";

/// Metadata key carrying the local-only flag on the relay
pub const META_LOCAL_ONLY: &str = "_local_only";

/// Metadata key carrying the id of the publishing bus on the relay
pub const META_ORIGIN: &str = "_origin";

/// Payload key carrying the correlation id of a request
pub const META_REQUEST_ID: &str = "_request_id";

/// Payload key carrying the private response event type of a request
pub const META_RESPONSE_EVENT: &str = "_response_event";

const RELAY_METADATA: [&str; 4] = [META_EVENT_TYPE, META_TIMESTAMP, META_LOCAL_ONLY, META_ORIGIN];

/// An immutable event delivered through the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_type: String,
    payload: Payload,
    timestamp: DateTime<Utc>,
    local_only: bool,
}

impl Event {
    /// Create a new event stamped with the current time
    pub fn new(event_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
            local_only: false,
        }
    }

    /// Create a new event that is never forwarded to the relay
    pub fn local(event_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            local_only: true,
            ..Self::new(event_type, payload)
        }
    }

    /// Event type
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Event payload
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Consume the event and return its payload
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// When the event was published
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether the event stays inside this process
    pub fn is_local_only(&self) -> bool {
        self.local_only
    }

    /// Get a payload value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Get a string payload value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Get a boolean payload value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(Value::as_bool)
    }

    /// Correlation id, if this event is a request
    pub fn request_id(&self) -> Option<&str> {
        self.get_str(META_REQUEST_ID)
    }

    /// Event type a responder should publish its answer to, if this event is a request
    pub fn response_event(&self) -> Option<&str> {
        self.get_str(META_RESPONSE_EVENT)
    }

    /// Encode the payload plus relay metadata for the distributed channel
    pub fn to_wire(&self, origin: &str) -> Payload {
        let mut wire = self.payload.clone();
        wire.insert(META_EVENT_TYPE.into(), Value::from(self.event_type.clone()));
        wire.insert(META_TIMESTAMP.into(), Value::from(self.timestamp.to_rfc3339()));
        wire.insert(META_LOCAL_ONLY.into(), Value::from(self.local_only));
        wire.insert(META_ORIGIN.into(), Value::from(origin));
        wire
    }

    /// Rebuild an event received from the distributed channel
    ///
    /// Relay metadata is stripped from the payload. Request fields stay, so
    /// relayed requests can still be answered.
    pub fn from_wire(event_type: impl Into<String>, mut wire: Payload) -> Self {
        let timestamp = wire
            .get(META_TIMESTAMP)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        for key in RELAY_METADATA {
            wire.remove(key);
        }

        Self {
            event_type: event_type.into(),
            payload: wire,
            timestamp,
            local_only: false,
        }
    }
}

/// Build a [`Payload`] from a JSON object literal
///
/// Non-object values produce an empty payload.
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}
