//! Cross-bus delivery through a shared relay

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_events::{payload, EventBus, EventRelay, MemoryRelay, Payload};
use tokio::sync::mpsc;

fn bus_on(relay: &MemoryRelay) -> EventBus {
    EventBus::builder().relay(Arc::new(relay.clone())).build()
}

#[tokio::test]
async fn test_event_reaches_other_bus() {
    let relay = MemoryRelay::new();
    let a = bus_on(&relay);
    let b = bus_on(&relay);
    a.start().await;
    b.start().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    b.subscribe("metrics.*", move |event| {
        let tx = tx.clone();
        async move {
            tx.send(event)?;
            Ok(())
        }
    });

    a.publish("metrics.cpu", payload(json!({"value": 42}))).await;

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("relayed event")
        .unwrap();
    assert_eq!(event.event_type(), "metrics.cpu");
    assert_eq!(event.get("value"), Some(&json!(42)));
    assert!(event.get("_origin").is_none());

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn test_own_events_are_not_echoed() {
    let relay = MemoryRelay::new();
    let bus = bus_on(&relay);
    bus.start().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    bus.subscribe("echo", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    });

    bus.publish("echo", Payload::new()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(relay.published_count(), 1);
    bus.stop().await;
}

#[tokio::test]
async fn test_local_only_is_not_forwarded() {
    let relay = MemoryRelay::new();
    let bus = bus_on(&relay);
    bus.start().await;

    bus.publish_local("private", Payload::new()).await;
    assert_eq!(relay.published_count(), 0);

    bus.publish("public", Payload::new()).await;
    assert_eq!(relay.published_count(), 1);
    bus.stop().await;
}

#[tokio::test]
async fn test_stopped_bus_does_not_forward() {
    let relay = MemoryRelay::new();
    let bus = bus_on(&relay);

    bus.publish("before.start", Payload::new()).await;
    assert_eq!(relay.published_count(), 0);
}

#[tokio::test]
async fn test_malformed_relay_message_is_dropped() {
    let relay = MemoryRelay::new();
    let bus = bus_on(&relay);
    bus.start().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    bus.subscribe("*", move |event| {
        let tx = tx.clone();
        async move {
            tx.send(event.event_type().to_string())?;
            Ok(())
        }
    });

    relay
        .publish("dashboard:broken", "{not json".to_string())
        .await
        .unwrap();
    relay
        .publish("dashboard:scalar", "17".to_string())
        .await
        .unwrap();
    relay
        .publish("dashboard:valid", r#"{"ok": true}"#.to_string())
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("ingestion loop survived")
        .unwrap();
    assert_eq!(received, "valid");
    bus.stop().await;
}

#[tokio::test]
async fn test_request_answered_by_other_bus() {
    let relay = MemoryRelay::new();
    let requester = bus_on(&relay);
    let responder = bus_on(&relay);
    requester.start().await;
    responder.start().await;

    let reply_bus = responder.clone();
    responder.subscribe("time.now", move |event| {
        let bus = reply_bus.clone();
        async move {
            let target = event.response_event().ok_or("missing response event")?.to_string();
            bus.publish(target, payload(json!({"now": "noon"}))).await;
            Ok(())
        }
    });

    let response = requester
        .request_response("time.now", Payload::new(), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(response.get("now"), Some(&json!("noon")));

    requester.stop().await;
    responder.stop().await;
}
