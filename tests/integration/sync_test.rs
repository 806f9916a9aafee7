//! Content sync scenarios through the engine

use crate::common::*;
use lusotown_engine::shared::EngineEvent;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::MockServer;

#[tokio::test]
async fn test_failing_bundle_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_bundle(&server, "events", json!([{"id": "evt-1"}])).await;
    mount_bundle(&server, "businesses", json!([{"id": "biz-1"}])).await;
    mount_bundle(&server, "community", json!([])).await;
    let (engine, _) = http_engine(fast_config(&server.uri()), true).await;
    engine.sync().sync_now().await;

    server.reset().await;
    mount_bundle(&server, "events", json!([{"id": "evt-2"}, {"id": "evt-3"}])).await;
    mount_bundle_status(&server, "businesses", 500).await;
    mount_bundle(&server, "community", json!([])).await;
    let snapshot = engine.sync().sync_now().await;

    let events = &snapshot.bundles["events"];
    assert_eq!(events.items, vec![json!({"id": "evt-2"}), json!({"id": "evt-3"})]);
    assert_eq!(events.cache_key, "events@v2");

    let businesses = &snapshot.bundles["businesses"];
    assert_eq!(businesses.items, vec![json!({"id": "biz-1"})]);
    assert_eq!(businesses.cache_key, "businesses@v1");
    assert_eq!(engine.sync().stale_bundles().await, vec!["businesses".to_string()]);
}

#[tokio::test]
async fn test_reconnect_forces_one_sync() {
    let server = MockServer::start().await;
    mount_bundle(&server, "events", json!([{"id": "evt-1"}])).await;
    mount_bundle(&server, "businesses", json!([])).await;
    mount_bundle(&server, "community", json!([])).await;
    let (engine, _) = http_engine(fast_config(&server.uri()), false).await;
    let mut events = engine.events();
    engine.start().await.unwrap();

    engine.connectivity().report(true);

    let sync = engine.sync();
    assert!(eventually(Duration::from_secs(5), || async move { sync.latest_snapshot("events").await.is_some() }).await);
    assert_eq!(events.recv().await.unwrap(), EngineEvent::BecameOnline);
    assert_eq!(requests_to(&server, "GET", "/content/events").await.len(), 1);

    engine.stop().await;
}

#[tokio::test]
async fn test_flapping_connectivity_triggers_one_sync() {
    let server = MockServer::start().await;
    mount_bundle(&server, "events", json!([])).await;
    mount_bundle(&server, "businesses", json!([])).await;
    mount_bundle(&server, "community", json!([])).await;
    let (engine, _) = http_engine(fast_config(&server.uri()), false).await;
    engine.start().await.unwrap();

    for _ in 0..3 {
        engine.connectivity().report(true);
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.connectivity().report(false);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.connectivity().report(true);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(requests_to(&server, "GET", "/content/events").await.len(), 1);

    engine.stop().await;
}

#[tokio::test]
async fn test_sync_while_offline_serves_cache() {
    let server = MockServer::start().await;
    let (engine, _) = http_engine(fast_config(&server.uri()), false).await;

    let snapshot = engine.sync().sync_now().await;

    assert!(snapshot.bundles.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
