//! Durable state across engine restarts

use crate::common::*;
use lusotown_engine::engine::local_db::LocalDatabase;
use lusotown_engine::engine::offline::ActionKind;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::MockServer;

#[tokio::test]
async fn test_queue_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("engine.db");
    let config = fast_config("http://127.0.0.1:9");

    let ids = {
        let db = LocalDatabase::open(&db_path).await.unwrap();
        let (engine, _) = engine_with_db(config.clone(), db.clone(), false).await;
        let first = engine.enqueue(ActionKind::FavoriteEvent, json!({"id": "evt-1"})).await.unwrap();
        let second = engine.enqueue(ActionKind::SaveBusiness, json!({"id": "biz-2"})).await.unwrap();
        drop(engine);
        db.close().await;
        vec![first, second]
    };

    let db = LocalDatabase::open(&db_path).await.unwrap();
    let (engine, _) = engine_with_db(config, db, false).await;

    let pending = engine.queue().list_pending().await.unwrap();
    let pending_ids: Vec<String> = pending.iter().map(|action| action.id.clone()).collect();
    assert_eq!(pending_ids, ids);
    assert_eq!(pending[1].payload, json!({"id": "biz-2"}));
}

#[tokio::test]
async fn test_cached_bundles_served_after_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("engine.db");
    let server = MockServer::start().await;
    mount_bundle(&server, "events", json!([{"id": "evt-1", "title": "Santos Populares"}])).await;
    mount_bundle(&server, "businesses", json!([])).await;
    mount_bundle(&server, "community", json!([])).await;
    let config = fast_config(&server.uri());

    {
        let db = LocalDatabase::open(&db_path).await.unwrap();
        let (engine, _) = engine_with_db(config.clone(), db.clone(), true).await;
        engine.sync().sync_now().await;
        drop(engine);
        db.close().await;
    }

    let db = LocalDatabase::open(&db_path).await.unwrap();
    let (engine, _) = engine_with_db(config, db, false).await;

    let events = engine.sync().latest_snapshot("events").await.unwrap();
    assert_eq!(events.items[0]["title"], "Santos Populares");
    assert_eq!(events.version, 1);
}
