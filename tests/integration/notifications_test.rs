//! Notification preference transmission through the engine

use crate::assert_ok;
use crate::common::*;
use lusotown_engine::engine::notifications::{Language, PreferencesPatch};
use lusotown_engine::engine::platform::Permission;
use lusotown_engine::engine::local_db::LocalDatabase;
use lusotown_engine::engine::Engine;
use lusotown_engine::engine::api::HttpApi;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

#[tokio::test]
async fn test_offline_update_transmitted_once_on_reconnect() {
    let server = MockServer::start().await;
    mount_push(&server).await;
    let (engine, _) = http_engine(fast_config(&server.uri()), true).await;
    engine.start().await.unwrap();
    assert!(engine.notifications().request_enable().await.unwrap());
    assert_eq!(requests_to(&server, "POST", "/push/subscribe").await.len(), 1);

    engine.connectivity().report(false);
    let mut online = engine.connectivity().watch();
    online.wait_for(|online| !*online).await.unwrap();
    engine
        .notifications()
        .update_preferences(PreferencesPatch::default().category("business", true))
        .await
        .unwrap();
    engine
        .notifications()
        .update_preferences(PreferencesPatch::default().language(Language::Pt))
        .await
        .unwrap();
    assert_eq!(requests_to(&server, "POST", "/push/subscribe").await.len(), 1);

    engine.connectivity().report(true);
    let server_ref = &server;
    assert!(
        eventually(Duration::from_secs(5), || async move {
            requests_to(server_ref, "POST", "/push/subscribe").await.len() == 2
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let posted = requests_to(&server, "POST", "/push/subscribe").await;
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[1]["preferences"]["category_flags"]["business"], true);
    assert_eq!(posted[1]["preferences"]["language"], "pt");
    assert!(!engine.notifications().is_dirty().await);

    engine.stop().await;
}

#[tokio::test]
async fn test_denied_permission_never_registers() {
    let server = MockServer::start().await;
    mount_push(&server).await;
    let config = fast_config(&server.uri());
    let platform = Arc::new(FakePushPlatform::new(Permission::Denied));
    let engine = Engine::new(
        config.clone(),
        LocalDatabase::in_memory().await.unwrap(),
        Arc::new(HttpApi::new(config)),
        platform.clone(),
        true,
    )
    .await
    .unwrap();

    assert!(!engine.notifications().request_enable().await.unwrap());

    assert!(!engine.notifications().preferences().await.enabled);
    assert_eq!(platform.permission_requests.load(Ordering::SeqCst), 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_offline_disable_removes_registration_on_reconnect() {
    let server = MockServer::start().await;
    mount_push(&server).await;
    let (engine, _) = http_engine(fast_config(&server.uri()), true).await;
    assert_ok!(engine.start().await);
    assert!(assert_ok!(engine.notifications().request_enable().await));

    engine.connectivity().report(false);
    let mut online = engine.connectivity().watch();
    assert_ok!(online.wait_for(|online| !*online).await);
    assert_ok!(engine.notifications().disable().await);
    assert!(requests_to(&server, "DELETE", "/push/subscribe").await.is_empty());

    engine.connectivity().report(true);
    let server_ref = &server;
    assert!(
        eventually(Duration::from_secs(5), || async move {
            requests_to(server_ref, "DELETE", "/push/subscribe").await.len() == 1
        })
        .await
    );

    let removed = requests_to(&server, "DELETE", "/push/subscribe").await;
    assert_eq!(removed[0]["subscription"], serde_json::to_value(test_subscription()).unwrap());
    assert!(!engine.notifications().has_pending_unregister().await);

    engine.stop().await;
}
