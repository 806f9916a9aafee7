//! HttpApi against wiremock

use crate::common::*;
use assert_matches::assert_matches;
use lusotown_engine::engine::api::{EngineApi, HttpApi, PushRegistration};
use lusotown_engine::engine::notifications::NotificationPreferences;
use lusotown_engine::engine::offline::ActionKind;
use lusotown_engine::shared::TransportError;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn api_for(server: &MockServer) -> HttpApi {
    HttpApi::new(fast_config(&server.uri()))
}

#[tokio::test]
async fn test_fetch_bundle_returns_items() {
    let server = MockServer::start().await;
    mount_bundle(&server, "events", json!([{"id": "evt-1"}, {"id": "evt-2"}])).await;

    let items = api_for(&server).await.fetch_bundle("events").await.unwrap();

    assert_eq!(items, vec![json!({"id": "evt-1"}), json!({"id": "evt-2"})]);
}

#[tokio::test]
async fn test_fetch_bundle_maps_status() {
    let server = MockServer::start().await;
    mount_bundle_status(&server, "businesses", 503).await;

    let result = api_for(&server).await.fetch_bundle("businesses").await;

    assert_eq!(result, Err(TransportError::Status { status: 503 }));
}

#[tokio::test]
async fn test_fetch_bundle_rejects_non_array() {
    let server = MockServer::start().await;
    mount_bundle(&server, "community", json!({"items": []})).await;

    let result = api_for(&server).await.fetch_bundle("community").await;

    assert_matches!(result, Err(TransportError::Malformed(_)));
}

#[tokio::test]
async fn test_post_mutation_uses_kind_path_and_payload_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mutations/rsvp-event"))
        .and(body_json(json!({"id": "evt-9", "going": true})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = api_for(&server)
        .await
        .post_mutation(ActionKind::RsvpEvent, &json!({"id": "evt-9", "going": true}))
        .await;

    assert_eq!(result, Ok(()));
}

#[tokio::test]
async fn test_register_and_unregister_push() {
    let server = MockServer::start().await;
    mount_push(&server).await;
    let api = api_for(&server).await;

    let registration = PushRegistration {
        subscription: test_subscription(),
        preferences: NotificationPreferences::default(),
    };
    api.register_push(&registration).await.unwrap();
    api.unregister_push(&test_subscription()).await.unwrap();

    let posted = requests_to(&server, "POST", "/push/subscribe").await;
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0]["subscription"]["endpoint"], "https://push.example/lusotown/abc");
    assert_eq!(posted[0]["preferences"]["region"], "all");

    let deleted = requests_to(&server, "DELETE", "/push/subscribe").await;
    assert_eq!(deleted, vec![json!({"subscription": serde_json::to_value(test_subscription()).unwrap()})]);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_request_error() {
    let api = HttpApi::new(fast_config("http://127.0.0.1:9"));

    let result = api.fetch_bundle("events").await;

    assert_matches!(result, Err(TransportError::Request(_)));
}
