//! Content, mutation and push-registration endpoints
//!
//! `EngineApi` is the seam between the engine and the network. Components
//! only see this trait; `HttpApi` is the reqwest implementation used in
//! production and tests substitute in-memory fakes.
//!
//! Endpoints:
//!
//! - `GET /content/{bundle}` → JSON array of items
//! - `POST /mutations/{kind}` → 2xx on success, body is the action payload
//! - `POST /push/subscribe` → `{ subscription, preferences }`
//! - `DELETE /push/subscribe` → `{ subscription }`
//!
//! Timeouts are applied by the calling component, not here.

use crate::engine::notifications::NotificationPreferences;
use crate::engine::offline::ActionKind;
use crate::engine::platform::PushSubscription;
use crate::shared::config::EngineConfig;
use crate::shared::error::TransportError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

/// Body sent to the push-registration endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushRegistration {
    /// Platform push subscription
    pub subscription: PushSubscription,
    /// Preferences the delivery layer filters with
    pub preferences: NotificationPreferences,
}

/// Network collaborator of the engine
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Fetch every item of a bundle
    async fn fetch_bundle(&self, bundle: &str) -> Result<Vec<serde_json::Value>, TransportError>;

    /// Apply a queued mutation
    async fn post_mutation(&self, kind: ActionKind, payload: &serde_json::Value) -> Result<(), TransportError>;

    /// Register (or re-register) a push subscription with its preferences
    async fn register_push(&self, registration: &PushRegistration) -> Result<(), TransportError>;

    /// Remove a push subscription
    async fn unregister_push(&self, subscription: &PushSubscription) -> Result<(), TransportError>;
}

/// reqwest-backed implementation of [`EngineApi`]
#[derive(Debug, Clone)]
pub struct HttpApi {
    config: EngineConfig,
    client: Client,
}

impl HttpApi {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Use a preconfigured client (proxies, default headers)
    pub fn with_client(config: EngineConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn ensure_success(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl EngineApi for HttpApi {
    async fn fetch_bundle(&self, bundle: &str) -> Result<Vec<serde_json::Value>, TransportError> {
        let url = self.config.api_url(&format!("/content/{}", bundle));
        tracing::debug!(bundle, url = %url, "Fetching bundle");

        let response = self.client.get(&url).send().await?;
        let response = Self::ensure_success(response)?;
        let items = response.json::<Vec<serde_json::Value>>().await?;
        Ok(items)
    }

    async fn post_mutation(&self, kind: ActionKind, payload: &serde_json::Value) -> Result<(), TransportError> {
        let url = self.config.api_url(&format!("/mutations/{}", kind.path_segment()));

        let response = self.client.post(&url).json(payload).send().await?;
        Self::ensure_success(response)?;
        Ok(())
    }

    async fn register_push(&self, registration: &PushRegistration) -> Result<(), TransportError> {
        let url = self.config.api_url("/push/subscribe");

        let response = self.client.post(&url).json(registration).send().await?;
        Self::ensure_success(response)?;
        Ok(())
    }

    async fn unregister_push(&self, subscription: &PushSubscription) -> Result<(), TransportError> {
        let url = self.config.api_url("/push/subscribe");
        let body = serde_json::json!({ "subscription": subscription });

        let response = self.client.delete(&url).json(&body).send().await?;
        Self::ensure_success(response)?;
        Ok(())
    }
}
