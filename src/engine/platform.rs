//! Platform capability interfaces
//!
//! The installability signal and the notification/push primitives are
//! provided by the host platform. The engine only depends on these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of showing the install prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    /// The user installed the app
    Accepted,
    /// The user dismissed the prompt
    Dismissed,
}

/// One-shot "show install prompt" capability
///
/// Consumed by value: once `prompt` has been called the capability is gone,
/// so it cannot be invoked a second time.
#[async_trait]
pub trait InstallCapability: Send {
    /// Show the prompt and wait for the user's choice
    async fn prompt(self: Box<Self>) -> InstallOutcome;
}

/// Notification permission state reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
    /// The user closed the request without deciding
    Default,
}

/// Encryption keys of a push subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Push subscription issued by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

/// Failure inside a platform primitive
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("push messaging is not supported on this platform")]
    Unsupported,
    #[error("platform call failed: {0}")]
    Failed(String),
}

/// Notification permission and push subscription primitives
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Ask the user for notification permission
    async fn request_permission(&self) -> Permission;

    /// Subscription the platform already holds, if any
    async fn existing_subscription(&self) -> Option<PushSubscription>;

    /// Create a new push subscription
    async fn subscribe(&self) -> Result<PushSubscription, PlatformError>;

    /// Drop a push subscription
    async fn unsubscribe(&self, subscription: &PushSubscription) -> Result<(), PlatformError>;
}
