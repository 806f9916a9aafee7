//! Shared Error Types
//!
//! This module defines the error types used across the engine components.
//! Only failures that cannot be absorbed locally end up here: durable store
//! I/O, serialization, configuration and transport failures.
//!
//! # Error Categories
//!
//! - `EngineError` - errors returned by public engine operations
//! - `TransportError` - failures talking to the content, mutation or push endpoints
//!
//! Transport failures are normally absorbed by the component that sees them
//! (retry for the action queue, stale-but-available for bundle sync), so they
//! rarely cross the public boundary.
//!
//! # Usage
//!
//! ```rust
//! use lusotown_engine::shared::error::EngineError;
//!
//! let error = EngineError::store("offline_queue is locked");
//! assert!(error.to_string().contains("offline_queue"));
//! ```
use std::time::Duration;
use thiserror::Error;

use crate::shared::config::ConfigError;

/// Errors returned by public engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Durable local store failure
    #[error("Store error: {message}")]
    StoreError {
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Network failure that could not be absorbed by the caller
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The engine was started twice or stopped before starting
    #[error("Lifecycle error: {message}")]
    LifecycleError {
        /// Human-readable error message
        message: String,
    },
}

impl EngineError {
    /// Create a new store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreError {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new lifecycle error
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::LifecycleError {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::store(err.to_string())
    }
}

/// Failure of a single network call
///
/// Every variant is treated as transient by the components: the action queue
/// counts it as one attempt, the sync engine keeps the previous snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The call did not complete within the configured bound
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with a non-2xx status
    #[error("endpoint returned HTTP {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// The request could not be sent or the response could not be read
    #[error("request failed: {0}")]
    Request(String),

    /// The response body was not what the endpoint contract promises
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Run a network future under the engine's timeout bound
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> std::result::Result<T, TransportError>
where
    F: std::future::Future<Output = std::result::Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
