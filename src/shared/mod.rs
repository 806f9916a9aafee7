//! Shared Module
//!
//! Types used by every engine component: configuration, error types and the
//! engine event bus.

/// Shared error types
pub mod error;

/// Engine configuration
pub mod config;

/// Engine event bus
pub mod event;

/// Logging setup for host applications
#[cfg(feature = "subscriber")]
pub mod logging;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, EngineConfig, EngineConfigBuilder};
pub use error::{EngineError, TransportError};
pub use event::{EngineEvent, EngineEventBroadcast, PermanentFailure};
