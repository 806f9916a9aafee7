//! LusoTown Engine - Offline-first client runtime
//!
//! Keeps the LusoTown client usable without a network: user mutations are
//! queued durably and replayed on reconnect, content bundles are cached and
//! refreshed on a timer, push preferences are re-sent once connectivity
//! returns, and the install prompt is surfaced at the right moment.
//!
//! # Module Structure
//!
//! - **`shared`** - Configuration, error types and the engine event bus
//!
//! - **`engine`** - The runtime components
//!   - Connectivity monitor with debounced edges
//!   - Durable action queue with bounded retry
//!   - Content sync with per-bundle atomic replace
//!   - Notification subscription manager
//!   - Installation lifecycle state machine
//!   - SQLite persistence via sqlx
//!
//! # Feature Flags
//!
//! - **`subscriber`** - Enables `shared::logging::init_logging`, a
//!   `tracing-subscriber` setup for hosts that do not install their own
//!
//! # Usage
//!
//! ```rust,no_run
//! use lusotown_engine::engine::Engine;
//! use lusotown_engine::shared::EngineConfig;
//! # use std::sync::Arc;
//! # async fn example(push: Arc<dyn lusotown_engine::engine::platform::PushPlatform>) -> lusotown_engine::shared::error::Result<()> {
//! let engine = Engine::open(EngineConfig::from_env()?, push, true).await?;
//! engine.start().await?;
//!
//! let mut events = engine.events();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Every component is `Send + Sync`. Shared state lives behind
//! `tokio::sync` locks or atomics, and events fan out through
//! `broadcast::Sender`.
//!
//! # Error Handling
//!
//! - Network failures are absorbed by the component that made the call and
//!   only show up as pending counts, stale bundles or engine events
//! - Local store failures surface as `shared::error::EngineError`

/// Configuration, errors and events
pub mod shared;

/// Offline engine components
pub mod engine;
