//! Logging setup for host applications
//!
//! The engine only emits `tracing` events. Hosts that have no subscriber of
//! their own can install this one; the filter falls back to `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Default filter used when neither an explicit filter nor `RUST_LOG` is set
pub const DEFAULT_FILTER: &str = "lusotown_engine=info";

/// Install a formatting subscriber
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(filter: Option<&str>) -> bool {
    let env_filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
