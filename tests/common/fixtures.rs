//! Engine and database fixtures

use crate::common::platform::FakePushPlatform;
use lusotown_engine::engine::api::HttpApi;
use lusotown_engine::engine::local_db::LocalDatabase;
use lusotown_engine::engine::platform::Permission;
use lusotown_engine::engine::Engine;
use lusotown_engine::shared::EngineConfig;
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Route engine logs to the test writer; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lusotown_engine=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Configuration with short timers, pointed at `base_url`
pub fn fast_config(base_url: &str) -> EngineConfig {
    EngineConfig::builder()
        .api_base_url(base_url)
        .connectivity_debounce(Duration::from_millis(20))
        .network_timeout(Duration::from_secs(2))
        .retry_delays(Duration::from_millis(20), Duration::from_millis(100))
        .forced_sync_debounce(Duration::from_millis(200))
        .sync_interval(Duration::from_secs(3600))
        .build()
        .expect("test config is valid")
}

/// Engine over HTTP and an in-memory store
pub async fn http_engine(config: EngineConfig, online: bool) -> (Engine, Arc<FakePushPlatform>) {
    let db = LocalDatabase::in_memory().await.expect("in-memory database");
    engine_with_db(config, db, online).await
}

/// Engine over HTTP and the given store
pub async fn engine_with_db(
    config: EngineConfig,
    db: LocalDatabase,
    online: bool,
) -> (Engine, Arc<FakePushPlatform>) {
    init_tracing();
    let api = Arc::new(HttpApi::new(config.clone()));
    let platform = Arc::new(FakePushPlatform::new(Permission::Granted));
    let engine = Engine::new(config, db, api, platform.clone(), online)
        .await
        .expect("engine assembles");
    (engine, platform)
}
