//! # Content Sync Engine
//!
//! Keeps a local, versioned copy of the prioritized content bundles (events,
//! businesses, community) so the app can render without a network.
//!
//! ## Key Components
//!
//! - `ContentSync`: fetches every bundle concurrently and swaps snapshots in
//! - `scheduler.rs`: periodic timer and forced-sync spacing
//!
//! ## Sync Strategy
//!
//! Each bundle is refetched whole and replaced whole. There is no diffing:
//! a successful fetch becomes a new `BundleSnapshot` with the next version,
//! written to disk in one row and swapped into memory as one `Arc`. A failed
//! fetch leaves the previous snapshot in place and marks the bundle stale.

pub mod scheduler;

pub use scheduler::{ForcedSyncGate, PeriodicHandle};

use crate::engine::api::EngineApi;
use crate::engine::busy::{BusyFlag, BusyGuard};
use crate::engine::connectivity::ConnectivityMonitor;
use crate::engine::local_db::LocalDatabase;
use crate::shared::config::EngineConfig;
use crate::shared::error::{with_timeout, Result};
use crate::shared::event::{broadcast_event, EngineEvent, EngineEventBroadcast};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cached content of one bundle, from a single fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleSnapshot {
    /// Bundle name
    pub bundle: String,
    /// Items as returned by the content endpoint
    pub items: Vec<serde_json::Value>,
    /// Increments on every successful fetch, starting at 1
    pub version: u64,
    /// `"{bundle}@v{version}"`
    pub cache_key: String,
    /// Time of the fetch
    pub fetched_at: DateTime<Utc>,
}

impl BundleSnapshot {
    pub fn new(bundle: impl Into<String>, version: u64, items: Vec<serde_json::Value>, fetched_at: DateTime<Utc>) -> Self {
        let bundle = bundle.into();
        Self {
            cache_key: cache_key(&bundle, version),
            bundle,
            items,
            version,
            fetched_at,
        }
    }
}

/// Cache key of a bundle version
pub fn cache_key(bundle: &str, version: u64) -> String {
    format!("{}@v{}", bundle, version)
}

/// Point-in-time view of all cached bundles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSnapshot {
    pub bundles: BTreeMap<String, Arc<BundleSnapshot>>,
    /// Last sync in which at least one bundle was refreshed
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct CacheState {
    snapshots: HashMap<String, Arc<BundleSnapshot>>,
    stale: BTreeSet<String>,
    last_synced_at: Option<DateTime<Utc>>,
}

impl CacheState {
    fn view(&self) -> SyncSnapshot {
        SyncSnapshot {
            bundles: self
                .snapshots
                .iter()
                .map(|(name, snapshot)| (name.clone(), snapshot.clone()))
                .collect(),
            last_synced_at: self.last_synced_at,
        }
    }
}

struct SyncInner {
    db: LocalDatabase,
    api: Arc<dyn EngineApi>,
    connectivity: ConnectivityMonitor,
    events: EngineEventBroadcast,
    bundles: Vec<String>,
    timeout: Duration,
    cache: RwLock<CacheState>,
    syncing: BusyFlag,
    forced_gate: ForcedSyncGate,
}

/// Bundle fetcher and cache
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct ContentSync {
    inner: Arc<SyncInner>,
}

impl ContentSync {
    /// Create the engine, serving whatever the durable store already holds
    pub async fn load(
        db: LocalDatabase,
        api: Arc<dyn EngineApi>,
        connectivity: ConnectivityMonitor,
        events: EngineEventBroadcast,
        config: &EngineConfig,
    ) -> Result<Self> {
        let mut cache = CacheState::default();
        for snapshot in db.load_snapshots().await? {
            cache.last_synced_at = cache.last_synced_at.max(Some(snapshot.fetched_at));
            cache.snapshots.insert(snapshot.bundle.clone(), Arc::new(snapshot));
        }
        if !cache.snapshots.is_empty() {
            tracing::info!(bundles = cache.snapshots.len(), "Loaded cached bundles");
        }

        Ok(Self {
            inner: Arc::new(SyncInner {
                db,
                api,
                connectivity,
                events,
                bundles: config.bundles.clone(),
                timeout: config.network_timeout,
                cache: RwLock::new(cache),
                syncing: BusyFlag::new(),
                forced_gate: ForcedSyncGate::new(config.forced_sync_debounce),
            }),
        })
    }

    /// Fetch every configured bundle and return the resulting cache
    ///
    /// Skipped while offline. A call made while another sync is running
    /// returns the current cache without fetching.
    pub async fn sync_now(&self) -> SyncSnapshot {
        if !self.inner.connectivity.is_online() {
            tracing::debug!("Offline; sync skipped");
            return self.snapshot().await;
        }
        let Some(guard) = self.inner.syncing.try_acquire() else {
            tracing::debug!("Sync already in progress");
            return self.snapshot().await;
        };
        self.run_sync(guard).await
    }

    async fn run_sync(&self, _guard: BusyGuard<'_>) -> SyncSnapshot {
        let fetches = self.inner.bundles.iter().map(|bundle| async move {
            let result = with_timeout(self.inner.timeout, self.inner.api.fetch_bundle(bundle)).await;
            (bundle.as_str(), result)
        });
        let results = join_all(fetches).await;

        let mut refreshed = 0usize;
        for (bundle, result) in results {
            match result {
                Ok(items) => {
                    self.replace_bundle(bundle, items).await;
                    refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!(bundle, error = %e, "Bundle fetch failed; keeping previous snapshot");
                    self.inner.cache.write().await.stale.insert(bundle.to_string());
                }
            }
        }

        let mut cache = self.inner.cache.write().await;
        if refreshed > 0 {
            cache.last_synced_at = Some(Utc::now());
        }
        tracing::info!(refreshed, stale = cache.stale.len(), "Content sync finished");
        cache.view()
    }

    async fn replace_bundle(&self, bundle: &str, items: Vec<serde_json::Value>) {
        let version = self
            .inner
            .cache
            .read()
            .await
            .snapshots
            .get(bundle)
            .map_or(1, |previous| previous.version + 1);
        let snapshot = Arc::new(BundleSnapshot::new(bundle, version, items, Utc::now()));

        if let Err(e) = self.inner.db.save_snapshot(&snapshot).await {
            tracing::error!(bundle, error = %e, "Failed to persist bundle snapshot");
        }

        {
            let mut cache = self.inner.cache.write().await;
            cache.snapshots.insert(bundle.to_string(), snapshot.clone());
            cache.stale.remove(bundle);
        }

        tracing::debug!(bundle, cache_key = %snapshot.cache_key, items = snapshot.items.len(), "Bundle replaced");
        broadcast_event(
            &self.inner.events,
            EngineEvent::BundleRefreshed {
                bundle: bundle.to_string(),
                version,
            },
        );
    }

    /// Sync right away unless a forced sync ran within the spacing window
    ///
    /// Returns `None` when nothing was fetched: offline, another sync already
    /// running, or a forced sync too recent. Only a sync that actually runs
    /// uses up the spacing window.
    pub async fn force_sync(&self) -> Option<SyncSnapshot> {
        if !self.inner.connectivity.is_online() {
            tracing::debug!("Offline; forced sync skipped");
            return None;
        }
        let Some(guard) = self.inner.syncing.try_acquire() else {
            tracing::debug!("Forced sync skipped; a sync is already running");
            return None;
        };
        if !self.inner.forced_gate.try_acquire().await {
            tracing::debug!("Forced sync suppressed; previous one too recent");
            return None;
        }
        Some(self.run_sync(guard).await)
    }

    /// Sync every `interval` while online
    pub fn schedule_periodic(&self, interval: Duration) -> PeriodicHandle {
        let sync = self.clone();
        tracing::info!(?interval, "Scheduling periodic content sync");
        PeriodicHandle::spawn(interval, move || {
            let sync = sync.clone();
            async move {
                if !sync.inner.connectivity.is_online() {
                    tracing::trace!("Periodic sync tick while offline");
                    return;
                }
                sync.sync_now().await;
            }
        })
    }

    /// Current snapshot of one bundle
    pub async fn latest_snapshot(&self, bundle: &str) -> Option<Arc<BundleSnapshot>> {
        self.inner.cache.read().await.snapshots.get(bundle).cloned()
    }

    /// Current snapshot of every bundle
    pub async fn snapshot(&self) -> SyncSnapshot {
        self.inner.cache.read().await.view()
    }

    /// Bundles whose last fetch failed
    pub async fn stale_bundles(&self) -> Vec<String> {
        self.inner.cache.read().await.stale.iter().cloned().collect()
    }

    pub fn bundles(&self) -> &[String] {
        &self.inner.bundles
    }
}
