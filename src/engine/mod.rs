//! # Offline Engine
//!
//! Offline-first runtime for the LusoTown client: queued mutations, cached
//! content, push preferences and the install prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Engine                      │
//! │  ┌──────────────┐        ┌─────────────────┐  │
//! │  │ Connectivity │──edge─▶│ reconnect task  │  │
//! │  └──────────────┘        └───┬────┬────┬───┘  │
//! │                     drain ◀──┘    │    └──▶ notifications
//! │  ┌──────────────┐  ┌──────────────▼──┐        │
//! │  │ ActionQueue  │  │  ContentSync    │◀─timer │
//! │  └──────┬───────┘  └───────┬─────────┘        │
//! │         └───── LocalDatabase (SQLite) ────────│
//! │  InstallationManager (independent)            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - `connectivity.rs`: debounced online/offline signal
//! - `offline/`: durable action queue and retry policy
//! - `sync/`: bundle sync and scheduling
//! - `notifications/`: push subscription and preferences
//! - `install/`: install prompt state machine
//! - `local_db/`: SQLite persistence
//! - `api.rs`, `platform.rs`: external collaborators
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lusotown_engine::engine::Engine;
//! use lusotown_engine::engine::offline::ActionKind;
//! use lusotown_engine::shared::EngineConfig;
//! # use std::sync::Arc;
//! # async fn example(push: Arc<dyn lusotown_engine::engine::platform::PushPlatform>) -> lusotown_engine::shared::error::Result<()> {
//! let engine = Engine::open(EngineConfig::from_env()?, push, true).await?;
//! engine.start().await?;
//!
//! engine.enqueue(ActionKind::FavoriteEvent, serde_json::json!({"id": "evt-1"})).await?;
//! engine.connectivity().report(false);
//!
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod busy;
pub mod connectivity;
pub mod install;
pub mod local_db;
pub mod notifications;
pub mod offline;
pub mod platform;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

use crate::engine::api::{EngineApi, HttpApi};
use crate::engine::connectivity::{ConnectivityEdge, ConnectivityMonitor};
use crate::engine::install::InstallationManager;
use crate::engine::local_db::LocalDatabase;
use crate::engine::notifications::NotificationManager;
use crate::engine::offline::{ActionKind, ActionQueue, RetryPolicy};
use crate::engine::platform::PushPlatform;
use crate::engine::sync::{ContentSync, PeriodicHandle};
use crate::shared::config::EngineConfig;
use crate::shared::error::{EngineError, Result};
use crate::shared::event::{broadcast_event, event_channel, EngineEvent, EngineEventBroadcast};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Background work owned by a started engine
struct RunningTasks {
    shutdown: watch::Sender<bool>,
    reconnect: JoinHandle<()>,
    drain_worker: JoinHandle<()>,
    periodic: PeriodicHandle,
}

impl RunningTasks {
    /// Signal every task and wait for the pass or tick it is running
    async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        self.periodic.shutdown().await;
        for (task, handle) in [("reconnect listener", self.reconnect), ("drain worker", self.drain_worker)] {
            if let Err(e) = handle.await {
                tracing::error!(task, error = %e, "Engine task ended abnormally");
            }
        }
    }
}

/// Composition root of the offline engine
pub struct Engine {
    config: EngineConfig,
    db: LocalDatabase,
    connectivity: ConnectivityMonitor,
    queue: Arc<ActionQueue>,
    sync: ContentSync,
    notifications: NotificationManager,
    installation: InstallationManager,
    events: EngineEventBroadcast,
    tasks: Mutex<Option<RunningTasks>>,
}

impl Engine {
    /// Assemble the engine from its collaborators
    ///
    /// Must be called inside a Tokio runtime. Nothing runs until `start()`.
    pub async fn new(
        config: EngineConfig,
        db: LocalDatabase,
        api: Arc<dyn EngineApi>,
        push_platform: Arc<dyn PushPlatform>,
        initially_online: bool,
    ) -> Result<Self> {
        config.validate()?;

        let events = event_channel();
        let connectivity = ConnectivityMonitor::new(initially_online, config.connectivity_debounce);
        let queue = Arc::new(ActionQueue::new(
            db.clone(),
            api.clone(),
            connectivity.clone(),
            events.clone(),
            RetryPolicy::from_config(&config),
            config.network_timeout,
        ));
        let sync = ContentSync::load(db.clone(), api.clone(), connectivity.clone(), events.clone(), &config).await?;
        let notifications =
            NotificationManager::load(db.clone(), api, push_platform, connectivity.clone(), &config).await?;
        let installation = InstallationManager::from_config(&config, events.clone());

        Ok(Self {
            config,
            db,
            connectivity,
            queue,
            sync,
            notifications,
            installation,
            events,
            tasks: Mutex::new(None),
        })
    }

    /// Open the configured database and talk HTTP to the configured API
    pub async fn open(config: EngineConfig, push_platform: Arc<dyn PushPlatform>, initially_online: bool) -> Result<Self> {
        let db = LocalDatabase::open(config.resolved_database_path()).await?;
        let api: Arc<dyn EngineApi> = Arc::new(HttpApi::new(config.clone()));
        Self::new(config, db, api, push_platform, initially_online).await
    }

    /// Spawn the reconnect listener, the drain worker and the periodic sync
    pub async fn start(&self) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            return Err(EngineError::lifecycle("engine already started"));
        }

        let (shutdown, stopped) = watch::channel(false);
        let drain_worker = tokio::spawn(drain_worker(
            self.queue.clone(),
            self.connectivity.clone(),
            self.config.sync_interval,
            stopped.clone(),
        ));
        let reconnect = tokio::spawn(reconnect_listener(
            self.connectivity.subscribe(),
            self.events.clone(),
            self.queue.clone(),
            self.sync.clone(),
            self.notifications.clone(),
            stopped,
        ));
        let periodic = self.sync.schedule_periodic(self.config.sync_interval);

        if self.connectivity.is_online() {
            self.queue.wake();
        }

        *tasks = Some(RunningTasks {
            shutdown,
            reconnect,
            drain_worker,
            periodic,
        });
        tracing::info!(online = self.connectivity.is_online(), "Engine started");
        Ok(())
    }

    /// Stop timers and listeners
    ///
    /// Waits for a drain pass or sync already running to complete, so an
    /// action the server accepted is never left in the queue.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        if let Some(running) = tasks.take() {
            running.shutdown().await;
            tracing::info!("Engine stopped");
        }
        drop(tasks);
        self.installation.cancel_pending_prompt().await;
    }

    pub async fn is_running(&self) -> bool {
        self.tasks.lock().await.is_some()
    }

    /// Queue a mutation; when online the drain worker picks it up
    pub async fn enqueue(&self, kind: ActionKind, payload: serde_json::Value) -> Result<String> {
        self.queue.enqueue(kind, payload).await
    }

    /// Subscribe to engine events
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.db
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn sync(&self) -> &ContentSync {
        &self.sync
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn installation(&self) -> &InstallationManager {
        &self.installation
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Tasks wind down on their own once signalled.
        if let Some(running) = self.tasks.get_mut().take() {
            running.shutdown.send_replace(true);
        }
    }
}

/// Forward connectivity edges to the components that react to them
async fn reconnect_listener(
    mut edges: broadcast::Receiver<ConnectivityEdge>,
    events: EngineEventBroadcast,
    queue: Arc<ActionQueue>,
    sync: ContentSync,
    notifications: NotificationManager,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let edge = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            edge = edges.recv() => edge,
        };

        match edge {
            Ok(ConnectivityEdge::BecameOnline) => {
                broadcast_event(&events, EngineEvent::BecameOnline);
                queue.wake();

                let sync = sync.clone();
                tokio::spawn(async move {
                    sync.force_sync().await;
                });

                let notifications = notifications.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifications.on_online().await {
                        tracing::error!(error = %e, "Failed to re-transmit notification preferences");
                    }
                });
            }
            Ok(ConnectivityEdge::BecameOffline) => {
                broadcast_event(&events, EngineEvent::BecameOffline);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Reconnect listener lagged behind connectivity edges");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Drain on signal or every `idle_interval`; retry with backoff while online
///
/// A pass that stopped on a failure is retried after the policy delay. A pass
/// skipped because another caller was draining is retried too: that caller's
/// outcome is not visible here and it may have blocked.
async fn drain_worker(
    queue: Arc<ActionQueue>,
    connectivity: ConnectivityMonitor,
    idle_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let signal = queue.drain_signal();
    let mut idle = tokio::time::interval(idle_interval);
    idle.set_missed_tick_behavior(MissedTickBehavior::Delay);
    idle.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            _ = signal.notified() => {}
            _ = idle.tick() => {}
        }

        loop {
            let report = match queue.drain().await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(error = %e, "Drain failed on the local store");
                    break;
                }
            };
            if !report.dispatched.is_empty() || !report.failed_permanently.is_empty() {
                tracing::info!(
                    dispatched = report.dispatched.len(),
                    failed = report.failed_permanently.len(),
                    remaining = report.remaining,
                    "Drain pass finished"
                );
            }
            if !connectivity.is_online() {
                break;
            }

            let delay = match &report.blocked {
                Some(blocked) => {
                    tracing::debug!(action_id = %blocked.id, attempts = blocked.attempts, "Retrying blocked queue head");
                    queue.policy().delay_for(blocked.attempts)
                }
                None if report.skipped => {
                    tracing::debug!("Queue busy with another drain; checking back");
                    queue.policy().delay_for(1)
                }
                None => break,
            };

            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(delay) => {}
                _ = signal.notified() => {}
            }
        }
    }
}
