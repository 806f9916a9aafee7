//! # Action Queue
//!
//! Durable FIFO of user mutations made while offline.
//!
//! ## Features
//!
//! - **Persistent Queue**: an action is written to the local database before
//!   `enqueue` returns, so it survives a crash or reload
//! - **Strict FIFO**: replay order is `enqueued_at`, then insertion sequence,
//!   never the action kind
//! - **Single Dispatcher**: a busy flag makes concurrent `drain` calls safe;
//!   the loser returns immediately without dispatching anything
//! - **Head-of-line Blocking**: a pass stops at the first transient failure so
//!   a later action never overtakes an earlier one
//! - **Bounded Retry**: an action is dropped after `max_attempts` failed
//!   dispatches and reported once as a permanent failure
//! - **Wake-up Signal**: `enqueue` while online wakes whoever waits on
//!   `drain_signal()`, the engine's drain worker in practice

use crate::engine::api::EngineApi;
use crate::engine::busy::BusyFlag;
use crate::engine::connectivity::ConnectivityMonitor;
use crate::engine::local_db::LocalDatabase;
use crate::engine::offline::retry::RetryPolicy;
use crate::engine::offline::{ActionKind, OfflineAction};
use crate::shared::error::{with_timeout, Result};
use crate::shared::event::{broadcast_event, payload_digest, EngineEvent, EngineEventBroadcast, PermanentFailure};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

/// Action at the queue head that stopped a drain pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedAction {
    /// Action ID
    pub id: String,
    /// Failed attempts so far
    pub attempts: u32,
    /// Error of the failed attempt
    pub error: String,
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// IDs accepted by the mutation endpoint, in dispatch order
    pub dispatched: Vec<String>,
    /// Actions dropped after their last attempt
    pub failed_permanently: Vec<PermanentFailure>,
    /// Action that stopped the pass, if any
    pub blocked: Option<BlockedAction>,
    /// Actions still queued after the pass
    pub remaining: u64,
    /// The pass did not run: offline, or another pass was in progress
    pub skipped: bool,
}

/// Durable action queue
pub struct ActionQueue {
    db: LocalDatabase,
    api: Arc<dyn EngineApi>,
    connectivity: ConnectivityMonitor,
    events: EngineEventBroadcast,
    policy: RetryPolicy,
    timeout: Duration,
    draining: BusyFlag,
    wake: Arc<Notify>,
}

impl ActionQueue {
    pub fn new(
        db: LocalDatabase,
        api: Arc<dyn EngineApi>,
        connectivity: ConnectivityMonitor,
        events: EngineEventBroadcast,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            api,
            connectivity,
            events,
            policy,
            timeout,
            draining: BusyFlag::new(),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Queue a mutation; returns its ID
    ///
    /// Only waits on the local database, never on the network. When online
    /// the drain signal is raised so the action goes out without waiting for
    /// the next reconnect.
    pub async fn enqueue(&self, kind: ActionKind, payload: serde_json::Value) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let seq = self.db.insert_action(&id, kind, &payload, Utc::now()).await?;
        tracing::debug!(action_id = %id, %kind, seq, "Queued offline action");
        if self.connectivity.is_online() {
            self.wake();
        }
        Ok(id)
    }

    /// Ask the drain worker for a pass
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Signal raised by `wake`; holds one permit if nobody is waiting
    pub fn drain_signal(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// Dispatch queued actions in FIFO order
    pub async fn drain(&self) -> Result<DrainReport> {
        if !self.connectivity.is_online() {
            tracing::debug!("Offline; drain skipped");
            return Ok(DrainReport {
                skipped: true,
                remaining: self.db.count_actions().await?,
                ..DrainReport::default()
            });
        }

        let Some(_guard) = self.draining.try_acquire() else {
            tracing::debug!("Drain already in progress; skipped");
            return Ok(DrainReport {
                skipped: true,
                ..DrainReport::default()
            });
        };

        let actions = self.db.load_actions().await?;
        let mut report = DrainReport::default();
        if !actions.is_empty() {
            tracing::info!(pending = actions.len(), "Draining offline queue");
        }

        for action in actions {
            if !self.connectivity.is_online() {
                tracing::info!("Went offline during drain; stopping");
                break;
            }

            match with_timeout(self.timeout, self.api.post_mutation(action.kind, &action.payload)).await {
                Ok(()) => {
                    self.db.delete_action(&action.id).await?;
                    tracing::debug!(action_id = %action.id, kind = %action.kind, "Dispatched offline action");
                    broadcast_event(
                        &self.events,
                        EngineEvent::ActionDispatched {
                            id: action.id.clone(),
                            kind: action.kind,
                        },
                    );
                    report.dispatched.push(action.id);
                }
                Err(err) => {
                    let error = err.to_string();
                    let attempts = self.db.record_failed_attempt(&action.id, &error).await?;

                    if self.policy.is_exhausted(attempts) {
                        let failure = self.drop_action(&action, attempts, error).await?;
                        report.failed_permanently.push(failure);
                        continue;
                    }

                    tracing::warn!(
                        action_id = %action.id,
                        kind = %action.kind,
                        attempts,
                        error = %error,
                        "Dispatch failed; will retry"
                    );
                    report.blocked = Some(BlockedAction {
                        id: action.id,
                        attempts,
                        error,
                    });
                    break;
                }
            }
        }

        report.remaining = self.db.count_actions().await?;
        Ok(report)
    }

    async fn drop_action(&self, action: &OfflineAction, attempts: u32, last_error: String) -> Result<PermanentFailure> {
        self.db.delete_action(&action.id).await?;

        let failure = PermanentFailure {
            id: action.id.clone(),
            kind: action.kind,
            payload_digest: payload_digest(&action.payload),
            attempts,
            last_error,
        };
        tracing::warn!(
            action_id = %failure.id,
            kind = %failure.kind,
            digest = %failure.payload_digest,
            attempts,
            "Dropping offline action after final attempt"
        );
        broadcast_event(&self.events, EngineEvent::ActionFailed(failure.clone()));
        Ok(failure)
    }

    /// Number of queued actions
    pub async fn pending_count(&self) -> Result<u64> {
        self.db.count_actions().await
    }

    /// Queued actions in replay order
    pub async fn list_pending(&self) -> Result<Vec<OfflineAction>> {
        self.db.load_actions().await
    }

    /// Whether a drain pass is running
    pub fn is_draining(&self) -> bool {
        self.draining.is_busy()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
