//! Engine Event Bus
//!
//! Events the engine reports asynchronously to the surrounding application.
//! Only outcomes the application may want to act on are broadcast: edges,
//! permanent failures, bundle refreshes, install state changes and invariant
//! violations. Recoverable errors never show up here.
//!
//! # Broadcasting
//!
//! Events go through `tokio::sync::broadcast`, so every subscriber receives a
//! copy. Sending with no subscribers is not an error.

use crate::engine::install::InstallState;
use crate::engine::offline::ActionKind;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the engine event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Report of an action dropped after exhausting its attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermanentFailure {
    /// Action ID
    pub id: String,
    /// Mutation kind
    pub kind: ActionKind,
    /// Short digest of the payload, enough to tell the user which action did not apply
    pub payload_digest: String,
    /// Number of dispatch attempts made
    pub attempts: u32,
    /// Error of the last attempt
    pub last_error: String,
}

/// Event broadcast by the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Connectivity committed to online
    BecameOnline,
    /// Connectivity committed to offline
    BecameOffline,
    /// A queued action was accepted by the mutation endpoint
    ActionDispatched { id: String, kind: ActionKind },
    /// A queued action was dropped after its last attempt
    ActionFailed(PermanentFailure),
    /// A bundle snapshot was replaced
    BundleRefreshed { bundle: String, version: u64 },
    /// The install state machine moved
    InstallStateChanged { state: InstallState },
    /// An illegal transition was rejected
    InvariantViolation { component: String, detail: String },
}

/// Engine event broadcast sender
pub type EngineEventBroadcast = broadcast::Sender<EngineEvent>;

/// Create the engine event channel
pub fn event_channel() -> EngineEventBroadcast {
    let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}

/// Broadcast an event to all subscribers
///
/// Returns the number of subscribers that received the event (0 if none).
pub fn broadcast_event(broadcast_tx: &EngineEventBroadcast, event: EngineEvent) -> usize {
    match broadcast_tx.send(event) {
        Ok(subscriber_count) => subscriber_count,
        Err(_) => {
            tracing::trace!("[Events] No subscribers for engine event");
            0
        }
    }
}

/// Digest of a payload used in failure reports
pub fn payload_digest(payload: &serde_json::Value) -> String {
    let canonical = payload.to_string();
    let hash = blake3::hash(canonical.as_bytes());
    hash.to_hex()[..16].to_string()
}
