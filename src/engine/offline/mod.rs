//! # Offline Action Queue
//!
//! User mutations made while offline are queued durably and replayed, in
//! order and exactly once, when connectivity returns.
//!
//! ## Key Components
//!
//! - `queue.rs`: `ActionQueue`, enqueue and drain
//! - `retry.rs`: attempt ceiling and re-drain backoff
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lusotown_engine::engine::offline::ActionKind;
//! # async fn example(queue: &lusotown_engine::engine::offline::ActionQueue) -> lusotown_engine::shared::error::Result<()> {
//! let id = queue.enqueue(ActionKind::FavoriteEvent, serde_json::json!({"id": "evt-1"})).await?;
//! println!("queued {id}, {} pending", queue.pending_count().await?);
//!
//! // Once online:
//! let report = queue.drain().await?;
//! println!("{} dispatched", report.dispatched.len());
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod retry;

pub use queue::{ActionQueue, BlockedAction, DrainReport};
pub use retry::RetryPolicy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of user mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FavoriteEvent,
    SaveBusiness,
    SendMessage,
    RsvpEvent,
}

impl ActionKind {
    /// Every kind, in declaration order
    pub const ALL: [ActionKind; 4] = [
        ActionKind::FavoriteEvent,
        ActionKind::SaveBusiness,
        ActionKind::SendMessage,
        ActionKind::RsvpEvent,
    ];

    /// Name stored in the durable queue
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::FavoriteEvent => "favorite_event",
            ActionKind::SaveBusiness => "save_business",
            ActionKind::SendMessage => "send_message",
            ActionKind::RsvpEvent => "rsvp_event",
        }
    }

    /// Path segment of the mutation endpoint
    pub fn path_segment(self) -> &'static str {
        match self {
            ActionKind::FavoriteEvent => "favorite-event",
            ActionKind::SaveBusiness => "save-business",
            ActionKind::SendMessage => "send-message",
            ActionKind::RsvpEvent => "rsvp-event",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown action kind name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action kind: {0}")]
pub struct UnknownActionKind(pub String);

impl FromStr for ActionKind {
    type Err = UnknownActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownActionKind(s.to_string()))
    }
}

/// Queued user mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    /// Unique ID, generated at enqueue time and never reused
    pub id: String,
    /// Insertion sequence number, breaks `enqueued_at` ties
    pub seq: i64,
    /// Mutation kind
    pub kind: ActionKind,
    /// Body posted to the mutation endpoint
    pub payload: serde_json::Value,
    /// Time of enqueue
    pub enqueued_at: DateTime<Utc>,
    /// Failed dispatch attempts so far
    pub retry_count: u32,
    /// Error of the last failed attempt
    pub last_error: Option<String>,
}
