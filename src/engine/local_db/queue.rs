//! # Offline Queue Rows
//!
//! Persistence for the durable action queue. Rows are read back in replay
//! order: `enqueued_at`, then the insertion sequence number.

use crate::engine::local_db::LocalDatabase;
use crate::engine::offline::{ActionKind, OfflineAction};
use crate::shared::error::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

impl LocalDatabase {
    /// Append an action; returns its insertion sequence number
    pub async fn insert_action(
        &self,
        id: &str,
        kind: ActionKind,
        payload: &serde_json::Value,
        enqueued_at: DateTime<Utc>,
    ) -> Result<i64> {
        let data = serde_json::to_string(payload)?;

        let result = sqlx::query(
            "INSERT INTO offline_queue (id, kind, payload, enqueued_at, retry_count)
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(&data)
        .bind(enqueued_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All queued actions in replay order
    ///
    /// Rows that can no longer be decoded are dropped from the table; they
    /// could never be dispatched and would otherwise block the queue head.
    pub async fn load_actions(&self) -> Result<Vec<OfflineAction>> {
        let rows = sqlx::query(
            "SELECT seq, id, kind, payload, enqueued_at, retry_count, last_error
             FROM offline_queue
             ORDER BY enqueued_at ASC, seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut actions = Vec::with_capacity(rows.len());
        let mut malformed = Vec::new();

        for row in rows {
            let id: String = row.try_get("id")?;
            let kind: String = row.try_get("kind")?;
            let payload: String = row.try_get("payload")?;
            let enqueued_at: i64 = row.try_get("enqueued_at")?;

            let kind = match kind.parse::<ActionKind>() {
                Ok(kind) => kind,
                Err(_) => {
                    tracing::warn!(action_id = %id, kind = %kind, "Dropping queued action with unknown kind");
                    malformed.push(id);
                    continue;
                }
            };
            let payload = match serde_json::from_str(&payload) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(action_id = %id, error = %e, "Dropping queued action with unreadable payload");
                    malformed.push(id);
                    continue;
                }
            };

            let retry_count: i64 = row.try_get("retry_count")?;
            actions.push(OfflineAction {
                id,
                seq: row.try_get("seq")?,
                kind,
                payload,
                enqueued_at: DateTime::from_timestamp_millis(enqueued_at).unwrap_or_default(),
                retry_count: retry_count.max(0) as u32,
                last_error: row.try_get("last_error")?,
            });
        }

        for id in malformed {
            self.delete_action(&id).await?;
        }

        Ok(actions)
    }

    /// Remove an action; returns whether a row was deleted
    pub async fn delete_action(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM offline_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed dispatch attempt; returns the new retry count
    pub async fn record_failed_attempt(&self, id: &str, error: &str) -> Result<u32> {
        sqlx::query(
            "UPDATE offline_queue SET
                retry_count = retry_count + 1,
                last_attempt = ?,
                last_error = ?
             WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let row: Option<(i64,)> = sqlx::query_as("SELECT retry_count FROM offline_queue WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(count,)| count.max(0) as u32).unwrap_or(0))
    }

    /// Number of queued actions
    pub async fn count_actions(&self) -> Result<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM offline_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 as u64)
    }
}
