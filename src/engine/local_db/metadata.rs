//! Key/value engine state
//!
//! Small documents that must survive a reload: notification preferences,
//! the push subscription and the "preferences need transmitting" flag.

use crate::engine::local_db::LocalDatabase;
use crate::shared::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::Row;

impl LocalDatabase {
    /// Set a metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO engine_metadata (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a metadata value
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM engine_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Remove a metadata value
    pub async fn delete_metadata(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM engine_metadata WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store a value as JSON
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string(value)?;
        self.set_metadata(key, &data).await
    }

    /// Load a JSON value; unreadable values count as absent
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(data) = self.get_metadata(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring unreadable engine metadata");
                Ok(None)
            }
        }
    }
}
