//! Bundle snapshot rows
//!
//! One row per bundle. A save replaces the whole row in a single statement,
//! so the stored items always come from one fetch.

use crate::engine::local_db::LocalDatabase;
use crate::engine::sync::BundleSnapshot;
use crate::shared::error::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

impl LocalDatabase {
    /// Replace the stored snapshot of a bundle
    pub async fn save_snapshot(&self, snapshot: &BundleSnapshot) -> Result<()> {
        let items = serde_json::to_string(&snapshot.items)?;

        sqlx::query(
            "INSERT OR REPLACE INTO bundle_snapshots (bundle, items, version, cache_key, fetched_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&snapshot.bundle)
        .bind(&items)
        .bind(snapshot.version as i64)
        .bind(&snapshot.cache_key)
        .bind(snapshot.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All stored snapshots
    pub async fn load_snapshots(&self) -> Result<Vec<BundleSnapshot>> {
        let rows = sqlx::query(
            "SELECT bundle, items, version, cache_key, fetched_at FROM bundle_snapshots ORDER BY bundle",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in rows {
            let bundle: String = row.try_get("bundle")?;
            let items: String = row.try_get("items")?;
            let fetched_at: String = row.try_get("fetched_at")?;

            let items = match serde_json::from_str(&items) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(bundle = %bundle, error = %e, "Ignoring unreadable cached snapshot");
                    continue;
                }
            };
            let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_default();
            let version: i64 = row.try_get("version")?;

            snapshots.push(BundleSnapshot {
                bundle,
                items,
                version: version.max(0) as u64,
                cache_key: row.try_get("cache_key")?,
                fetched_at,
            });
        }

        Ok(snapshots)
    }
}
