//! # Local Database Module
//!
//! Durable local store backing the offline engine. Survives restarts and is
//! shared by the components, each of which only touches its own table.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool and schema management
//! - `schema.sql`: table definitions
//! - `queue.rs`: offline action rows
//! - `snapshots.rs`: bundle snapshot rows
//! - `metadata.rs`: key/value engine state
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lusotown_engine::engine::local_db::LocalDatabase;
//!
//! # async fn example() -> Result<(), lusotown_engine::shared::EngineError> {
//! let db = LocalDatabase::open("/tmp/lusotown/engine.db").await?;
//! let stats = db.get_stats().await?;
//! println!("{} actions pending", stats.pending_actions);
//! # Ok(())
//! # }
//! ```

pub mod metadata;
pub mod queue;
pub mod snapshots;

use crate::shared::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;

/// Applied migrations, recorded in `schema_migrations`
///
/// Version 1 is the table set in `schema.sql`.
pub const MIGRATIONS: &[(i32, &str)] = &[(1, "offline queue, bundle snapshots, engine metadata")];

/// Local database connection manager
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file
    ///
    /// Creates parent directories and the file if needed, then initializes the
    /// schema. Uses WAL mode so readers do not block the queue writer.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::shared::EngineError::store(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        tracing::debug!(path = %path.display(), "Opened local database");

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Open a private in-memory database
    ///
    /// Pinned to a single connection that is never recycled, since every
    /// SQLite connection to `:memory:` sees its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Create all tables and run pending migrations
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;

        self.run_migrations().await?;
        Ok(())
    }

    /// Apply migrations newer than the recorded schema version
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        )
        .fetch_one(&self.pool)
        .await?;

        for &(version, description) in MIGRATIONS.iter().filter(|(v, _)| *v > current_version.0) {
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
            tracing::info!(version, description, "Applied local database migration");
        }

        Ok(())
    }

    /// Connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Row counts for diagnostics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let pending_actions: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM offline_queue")
            .fetch_one(&self.pool)
            .await?;

        let cached_bundles: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bundle_snapshots")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            pending_actions: pending_actions.0 as u64,
            cached_bundles: cached_bundles.0 as u64,
        })
    }

    /// Close the pool, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Number of queued offline actions
    pub pending_actions: u64,
    /// Number of bundles with a cached snapshot
    pub cached_bundles: u64,
}
