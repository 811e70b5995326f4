use log::{debug, info, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;

use crate::backend::storage::error::StoreResult;

/// On-disk schema revision recorded in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

/// DbConnection owns the SQLite pool
///
/// The pool holds a single connection: every statement and transaction runs
/// one after another, which is what makes each read-modify-write atomic.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Open (creating if missing) the database file at `path`
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        debug!("Opened SQLite database at {}", path.display());
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Version string of the linked SQLite engine; fails if the engine is unusable
    pub async fn engine_version(&self) -> StoreResult<String> {
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(self.pool())
            .await?;
        Ok(version)
    }

    /// Set up the required database schema
    pub async fn setup_schema(&self) -> StoreResult<()> {
        let pool = self.pool();

        // Singleton onboarding row
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS onboarding (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                completed BOOLEAN NOT NULL DEFAULT FALSE,
                goal TEXT,
                comfort_level TEXT NOT NULL,
                first_concept_viewed BOOLEAN NOT NULL DEFAULT FALSE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_concepts (
                concept_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                explored_at TEXT,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS journal_entries (
                id TEXT PRIMARY KEY,
                concept_id TEXT,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (concept_id) REFERENCES user_concepts (concept_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Lookup of entries for a single concept
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_journal_entries_concept_id
            ON journal_entries(concept_id);
            "#,
        )
        .execute(pool)
        .await?;

        // Newest-first listing
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_journal_entries_created_at
            ON journal_entries(created_at DESC);
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        self.check_schema_version().await
    }

    async fn check_schema_version(&self) -> StoreResult<()> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(self.pool())
            .await?;

        if version == 0 {
            // PRAGMA does not accept bound parameters
            sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
                .execute(self.pool())
                .await?;
            info!("Created SQLite schema version {}", SCHEMA_VERSION);
        } else if version > SCHEMA_VERSION {
            warn!(
                "Database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            );
        }
        Ok(())
    }
}
