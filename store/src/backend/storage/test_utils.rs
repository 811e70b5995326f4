//! Test utilities with automatic cleanup
//!
//! Every file a test writes lives under a temporary directory that is removed
//! when the `TestEnvironment` is dropped, even if the test panics.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use super::flat::{FileKeyValueStore, FlatStorage};
use super::sqlite::{DbConnection, SqliteStorage};
use super::traits::LearningStorage;
use crate::config::StoreConfig;

/// RAII test environment that cleans up on drop
pub struct TestEnvironment {
    /// Kept alive until drop
    _temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let base_path = temp_dir.path().to_path_buf();

        Ok(TestEnvironment {
            _temp_dir: temp_dir,
            base_path,
        })
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::in_directory(&self.base_path)
    }

    /// Open and initialize the SQLite backend; reopening sees earlier writes
    pub async fn sqlite_storage(&self) -> Result<SqliteStorage> {
        let db = DbConnection::open(&self.config().database_path()).await?;
        let storage = SqliteStorage::new(db);
        storage.initialize().await?;
        Ok(storage)
    }

    /// Open and initialize the flat backend over the key-value document
    pub async fn flat_storage(&self) -> Result<FlatStorage> {
        let kv = FileKeyValueStore::new(self.config().key_value_path())?;
        let storage = FlatStorage::new(Arc::new(kv));
        storage.initialize().await?;
        Ok(storage)
    }
}
