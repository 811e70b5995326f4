//! Backend selection at startup
//!
//! The probe runs once: it opens the SQLite file and asks the engine for its
//! version. Under the `auto` preference a failure falls back to the flat
//! backend over the key-value document in the same data directory.

use log::{info, warn};
use std::fs;
use std::sync::Arc;

use super::error::StoreResult;
use super::flat::{FileKeyValueStore, FlatStorage};
use super::sqlite::{DbConnection, SqliteStorage};
use super::traits::LearningStorage;
use crate::config::{BackendPreference, StoreConfig};

async fn open_structured(config: &StoreConfig) -> StoreResult<SqliteStorage> {
    let db = DbConnection::open(&config.database_path()).await?;
    let version = db.engine_version().await?;
    info!("SQLite {} available at {}", version, config.database_path().display());
    Ok(SqliteStorage::new(db))
}

fn open_flat(config: &StoreConfig) -> StoreResult<FlatStorage> {
    let kv = FileKeyValueStore::new(config.key_value_path())?;
    info!("Key-value document at {}", kv.path().display());
    Ok(FlatStorage::new(Arc::new(kv)))
}

/// Pick, open and initialize the backend for this process
pub async fn open_storage(config: &StoreConfig) -> StoreResult<Arc<dyn LearningStorage>> {
    if !config.data_directory.exists() {
        fs::create_dir_all(&config.data_directory)?;
        info!("Created data directory {}", config.data_directory.display());
    }

    let storage: Arc<dyn LearningStorage> = match config.backend {
        BackendPreference::Structured => Arc::new(open_structured(config).await?),
        BackendPreference::Flat => Arc::new(open_flat(config)?),
        BackendPreference::Auto => match open_structured(config).await {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                warn!("SQLite unusable, falling back to flat storage: {}", e);
                Arc::new(open_flat(config)?)
            }
        },
    };

    storage.initialize().await?;
    info!("Using {} storage (preference: {})", storage.kind(), config.backend);
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::error::StoreError;
    use crate::backend::storage::traits::BackendKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_auto_prefers_sqlite() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::in_directory(temp_dir.path().join("data"));

        let storage = open_storage(&config).await.unwrap();
        assert_eq!(storage.kind(), BackendKind::Structured);
        assert!(config.database_path().exists());
    }

    #[tokio::test]
    async fn test_flat_preference() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::in_directory(temp_dir.path()).with_backend(BackendPreference::Flat);

        let storage = open_storage(&config).await.unwrap();
        assert_eq!(storage.kind(), BackendKind::Flat);
        assert!(!config.database_path().exists());
    }

    #[tokio::test]
    async fn test_auto_falls_back_when_database_cannot_open() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = StoreConfig::in_directory(temp_dir.path());
        // The database's parent is a regular file, so SQLite cannot open it
        fs::write(temp_dir.path().join("blocker"), "").unwrap();
        config.database_file = "blocker/learning_store.db".to_string();

        let storage = open_storage(&config).await.unwrap();
        assert_eq!(storage.kind(), BackendKind::Flat);

        let strict = config.with_backend(BackendPreference::Structured);
        let err = open_storage(&strict).await.err().unwrap();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));
    }
}
