//! # Key-Value Primitive
//!
//! The storage primitive underneath the flat backend: string keys mapped to
//! string values, with a multi-key removal that is all-or-nothing.
//!
//! Two implementations:
//!
//! - [`FileKeyValueStore`] keeps every key in a single JSON document on disk,
//!   rewritten through a temp file and a rename so a crash never leaves a
//!   half-written document behind
//! - [`MemoryKeyValueStore`] keeps the map in memory, for tests and for
//!   ephemeral sessions

use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::storage::error::{StoreError, StoreResult};

/// Trait defining the flat string store the flat backend is emulated on
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    /// No-op when the key is absent
    async fn remove_item(&self, key: &str) -> StoreResult<()>;

    /// Remove every listed key in one step; either all are removed or none
    async fn multi_remove(&self, keys: &[&str]) -> StoreResult<()>;

    async fn all_keys(&self) -> StoreResult<Vec<String>>;
}

type Document = BTreeMap<String, String>;

fn lock_document<'a, T>(mutex: &'a Mutex<T>) -> StoreResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::StorageUnavailable("key-value store lock poisoned".to_string()))
}

/// Key-value store persisted as one JSON document
#[derive(Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileKeyValueStore {
    /// Create a store backed by the document at `path`; the parent directory
    /// is created if missing, the document itself only on first write
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<Document> {
        if !self.path.exists() {
            return Ok(Document::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Document::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| StoreError::corrupt(self.path.display().to_string(), e))
    }

    fn save(&self, document: &Document) -> StoreResult<()> {
        if document.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        let content = serde_json::to_string_pretty(document)
            .map_err(|e| StoreError::corrupt(self.path.display().to_string(), e))?;

        // Atomic write using temp file
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;

        debug!("Saved key-value document to {:?}", self.path);
        Ok(())
    }

    /// Load, mutate and save the document while holding the file lock
    fn modify<F>(&self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Document) -> bool,
    {
        let _guard = lock_document(&self.lock)?;
        let mut document = self.load()?;
        if change(&mut document) {
            self.save(&document)?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let _guard = lock_document(&self.lock)?;
        Ok(self.load()?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.modify(|document| {
            document.insert(key.to_string(), value.to_string());
            true
        })
    }

    async fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.modify(|document| document.remove(key).is_some())
    }

    async fn multi_remove(&self, keys: &[&str]) -> StoreResult<()> {
        self.modify(|document| {
            let before = document.len();
            for key in keys {
                document.remove(*key);
            }
            document.len() != before
        })
    }

    async fn all_keys(&self) -> StoreResult<Vec<String>> {
        let _guard = lock_document(&self.lock)?;
        Ok(self.load()?.into_keys().collect())
    }
}

/// Key-value store that lives only as long as the process
#[derive(Clone, Default)]
pub struct MemoryKeyValueStore {
    document: Arc<Mutex<Document>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(lock_document(&self.document)?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        lock_document(&self.document)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StoreResult<()> {
        lock_document(&self.document)?.remove(key);
        Ok(())
    }

    async fn multi_remove(&self, keys: &[&str]) -> StoreResult<()> {
        let mut document = lock_document(&self.document)?;
        for key in keys {
            document.remove(*key);
        }
        Ok(())
    }

    async fn all_keys(&self) -> StoreResult<Vec<String>> {
        Ok(lock_document(&self.document)?.keys().cloned().collect())
    }
}
