//! # Backend Module
//!
//! All non-UI logic of the learning journal's local data layer.
//!
//! ## Architecture
//!
//! ```text
//! Views (subscribe to events, call DataAccess)
//!     ↓
//! Domain Layer (DataAccess facade, EventBus)
//!     ↓
//! Storage Layer (SQLite backend | flat key-value backend)
//! ```
//!
//! The backend is picked once at startup by a capability probe and stays
//! fixed for the lifetime of the process.

pub mod domain;
pub mod storage;

use log::info;
use std::sync::Arc;

use crate::config::StoreConfig;

pub use domain::*;
pub use storage::{BackendKind, LearningStorage, StoreError, StoreResult};

/// Set up storage and the event bus, returning the facade views talk to
pub async fn initialize_backend(config: &StoreConfig) -> StoreResult<DataAccess> {
    info!("Setting up storage in {}", config.data_directory.display());
    let events = Arc::new(EventBus::new());
    let data_access = DataAccess::open(config, events).await?;

    info!("Backend ready ({} storage)", data_access.kind());
    Ok(data_access)
}
