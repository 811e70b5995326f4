//! Local data layer for the learning journal app.
//!
//! Persists onboarding progress, per-concept learning state, journal entries
//! and settings, through SQLite when the runtime has it and a flat key-value
//! document otherwise. See [`backend::initialize_backend`] for the entry point.

pub mod backend;
pub mod config;

pub use backend::{initialize_backend, DataAccess, EventBus, StoreEvent};
pub use config::{BackendPreference, StoreConfig};
