//! # Storage Module
//!
//! All persistence for the learning journal. Two backends implement the same
//! [`LearningStorage`] trait and must agree on every outcome:
//!
//! - **sqlite/** - structured backend over an embedded SQLite database
//! - **flat/** - JSON documents under namespaced keys of a key-value store
//!
//! `probe.rs` picks one at startup. Row transitions (timestamps, first-explore
//! stamping, journal ordering) live in `transitions.rs` so both backends apply
//! identical rules.

pub mod clock;
pub mod error;
pub mod flat;
pub mod probe;
pub mod sqlite;
pub mod traits;
pub mod transitions;

#[cfg(test)]
mod contract_tests;
#[cfg(test)]
pub mod test_utils;

pub use error::{StoreError, StoreResult};
pub use flat::{FileKeyValueStore, FlatStorage, KeyValueStore, MemoryKeyValueStore};
pub use probe::open_storage;
pub use sqlite::{DbConnection, SqliteStorage};
pub use traits::{BackendKind, LearningStorage};
