//! # Flat Storage Module
//!
//! Fallback backend for runtimes without a usable SQLite engine. Tables are
//! emulated as JSON documents under namespaced keys of a plain key-value store.
//!
//! ## Components
//!
//! - **key_value.rs** - the `KeyValueStore` primitive with file and memory implementations
//! - **repository.rs** - `LearningStorage` implementation over the documents

pub mod key_value;
pub mod repository;

pub use key_value::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use repository::FlatStorage;
