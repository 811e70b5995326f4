//! # SQLite Storage Module
//!
//! Structured backend for runtimes that can open an embedded SQLite database.
//!
//! ## Components
//!
//! - **connection.rs** - connection pool and schema setup
//! - **repository.rs** - `LearningStorage` implementation over the tables
//!
//! ## Tables
//!
//! - `onboarding` - singleton row, `id = 1` enforced by a CHECK constraint
//! - `user_concepts` - keyed by `concept_id`, ROWID keeps creation order
//! - `journal_entries` - keyed by `id`, `concept_id` references `user_concepts`
//! - `settings` - key/value pairs

pub mod connection;
pub mod repository;

pub use connection::DbConnection;
pub use repository::SqliteStorage;
