//! # Storage Traits
//!
//! This module defines the storage abstraction that both backends implement,
//! so the domain layer can work against either one interchangeably.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{ConceptStatus, JournalEntry, OnboardingState, OnboardingUpdate, UserConcept};
use std::collections::BTreeMap;
use std::fmt;

use super::error::StoreResult;

/// Which implementation is serving the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Embedded SQLite database
    Structured,
    /// Namespaced documents in a key-value store
    Flat,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Structured => write!(f, "structured"),
            BackendKind::Flat => write!(f, "flat"),
        }
    }
}

/// Trait defining every persisted operation of the app
///
/// Both implementations must agree on every outcome: same rows, same ordering,
/// same error kinds.
#[async_trait]
pub trait LearningStorage: Send + Sync {
    /// Which implementation this is
    fn kind(&self) -> BackendKind;

    /// Create schema or namespaces if absent; safe to call on every start
    async fn initialize(&self) -> StoreResult<()>;

    async fn get_setting(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrites unconditionally
    async fn set_setting(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn get_all_settings(&self) -> StoreResult<BTreeMap<String, String>>;

    /// No-op when the key is absent
    async fn delete_setting(&self, key: &str) -> StoreResult<()>;

    /// The singleton row, or the default unfinished state when none exists yet
    async fn get_onboarding_state(&self) -> StoreResult<OnboardingState>;

    /// Merge `update` into the singleton row as one read-modify-write
    async fn update_onboarding(&self, update: &OnboardingUpdate) -> StoreResult<OnboardingState>;

    async fn get_user_concept(&self, concept_id: &str) -> StoreResult<Option<UserConcept>>;

    /// All concepts in the order they were first created
    async fn get_all_user_concepts(&self) -> StoreResult<Vec<UserConcept>>;

    /// Set the status, creating the row if needed; never touches `explored_at`
    async fn update_concept_status(&self, concept_id: &str, status: ConceptStatus) -> StoreResult<UserConcept>;

    /// Set status to explored; `explored_at` is only stamped the first time
    async fn mark_concept_explored(&self, concept_id: &str) -> StoreResult<UserConcept>;

    /// Fails with `Reference` when `concept_id` is given but unknown
    async fn create_journal_entry(&self, concept_id: Option<&str>, content: &str) -> StoreResult<JournalEntry>;

    async fn get_journal_entry(&self, id: &str) -> StoreResult<Option<JournalEntry>>;

    /// Fails with `NotFound` when the entry does not exist
    async fn update_journal_entry(&self, id: &str, content: &str) -> StoreResult<JournalEntry>;

    /// Idempotent: deleting a missing entry succeeds
    async fn delete_journal_entry(&self, id: &str) -> StoreResult<()>;

    /// Newest first by `created_at`, ties broken by most recent insertion
    async fn get_journal_entries(&self) -> StoreResult<Vec<JournalEntry>>;

    /// Same ordering as `get_journal_entries`, filtered to one concept
    async fn get_journal_entries_for_concept(&self, concept_id: &str) -> StoreResult<Vec<JournalEntry>>;

    async fn get_explored_count(&self) -> StoreResult<u64>;

    async fn get_resonates_count(&self) -> StoreResult<u64>;

    /// Empty all four entity classes atomically
    async fn clear_all_data(&self) -> StoreResult<()>;
}
