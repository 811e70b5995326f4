//! # Data Access
//!
//! The single entry point consumers use. `DataAccess` forwards every storage
//! operation to the backend chosen at startup and, once a mutation has
//! succeeded, publishes the matching [`StoreEvent`]:
//!
//! | operation                                        | event               |
//! |--------------------------------------------------|---------------------|
//! | `update_onboarding`                              | `OnboardingUpdated` |
//! | `update_concept_status`, `mark_concept_explored` | `ConceptsUpdated`   |
//! | journal create / update / delete                 | `JournalUpdated`    |
//! | `clear_all_data`                                 | `AllDataCleared`    |
//!
//! A failed call publishes nothing. Reads and settings writes never publish.

use log::{debug, info};
use once_cell::sync::OnceCell;
use shared::{
    ConceptStatus, DataSnapshot, JournalEntry, OnboardingState, OnboardingUpdate, StatusCounts,
    UserConcept,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::events::{EventBus, StoreEvent};
use crate::backend::storage::{open_storage, BackendKind, LearningStorage, StoreResult};
use crate::config::StoreConfig;

static GLOBAL: OnceCell<DataAccess> = OnceCell::new();

/// Make `data_access` the process-wide instance; fails (handing it back) if
/// one is already installed
pub fn install(data_access: DataAccess) -> Result<(), DataAccess> {
    GLOBAL.set(data_access)?;
    info!("Installed process-wide data access");
    Ok(())
}

/// The process-wide instance, if one was installed
pub fn global() -> Option<&'static DataAccess> {
    GLOBAL.get()
}

#[derive(Clone)]
pub struct DataAccess {
    storage: Arc<dyn LearningStorage>,
    events: Arc<EventBus>,
}

impl DataAccess {
    pub fn new(storage: Arc<dyn LearningStorage>, events: Arc<EventBus>) -> Self {
        Self { storage, events }
    }

    /// Probe for a backend according to `config` and wrap it
    pub async fn open(config: &StoreConfig, events: Arc<EventBus>) -> StoreResult<Self> {
        let storage = open_storage(config).await?;
        Ok(Self::new(storage, events))
    }

    pub fn kind(&self) -> BackendKind {
        self.storage.kind()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Publish `event` only when `result` is a success
    fn announce<T>(&self, result: StoreResult<T>, event: StoreEvent) -> StoreResult<T> {
        if result.is_ok() {
            self.events.publish(event);
        } else {
            debug!("Not publishing {}: operation failed", event);
        }
        result
    }

    pub async fn initialize(&self) -> StoreResult<()> {
        self.storage.initialize().await
    }

    // Settings

    pub async fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        self.storage.get_setting(key).await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.storage.set_setting(key, value).await
    }

    pub async fn get_all_settings(&self) -> StoreResult<BTreeMap<String, String>> {
        self.storage.get_all_settings().await
    }

    pub async fn delete_setting(&self, key: &str) -> StoreResult<()> {
        self.storage.delete_setting(key).await
    }

    // Onboarding

    pub async fn get_onboarding_state(&self) -> StoreResult<OnboardingState> {
        self.storage.get_onboarding_state().await
    }

    pub async fn update_onboarding(&self, update: &OnboardingUpdate) -> StoreResult<OnboardingState> {
        let result = self.storage.update_onboarding(update).await;
        self.announce(result, StoreEvent::OnboardingUpdated)
    }

    // Concepts

    pub async fn get_user_concept(&self, concept_id: &str) -> StoreResult<Option<UserConcept>> {
        self.storage.get_user_concept(concept_id).await
    }

    pub async fn get_all_user_concepts(&self) -> StoreResult<Vec<UserConcept>> {
        self.storage.get_all_user_concepts().await
    }

    pub async fn update_concept_status(&self, concept_id: &str, status: ConceptStatus) -> StoreResult<UserConcept> {
        let result = self.storage.update_concept_status(concept_id, status).await;
        self.announce(result, StoreEvent::ConceptsUpdated)
    }

    pub async fn mark_concept_explored(&self, concept_id: &str) -> StoreResult<UserConcept> {
        let result = self.storage.mark_concept_explored(concept_id).await;
        self.announce(result, StoreEvent::ConceptsUpdated)
    }

    // Journal

    pub async fn create_journal_entry(&self, concept_id: Option<&str>, content: &str) -> StoreResult<JournalEntry> {
        let result = self.storage.create_journal_entry(concept_id, content).await;
        self.announce(result, StoreEvent::JournalUpdated)
    }

    pub async fn get_journal_entry(&self, id: &str) -> StoreResult<Option<JournalEntry>> {
        self.storage.get_journal_entry(id).await
    }

    pub async fn update_journal_entry(&self, id: &str, content: &str) -> StoreResult<JournalEntry> {
        let result = self.storage.update_journal_entry(id, content).await;
        self.announce(result, StoreEvent::JournalUpdated)
    }

    pub async fn delete_journal_entry(&self, id: &str) -> StoreResult<()> {
        let result = self.storage.delete_journal_entry(id).await;
        self.announce(result, StoreEvent::JournalUpdated)
    }

    pub async fn get_journal_entries(&self) -> StoreResult<Vec<JournalEntry>> {
        self.storage.get_journal_entries().await
    }

    pub async fn get_journal_entries_for_concept(&self, concept_id: &str) -> StoreResult<Vec<JournalEntry>> {
        self.storage.get_journal_entries_for_concept(concept_id).await
    }

    // Progress

    pub async fn get_explored_count(&self) -> StoreResult<u64> {
        self.storage.get_explored_count().await
    }

    pub async fn get_resonates_count(&self) -> StoreResult<u64> {
        self.storage.get_resonates_count().await
    }

    pub async fn status_counts(&self) -> StoreResult<StatusCounts> {
        Ok(StatusCounts {
            explored: self.storage.get_explored_count().await?,
            resonates: self.storage.get_resonates_count().await?,
        })
    }

    /// Everything the store holds, for backup or inspection
    pub async fn export_snapshot(&self) -> StoreResult<DataSnapshot> {
        Ok(DataSnapshot {
            onboarding: self.storage.get_onboarding_state().await?,
            user_concepts: self.storage.get_all_user_concepts().await?,
            journal_entries: self.storage.get_journal_entries().await?,
            settings: self.storage.get_all_settings().await?,
        })
    }

    pub async fn clear_all_data(&self) -> StoreResult<()> {
        let result = self.storage.clear_all_data().await;
        if result.is_ok() {
            info!("All learning data cleared");
        }
        self.announce(result, StoreEvent::AllDataCleared)
    }
}
