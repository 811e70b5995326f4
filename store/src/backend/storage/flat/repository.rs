//! # Flat Storage
//!
//! Emulates the relational backend on top of a [`KeyValueStore`]. Each entity
//! class lives under one namespaced key as a JSON document:
//!
//! ```text
//! learning_store:v1:onboarding       {"completed":false,"goal":null,...}
//! learning_store:v1:user_concepts    [{"concept_id":"c1",...}, ...]   insertion order
//! learning_store:v1:journal_entries  [{"id":"...",...}, ...]          insertion order
//! learning_store:v1:settings         {"theme":"dark", ...}
//! ```
//!
//! What SQLite provides for free is maintained here by hand: primary-key
//! uniqueness, the concept reference check on journal entries, ordering and
//! counting. Collections are kept as raw JSON values so that a row which fails
//! to decode is skipped on read but preserved untouched on write.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::{ConceptStatus, JournalEntry, OnboardingState, OnboardingUpdate, UserConcept};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::key_value::KeyValueStore;
use crate::backend::storage::error::{StoreError, StoreResult};
use crate::backend::storage::traits::{BackendKind, LearningStorage};
use crate::backend::storage::transitions;

/// Prefix shared by every key this app writes, across format versions
pub const NAMESPACE: &str = "learning_store:";
/// Prefix of the current document format
pub const KEY_PREFIX: &str = "learning_store:v1:";

pub const ONBOARDING_KEY: &str = "learning_store:v1:onboarding";
pub const USER_CONCEPTS_KEY: &str = "learning_store:v1:user_concepts";
pub const JOURNAL_ENTRIES_KEY: &str = "learning_store:v1:journal_entries";
pub const SETTINGS_KEY: &str = "learning_store:v1:settings";

pub const ALL_KEYS: [&str; 4] = [ONBOARDING_KEY, USER_CONCEPTS_KEY, JOURNAL_ENTRIES_KEY, SETTINGS_KEY];

/// Backend for runtimes without an embedded relational engine
#[derive(Clone)]
pub struct FlatStorage {
    kv: Arc<dyn KeyValueStore>,
    /// Held across every read-modify-write so no other write interleaves
    write_gate: Arc<Mutex<()>>,
}

fn field_matches(value: &Value, field: &str, expected: &str) -> bool {
    value.get(field).and_then(Value::as_str) == Some(expected)
}

/// Decode every row, skipping (and logging) the ones that do not fit
fn decode_all<T: DeserializeOwned>(key: &str, values: &[Value]) -> Vec<T> {
    values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value.clone()) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!("Skipping unreadable row {} in {}: {}", index, key, e);
                None
            }
        })
        .collect()
}

fn to_row<T: Serialize>(key: &str, row: &T) -> StoreResult<Value> {
    serde_json::to_value(row).map_err(|e| StoreError::corrupt(key, e))
}

impl FlatStorage {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    async fn load_document<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.kv.get_item(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::corrupt(key, e)),
            None => Ok(None),
        }
    }

    async fn save_document<T: Serialize + ?Sized>(&self, key: &str, document: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(document).map_err(|e| StoreError::corrupt(key, e))?;
        self.kv.set_item(key, &raw).await
    }

    async fn load_collection(&self, key: &str) -> StoreResult<Vec<Value>> {
        Ok(self.load_document::<Vec<Value>>(key).await?.unwrap_or_default())
    }

    async fn load_settings(&self) -> StoreResult<Map<String, Value>> {
        Ok(self.load_document::<Map<String, Value>>(SETTINGS_KEY).await?.unwrap_or_default())
    }

    /// Stored onboarding row; `None` when absent, default when unreadable
    async fn load_onboarding(&self) -> StoreResult<Option<OnboardingState>> {
        match self.load_document::<OnboardingState>(ONBOARDING_KEY).await {
            Ok(state) => Ok(state),
            Err(StoreError::Corrupt { location, reason }) => {
                warn!("Onboarding document unreadable at {}, using defaults: {}", location, reason);
                Ok(Some(OnboardingState::default()))
            }
            Err(e) => Err(e),
        }
    }

    /// Read, transform and write back one concept row under the write gate
    async fn write_concept<F>(&self, concept_id: &str, apply: F) -> StoreResult<UserConcept>
    where
        F: FnOnce(Option<UserConcept>) -> UserConcept + Send,
    {
        let _gate = self.write_gate.lock().await;
        let mut concepts = self.load_collection(USER_CONCEPTS_KEY).await?;

        let position = concepts
            .iter()
            .position(|value| field_matches(value, "concept_id", concept_id));
        let existing = match position {
            Some(index) => match serde_json::from_value::<UserConcept>(concepts[index].clone()) {
                Ok(concept) => Some(concept),
                Err(e) => {
                    warn!("Concept {} unreadable, treating as absent: {}", concept_id, e);
                    None
                }
            },
            None => None,
        };

        let concept = apply(existing);
        let row = to_row(USER_CONCEPTS_KEY, &concept)?;
        match position {
            Some(index) => concepts[index] = row,
            None => concepts.push(row),
        }

        self.save_document(USER_CONCEPTS_KEY, &concepts).await?;
        debug!("Concept {} is now {}", concept.concept_id, concept.status);
        Ok(concept)
    }

    async fn count_status(&self, status: ConceptStatus) -> StoreResult<u64> {
        let concepts = self.load_collection(USER_CONCEPTS_KEY).await?;
        let count = decode_all::<UserConcept>(USER_CONCEPTS_KEY, &concepts)
            .iter()
            .filter(|concept| concept.status == status)
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl LearningStorage for FlatStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Flat
    }

    async fn initialize(&self) -> StoreResult<()> {
        let keys = self.kv.all_keys().await?;

        for key in keys
            .iter()
            .filter(|key| key.starts_with(NAMESPACE) && !key.starts_with(KEY_PREFIX))
        {
            warn!("Found key from an unsupported storage format: {}", key);
        }

        info!("Flat storage initialized ({} keys present)", keys.len());
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let settings = self.load_settings().await?;
        Ok(settings.get(key).and_then(Value::as_str).map(str::to_string))
    }

    async fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        let mut settings = self.load_settings().await?;
        settings.insert(key.to_string(), Value::String(value.to_string()));
        self.save_document(SETTINGS_KEY, &settings).await
    }

    async fn get_all_settings(&self) -> StoreResult<BTreeMap<String, String>> {
        let settings = self.load_settings().await?;
        Ok(settings
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(value) => Some((key, value)),
                other => {
                    warn!("Skipping unreadable setting {}: {}", key, other);
                    None
                }
            })
            .collect())
    }

    async fn delete_setting(&self, key: &str) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        let mut settings = self.load_settings().await?;
        if settings.remove(key).is_some() {
            self.save_document(SETTINGS_KEY, &settings).await?;
        }
        Ok(())
    }

    async fn get_onboarding_state(&self) -> StoreResult<OnboardingState> {
        if let Some(state) = self.load_onboarding().await? {
            return Ok(state);
        }

        // First read: persist the default so the singleton exists from now on
        let _gate = self.write_gate.lock().await;
        match self.load_onboarding().await? {
            Some(state) => Ok(state),
            None => {
                let state = OnboardingState::default();
                self.save_document(ONBOARDING_KEY, &state).await?;
                debug!("Persisted default onboarding state");
                Ok(state)
            }
        }
    }

    async fn update_onboarding(&self, update: &OnboardingUpdate) -> StoreResult<OnboardingState> {
        let _gate = self.write_gate.lock().await;
        let current = self.load_onboarding().await?.unwrap_or_default();
        let merged = transitions::merge_onboarding(current, update);
        self.save_document(ONBOARDING_KEY, &merged).await?;
        debug!("Onboarding updated: {:?}", merged);
        Ok(merged)
    }

    async fn get_user_concept(&self, concept_id: &str) -> StoreResult<Option<UserConcept>> {
        let concepts = self.load_collection(USER_CONCEPTS_KEY).await?;
        let Some(value) = concepts
            .into_iter()
            .find(|value| field_matches(value, "concept_id", concept_id))
        else {
            return Ok(None);
        };

        match serde_json::from_value(value) {
            Ok(concept) => Ok(Some(concept)),
            Err(e) => {
                warn!("Concept {} unreadable, treating as absent: {}", concept_id, e);
                Ok(None)
            }
        }
    }

    async fn get_all_user_concepts(&self) -> StoreResult<Vec<UserConcept>> {
        let concepts = self.load_collection(USER_CONCEPTS_KEY).await?;
        Ok(decode_all(USER_CONCEPTS_KEY, &concepts))
    }

    async fn update_concept_status(&self, concept_id: &str, status: ConceptStatus) -> StoreResult<UserConcept> {
        self.write_concept(concept_id, |existing| {
            transitions::change_status(existing, concept_id, status)
        })
        .await
    }

    async fn mark_concept_explored(&self, concept_id: &str) -> StoreResult<UserConcept> {
        self.write_concept(concept_id, |existing| {
            transitions::mark_explored(existing, concept_id)
        })
        .await
    }

    async fn create_journal_entry(&self, concept_id: Option<&str>, content: &str) -> StoreResult<JournalEntry> {
        let _gate = self.write_gate.lock().await;

        if let Some(concept_id) = concept_id {
            let concepts = self.load_collection(USER_CONCEPTS_KEY).await?;
            if !concepts
                .iter()
                .any(|value| field_matches(value, "concept_id", concept_id))
            {
                return Err(StoreError::unknown_concept("journal entry", concept_id));
            }
        }

        let mut entries = self.load_collection(JOURNAL_ENTRIES_KEY).await?;
        let entry = transitions::new_journal_entry(concept_id, content);
        entries.push(to_row(JOURNAL_ENTRIES_KEY, &entry)?);
        self.save_document(JOURNAL_ENTRIES_KEY, &entries).await?;

        debug!("Created journal entry {}", entry.id);
        Ok(entry)
    }

    async fn get_journal_entry(&self, id: &str) -> StoreResult<Option<JournalEntry>> {
        let entries = self.load_collection(JOURNAL_ENTRIES_KEY).await?;
        entries
            .into_iter()
            .find(|value| field_matches(value, "id", id))
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| StoreError::corrupt(format!("{}[{}]", JOURNAL_ENTRIES_KEY, id), e))
            })
            .transpose()
    }

    async fn update_journal_entry(&self, id: &str, content: &str) -> StoreResult<JournalEntry> {
        let _gate = self.write_gate.lock().await;
        let mut entries = self.load_collection(JOURNAL_ENTRIES_KEY).await?;

        let index = entries
            .iter()
            .position(|value| field_matches(value, "id", id))
            .ok_or_else(|| StoreError::not_found("journal entry", id))?;
        let existing: JournalEntry = serde_json::from_value(entries[index].clone())
            .map_err(|e| StoreError::corrupt(format!("{}[{}]", JOURNAL_ENTRIES_KEY, id), e))?;

        let entry = transitions::revise_journal_entry(existing, content);
        entries[index] = to_row(JOURNAL_ENTRIES_KEY, &entry)?;
        self.save_document(JOURNAL_ENTRIES_KEY, &entries).await?;

        debug!("Updated journal entry {}", entry.id);
        Ok(entry)
    }

    async fn delete_journal_entry(&self, id: &str) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        let mut entries = self.load_collection(JOURNAL_ENTRIES_KEY).await?;

        let before = entries.len();
        entries.retain(|value| !field_matches(value, "id", id));
        if entries.len() == before {
            debug!("Journal entry {} already absent", id);
            return Ok(());
        }

        self.save_document(JOURNAL_ENTRIES_KEY, &entries).await
    }

    async fn get_journal_entries(&self) -> StoreResult<Vec<JournalEntry>> {
        let entries = self.load_collection(JOURNAL_ENTRIES_KEY).await?;
        Ok(transitions::newest_first(decode_all(JOURNAL_ENTRIES_KEY, &entries)))
    }

    async fn get_journal_entries_for_concept(&self, concept_id: &str) -> StoreResult<Vec<JournalEntry>> {
        let entries = self.load_collection(JOURNAL_ENTRIES_KEY).await?;
        let matching = decode_all::<JournalEntry>(JOURNAL_ENTRIES_KEY, &entries)
            .into_iter()
            .filter(|entry| entry.concept_id.as_deref() == Some(concept_id))
            .collect();
        Ok(transitions::newest_first(matching))
    }

    async fn get_explored_count(&self) -> StoreResult<u64> {
        self.count_status(ConceptStatus::Explored).await
    }

    async fn get_resonates_count(&self) -> StoreResult<u64> {
        self.count_status(ConceptStatus::Resonates).await
    }

    async fn clear_all_data(&self) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        self.kv.multi_remove(&ALL_KEYS).await?;
        info!("Cleared all data from flat storage");
        Ok(())
    }
}
