//! # Row Transitions
//!
//! Pure write rules applied by both backends after they have read the current
//! row and before they write it back. Keeping the rules here means the SQLite
//! and key-value backends cannot drift apart on merge or first-explore
//! semantics.

use shared::{ConceptStatus, JournalEntry, OnboardingState, OnboardingUpdate, UserConcept};

use super::clock;

/// Structural merge: every field set in `update` replaces the stored one
pub fn merge_onboarding(current: OnboardingState, update: &OnboardingUpdate) -> OnboardingState {
    OnboardingState {
        completed: update.completed.unwrap_or(current.completed),
        goal: update.goal.unwrap_or(current.goal),
        comfort_level: update.comfort_level.unwrap_or(current.comfort_level),
        first_concept_viewed: update
            .first_concept_viewed
            .unwrap_or(current.first_concept_viewed),
    }
}

/// Apply a status change, creating the row when absent
///
/// `explored_at` is carried over untouched.
pub fn change_status(existing: Option<UserConcept>, concept_id: &str, status: ConceptStatus) -> UserConcept {
    match existing {
        Some(concept) => UserConcept {
            status,
            updated_at: clock::now_after(&concept.updated_at),
            ..concept
        },
        None => UserConcept {
            concept_id: concept_id.to_string(),
            status,
            explored_at: None,
            updated_at: clock::now(),
        },
    }
}

/// Move a concept to `explored`, stamping `explored_at` on the first explore only
pub fn mark_explored(existing: Option<UserConcept>, concept_id: &str) -> UserConcept {
    match existing {
        Some(concept) => {
            let updated_at = clock::now_after(&concept.updated_at);
            let explored_at = concept.explored_at.or_else(|| Some(updated_at.clone()));
            UserConcept {
                status: ConceptStatus::Explored,
                explored_at,
                updated_at,
                ..concept
            }
        }
        None => {
            let now = clock::now();
            UserConcept {
                concept_id: concept_id.to_string(),
                status: ConceptStatus::Explored,
                explored_at: Some(now.clone()),
                updated_at: now,
            }
        }
    }
}

/// A brand new journal entry; both timestamps are identical
pub fn new_journal_entry(concept_id: Option<&str>, content: &str) -> JournalEntry {
    let now = clock::now();
    JournalEntry {
        id: uuid::Uuid::new_v4().to_string(),
        concept_id: concept_id.map(str::to_string),
        content: content.to_string(),
        created_at: now.clone(),
        updated_at: now,
    }
}

/// Replace the content of an entry; `created_at` never changes
pub fn revise_journal_entry(entry: JournalEntry, content: &str) -> JournalEntry {
    JournalEntry {
        content: content.to_string(),
        updated_at: clock::now_after(&entry.updated_at),
        ..entry
    }
}

/// Newest first by `created_at`; among equal timestamps the later insertion wins
///
/// `entries` must be in insertion order.
pub fn newest_first(mut entries: Vec<JournalEntry>) -> Vec<JournalEntry> {
    entries.reverse();
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    entries
}
