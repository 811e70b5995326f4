//! Behavioural suite every backend must pass
//!
//! `storage_contract!` expands to one test module per backend, each opening
//! its storage through the matching `TestEnvironment` constructor.

use shared::{ComfortLevel, ConceptStatus, LearningGoal, OnboardingState, OnboardingUpdate};
use std::sync::Arc;

use super::error::StoreError;
use super::test_utils::TestEnvironment;
use super::traits::LearningStorage;

async fn assert_fresh<S: LearningStorage>(storage: &S) {
    assert_eq!(storage.get_onboarding_state().await.unwrap(), OnboardingState::default());
    assert!(storage.get_all_user_concepts().await.unwrap().is_empty());
    assert!(storage.get_journal_entries().await.unwrap().is_empty());
    assert!(storage.get_all_settings().await.unwrap().is_empty());
    assert_eq!(storage.get_setting("theme").await.unwrap(), None);
    assert_eq!(storage.get_explored_count().await.unwrap(), 0);
    assert_eq!(storage.get_resonates_count().await.unwrap(), 0);
}

macro_rules! storage_contract {
    ($suite:ident, $open:ident) => {
        mod $suite {
            use super::*;

            #[tokio::test]
            async fn test_fresh_store() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                assert_fresh(&storage).await;
                assert_eq!(storage.get_user_concept("c1").await.unwrap(), None);
            }

            #[tokio::test]
            async fn test_settings() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                storage.set_setting("theme", "dark").await.unwrap();
                storage.set_setting("theme", "light").await.unwrap();
                storage.set_setting("font", "serif").await.unwrap();
                assert_eq!(storage.get_setting("theme").await.unwrap().as_deref(), Some("light"));

                let all = storage.get_all_settings().await.unwrap();
                assert_eq!(all.keys().collect::<Vec<_>>(), vec!["font", "theme"]);

                storage.delete_setting("font").await.unwrap();
                storage.delete_setting("font").await.unwrap();
                assert_eq!(storage.get_setting("font").await.unwrap(), None);
            }

            #[tokio::test]
            async fn test_onboarding_partial_updates_merge() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                storage
                    .update_onboarding(&OnboardingUpdate::new().goal(Some(LearningGoal::Fluency)))
                    .await
                    .unwrap();
                let state = storage
                    .update_onboarding(&OnboardingUpdate::new().completed(true))
                    .await
                    .unwrap();

                let expected = OnboardingState {
                    completed: true,
                    goal: Some(LearningGoal::Fluency),
                    comfort_level: ComfortLevel::Beginner,
                    first_concept_viewed: false,
                };
                assert_eq!(state, expected);
                assert_eq!(storage.get_onboarding_state().await.unwrap(), expected);

                let cleared = storage
                    .update_onboarding(&OnboardingUpdate::new().goal(None).comfort_level(ComfortLevel::Confident))
                    .await
                    .unwrap();
                assert_eq!(cleared.goal, None);
                assert_eq!(cleared.comfort_level, ComfortLevel::Confident);
                assert!(cleared.completed);

                let unchanged = storage.update_onboarding(&OnboardingUpdate::new()).await.unwrap();
                assert_eq!(unchanged, cleared);
            }

            #[tokio::test]
            async fn test_explored_at_is_set_exactly_once() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                let created = storage.update_concept_status("c1", ConceptStatus::Explored).await.unwrap();
                assert_eq!(created.status, ConceptStatus::Explored);
                assert_eq!(created.explored_at, None, "status changes never stamp explored_at");

                let first = storage.mark_concept_explored("c1").await.unwrap();
                let stamped = first.explored_at.clone().unwrap();
                assert_eq!(first.updated_at, stamped);

                storage.update_concept_status("c1", ConceptStatus::Resonates).await.unwrap();
                storage.update_concept_status("c1", ConceptStatus::Unseen).await.unwrap();
                let again = storage.mark_concept_explored("c1").await.unwrap();

                assert_eq!(again.explored_at.as_deref(), Some(stamped.as_str()));
                assert!(again.updated_at > stamped);
                assert_eq!(storage.get_user_concept("c1").await.unwrap(), Some(again));
            }

            #[tokio::test]
            async fn test_mark_explored_creates_missing_concept() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                let concept = storage.mark_concept_explored("fresh").await.unwrap();
                assert_eq!(concept.status, ConceptStatus::Explored);
                assert_eq!(concept.explored_at.as_deref(), Some(concept.updated_at.as_str()));
            }

            #[tokio::test]
            async fn test_updated_at_strictly_increases() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                let mut previous = storage.update_concept_status("c1", ConceptStatus::Unseen).await.unwrap();
                for status in [ConceptStatus::Exploring, ConceptStatus::Exploring, ConceptStatus::Resonates] {
                    let next = storage.update_concept_status("c1", status).await.unwrap();
                    assert!(next.updated_at > previous.updated_at);
                    previous = next;
                }
            }

            #[tokio::test]
            async fn test_counts_follow_statuses() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                storage.mark_concept_explored("a").await.unwrap();
                storage.mark_concept_explored("b").await.unwrap();
                storage.update_concept_status("c", ConceptStatus::Resonates).await.unwrap();
                storage.update_concept_status("a", ConceptStatus::Resonates).await.unwrap();
                storage.update_concept_status("d", ConceptStatus::Exploring).await.unwrap();

                let concepts = storage.get_all_user_concepts().await.unwrap();
                let explored = concepts.iter().filter(|c| c.status == ConceptStatus::Explored).count() as u64;
                let resonates = concepts.iter().filter(|c| c.status == ConceptStatus::Resonates).count() as u64;

                assert_eq!(storage.get_explored_count().await.unwrap(), explored);
                assert_eq!(storage.get_resonates_count().await.unwrap(), resonates);
                assert_eq!((explored, resonates), (1, 2));
            }

            #[tokio::test]
            async fn test_concepts_keep_creation_order() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                for id in ["zeta", "alpha", "mid"] {
                    storage.update_concept_status(id, ConceptStatus::Exploring).await.unwrap();
                }
                storage.mark_concept_explored("zeta").await.unwrap();

                let ids: Vec<String> = storage
                    .get_all_user_concepts()
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|c| c.concept_id)
                    .collect();
                assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
            }

            #[tokio::test]
            async fn test_new_journal_entry_is_listed_first() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                storage.create_journal_entry(None, "older").await.unwrap();
                let entry = storage.create_journal_entry(None, "newest").await.unwrap();
                assert_eq!(entry.created_at, entry.updated_at);
                assert_eq!(entry.concept_id, None);

                let entries = storage.get_journal_entries().await.unwrap();
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0], entry);
                assert_eq!(storage.get_journal_entry(&entry.id).await.unwrap(), Some(entry));
                assert_eq!(storage.get_journal_entry("missing").await.unwrap(), None);
            }

            #[tokio::test]
            async fn test_journal_reference_requires_concept() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                let err = storage.create_journal_entry(Some("concept-42"), "hi").await.unwrap_err();
                assert!(matches!(err, StoreError::Reference { .. }));
                assert!(storage.get_journal_entries().await.unwrap().is_empty());

                storage.update_concept_status("concept-42", ConceptStatus::Exploring).await.unwrap();
                let entry = storage.create_journal_entry(Some("concept-42"), "hi").await.unwrap();
                assert_eq!(entry.concept_id.as_deref(), Some("concept-42"));
            }

            #[tokio::test]
            async fn test_journal_update_and_delete() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                let err = storage.update_journal_entry("missing", "x").await.unwrap_err();
                assert!(matches!(err, StoreError::NotFound { .. }));
                storage.delete_journal_entry("missing").await.unwrap();

                let entry = storage.create_journal_entry(None, "draft").await.unwrap();
                let edited = storage.update_journal_entry(&entry.id, "final").await.unwrap();
                assert_eq!(edited.id, entry.id);
                assert_eq!(edited.content, "final");
                assert_eq!(edited.created_at, entry.created_at);
                assert!(edited.updated_at > entry.updated_at);

                storage.delete_journal_entry(&entry.id).await.unwrap();
                storage.delete_journal_entry(&entry.id).await.unwrap();
                assert!(storage.get_journal_entries().await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_journal_entries_for_concept() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                storage.update_concept_status("a", ConceptStatus::Exploring).await.unwrap();
                storage.update_concept_status("b", ConceptStatus::Exploring).await.unwrap();
                let a1 = storage.create_journal_entry(Some("a"), "a1").await.unwrap();
                storage.create_journal_entry(Some("b"), "b1").await.unwrap();
                storage.create_journal_entry(None, "loose").await.unwrap();
                let a2 = storage.create_journal_entry(Some("a"), "a2").await.unwrap();

                // Editing does not move an entry
                storage.update_journal_entry(&a1.id, "a1 edited").await.unwrap();

                let ids: Vec<String> = storage
                    .get_journal_entries_for_concept("a")
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|e| e.id)
                    .collect();
                assert_eq!(ids, vec![a2.id, a1.id]);
                assert!(storage.get_journal_entries_for_concept("none").await.unwrap().is_empty());
                assert_eq!(storage.get_journal_entries().await.unwrap().len(), 4);
            }

            #[tokio::test]
            async fn test_clear_all_data_restores_fresh_state() {
                let env = TestEnvironment::new().unwrap();
                let storage = env.$open().await.unwrap();

                storage.update_onboarding(&OnboardingUpdate::new().completed(true)).await.unwrap();
                storage.mark_concept_explored("c1").await.unwrap();
                storage.update_concept_status("c2", ConceptStatus::Resonates).await.unwrap();
                storage.create_journal_entry(Some("c1"), "note").await.unwrap();
                storage.set_setting("theme", "dark").await.unwrap();

                storage.clear_all_data().await.unwrap();
                assert_fresh(&storage).await;

                // Still usable afterwards
                storage.update_concept_status("c1", ConceptStatus::Exploring).await.unwrap();
                assert_eq!(storage.get_all_user_concepts().await.unwrap().len(), 1);
            }

            #[tokio::test]
            async fn test_data_survives_reopen() {
                let env = TestEnvironment::new().unwrap();
                let entry_id = {
                    let storage = env.$open().await.unwrap();
                    storage.update_onboarding(&OnboardingUpdate::new().first_concept_viewed(true)).await.unwrap();
                    storage.mark_concept_explored("c1").await.unwrap();
                    storage.set_setting("theme", "dark").await.unwrap();
                    storage.create_journal_entry(Some("c1"), "kept").await.unwrap().id
                };

                let reopened = env.$open().await.unwrap();
                assert!(reopened.get_onboarding_state().await.unwrap().first_concept_viewed);
                assert_eq!(reopened.get_explored_count().await.unwrap(), 1);
                assert_eq!(reopened.get_setting("theme").await.unwrap().as_deref(), Some("dark"));
                let entries = reopened.get_journal_entries().await.unwrap();
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].id, entry_id);
            }

            #[tokio::test]
            async fn test_concurrent_writes_are_not_lost() {
                let env = TestEnvironment::new().unwrap();
                let storage = Arc::new(env.$open().await.unwrap());

                let mut handles = Vec::new();
                for i in 0..10 {
                    let storage = Arc::clone(&storage);
                    handles.push(tokio::spawn(async move {
                        let concept_id = format!("concept-{}", i);
                        storage.mark_concept_explored(&concept_id).await.unwrap();
                        storage.create_journal_entry(Some(&concept_id), "note").await.unwrap();
                        storage
                            .update_onboarding(&OnboardingUpdate::new().first_concept_viewed(true))
                            .await
                            .unwrap();
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }

                assert_eq!(storage.get_all_user_concepts().await.unwrap().len(), 10);
                assert_eq!(storage.get_explored_count().await.unwrap(), 10);
                assert_eq!(storage.get_journal_entries().await.unwrap().len(), 10);
                assert!(storage.get_onboarding_state().await.unwrap().first_concept_viewed);
            }
        }
    };
}

storage_contract!(sqlite_contract, sqlite_storage);
storage_contract!(flat_contract, flat_storage);
