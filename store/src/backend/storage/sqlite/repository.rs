use async_trait::async_trait;
use log::{debug, info, warn};
use shared::{
    ComfortLevel, ConceptStatus, JournalEntry, LearningGoal, OnboardingState, OnboardingUpdate, UserConcept,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;

use super::connection::DbConnection;
use crate::backend::storage::error::{StoreError, StoreResult};
use crate::backend::storage::traits::{BackendKind, LearningStorage};
use crate::backend::storage::transitions;

/// Backend for runtimes with a usable embedded SQLite engine
#[derive(Clone)]
pub struct SqliteStorage {
    db: DbConnection,
}

impl SqliteStorage {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DbConnection {
        &self.db
    }
}

fn text_column(row: &SqliteRow, table: &str, column: &str) -> StoreResult<String> {
    row.try_get::<String, _>(column)
        .map_err(|e| StoreError::corrupt(format!("{}.{}", table, column), e))
}

fn optional_text_column(row: &SqliteRow, table: &str, column: &str) -> StoreResult<Option<String>> {
    row.try_get::<Option<String>, _>(column)
        .map_err(|e| StoreError::corrupt(format!("{}.{}", table, column), e))
}

fn onboarding_from_row(row: &SqliteRow) -> StoreResult<OnboardingState> {
    let goal = optional_text_column(row, "onboarding", "goal")?
        .map(|tag| tag.parse::<LearningGoal>())
        .transpose()
        .map_err(|e| StoreError::corrupt("onboarding.goal", e))?;
    let comfort_level = text_column(row, "onboarding", "comfort_level")?
        .parse::<ComfortLevel>()
        .map_err(|e| StoreError::corrupt("onboarding.comfort_level", e))?;

    Ok(OnboardingState {
        completed: row
            .try_get("completed")
            .map_err(|e| StoreError::corrupt("onboarding.completed", e))?,
        goal,
        comfort_level,
        first_concept_viewed: row
            .try_get("first_concept_viewed")
            .map_err(|e| StoreError::corrupt("onboarding.first_concept_viewed", e))?,
    })
}

fn concept_from_row(row: &SqliteRow) -> StoreResult<UserConcept> {
    let concept_id = text_column(row, "user_concepts", "concept_id")?;
    let status = text_column(row, "user_concepts", "status")?
        .parse::<ConceptStatus>()
        .map_err(|e| StoreError::corrupt(format!("user_concepts[{}].status", concept_id), e))?;

    Ok(UserConcept {
        status,
        explored_at: optional_text_column(row, "user_concepts", "explored_at")?,
        updated_at: text_column(row, "user_concepts", "updated_at")?,
        concept_id,
    })
}

fn journal_from_row(row: &SqliteRow) -> StoreResult<JournalEntry> {
    Ok(JournalEntry {
        id: text_column(row, "journal_entries", "id")?,
        concept_id: optional_text_column(row, "journal_entries", "concept_id")?,
        content: text_column(row, "journal_entries", "content")?,
        created_at: text_column(row, "journal_entries", "created_at")?,
        updated_at: text_column(row, "journal_entries", "updated_at")?,
    })
}

/// Decode every row, skipping (and logging) the ones that do not fit
fn decode_rows<T>(rows: &[SqliteRow], decode: fn(&SqliteRow) -> StoreResult<T>) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match decode(row) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping unreadable row: {}", e);
                None
            }
        })
        .collect()
}

/// Onboarding singleton as stored, or the default when absent or unreadable
fn onboarding_or_default(row: Option<SqliteRow>) -> OnboardingState {
    match row.as_ref().map(onboarding_from_row) {
        Some(Ok(state)) => state,
        Some(Err(e)) => {
            warn!("Onboarding row unreadable, using defaults: {}", e);
            OnboardingState::default()
        }
        None => OnboardingState::default(),
    }
}

fn concept_or_absent(row: Option<SqliteRow>) -> Option<UserConcept> {
    match row.as_ref().map(concept_from_row) {
        Some(Ok(concept)) => Some(concept),
        Some(Err(e)) => {
            warn!("Concept row unreadable, treating as absent: {}", e);
            None
        }
        None => None,
    }
}

const SELECT_ONBOARDING: &str = r#"
    SELECT completed, goal, comfort_level, first_concept_viewed
    FROM onboarding
    WHERE id = 1
"#;

const SELECT_CONCEPT: &str = r#"
    SELECT concept_id, status, explored_at, updated_at
    FROM user_concepts
    WHERE concept_id = ?
"#;

const UPSERT_CONCEPT: &str = r#"
    INSERT INTO user_concepts (concept_id, status, explored_at, updated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(concept_id) DO UPDATE SET
        status = excluded.status,
        explored_at = excluded.explored_at,
        updated_at = excluded.updated_at
"#;

const SELECT_JOURNAL_ENTRY: &str = r#"
    SELECT id, concept_id, content, created_at, updated_at
    FROM journal_entries
    WHERE id = ?
"#;

impl SqliteStorage {
    /// Read, transform and write back one concept row inside a transaction
    async fn write_concept<F>(&self, concept_id: &str, apply: F) -> StoreResult<UserConcept>
    where
        F: FnOnce(Option<UserConcept>) -> UserConcept + Send,
    {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(SELECT_CONCEPT)
            .bind(concept_id)
            .fetch_optional(&mut *tx)
            .await?;
        let concept = apply(concept_or_absent(row));

        sqlx::query(UPSERT_CONCEPT)
            .bind(&concept.concept_id)
            .bind(concept.status.as_str())
            .bind(&concept.explored_at)
            .bind(&concept.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Concept {} is now {}", concept.concept_id, concept.status);
        Ok(concept)
    }

    async fn count_status(&self, status: ConceptStatus) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_concepts WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(self.db.pool())
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl LearningStorage for SqliteStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Structured
    }

    async fn initialize(&self) -> StoreResult<()> {
        self.db.setup_schema().await?;
        info!("SQLite storage initialized");
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(|r| text_column(&r, "settings", "value")).transpose()
    }

    async fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn get_all_settings(&self) -> StoreResult<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM settings")
            .fetch_all(self.db.pool())
            .await?;

        let mut settings = BTreeMap::new();
        for row in rows {
            settings.insert(
                text_column(&row, "settings", "key")?,
                text_column(&row, "settings", "value")?,
            );
        }
        Ok(settings)
    }

    async fn delete_setting(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn get_onboarding_state(&self) -> StoreResult<OnboardingState> {
        let row = sqlx::query(SELECT_ONBOARDING)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(onboarding_or_default(row))
    }

    async fn update_onboarding(&self, update: &OnboardingUpdate) -> StoreResult<OnboardingState> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(SELECT_ONBOARDING)
            .fetch_optional(&mut *tx)
            .await?;
        let merged = transitions::merge_onboarding(onboarding_or_default(row), update);

        sqlx::query(
            r#"
            INSERT INTO onboarding (id, completed, goal, comfort_level, first_concept_viewed)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                completed = excluded.completed,
                goal = excluded.goal,
                comfort_level = excluded.comfort_level,
                first_concept_viewed = excluded.first_concept_viewed
            "#,
        )
        .bind(merged.completed)
        .bind(merged.goal.map(|goal| goal.as_str()))
        .bind(merged.comfort_level.as_str())
        .bind(merged.first_concept_viewed)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Onboarding updated: {:?}", merged);
        Ok(merged)
    }

    async fn get_user_concept(&self, concept_id: &str) -> StoreResult<Option<UserConcept>> {
        let row = sqlx::query(SELECT_CONCEPT)
            .bind(concept_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(concept_or_absent(row))
    }

    async fn get_all_user_concepts(&self) -> StoreResult<Vec<UserConcept>> {
        let rows = sqlx::query(
            r#"
            SELECT concept_id, status, explored_at, updated_at
            FROM user_concepts
            ORDER BY ROWID ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(decode_rows(&rows, concept_from_row))
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
        let mut tx = self.db.pool().begin().await?;

        if let Some(concept_id) = concept_id {
            let exists = sqlx::query("SELECT 1 FROM user_concepts WHERE concept_id = ?")
                .bind(concept_id)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();

            if !exists {
                return Err(StoreError::unknown_concept("journal entry", concept_id));
            }
        }

        let entry = transitions::new_journal_entry(concept_id, content);
        sqlx::query(
            r#"
            INSERT INTO journal_entries (id, concept_id, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.concept_id)
        .bind(&entry.content)
        .bind(&entry.created_at)
        .bind(&entry.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let dangling = matches!(&e, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation());
            if dangling {
                StoreError::unknown_concept("journal entry", concept_id.unwrap_or_default())
            } else {
                StoreError::from(e)
            }
        })?;

        tx.commit().await?;
        debug!("Created journal entry {}", entry.id);
        Ok(entry)
    }

    async fn get_journal_entry(&self, id: &str) -> StoreResult<Option<JournalEntry>> {
        let row = sqlx::query(SELECT_JOURNAL_ENTRY)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(|r| journal_from_row(&r)).transpose()
    }

    async fn update_journal_entry(&self, id: &str, content: &str) -> StoreResult<JournalEntry> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(SELECT_JOURNAL_ENTRY)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("journal entry", id))?;
        let entry = transitions::revise_journal_entry(journal_from_row(&row)?, content);

        sqlx::query(
            r#"
            UPDATE journal_entries
            SET content = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.content)
        .bind(&entry.updated_at)
        .bind(&entry.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Updated journal entry {}", entry.id);
        Ok(entry)
    }

    async fn delete_journal_entry(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM journal_entries WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            debug!("Journal entry {} already absent", id);
        }
        Ok(())
    }

    async fn get_journal_entries(&self) -> StoreResult<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, concept_id, content, created_at, updated_at
            FROM journal_entries
            ORDER BY created_at DESC, ROWID DESC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(decode_rows(&rows, journal_from_row))
    }

    async fn get_journal_entries_for_concept(&self, concept_id: &str) -> StoreResult<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, concept_id, content, created_at, updated_at
            FROM journal_entries
            WHERE concept_id = ?
            ORDER BY created_at DESC, ROWID DESC
            "#,
        )
        .bind(concept_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(decode_rows(&rows, journal_from_row))
    }

    async fn get_explored_count(&self) -> StoreResult<u64> {
        self.count_status(ConceptStatus::Explored).await
    }

    async fn get_resonates_count(&self) -> StoreResult<u64> {
        self.count_status(ConceptStatus::Resonates).await
    }

    async fn clear_all_data(&self) -> StoreResult<()> {
        let mut tx = self.db.pool().begin().await?;

        // Entries first: they reference concepts
        for table in ["journal_entries", "user_concepts", "onboarding", "settings"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!("Cleared all data from SQLite storage");
        Ok(())
    }
}
