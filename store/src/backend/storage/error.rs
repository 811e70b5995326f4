//! # Storage Errors
//!
//! Typed failures shared by both backends. Callers match on the variant, so
//! both implementations must map their native errors onto the same kinds.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row an update expected does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A reference to another row does not resolve
    #[error("{entity} references unknown {target}: {id}")]
    Reference {
        entity: &'static str,
        target: &'static str,
        id: String,
    },

    /// The underlying storage primitive failed to open, read or write
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A stored value could not be decoded into its expected shape
    #[error("corrupt value at {location}: {reason}")]
    Corrupt { location: String, reason: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn unknown_concept(entity: &'static str, concept_id: impl Into<String>) -> Self {
        StoreError::Reference {
            entity,
            target: "concept",
            id: concept_id.into(),
        }
    }

    pub fn corrupt(location: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}
