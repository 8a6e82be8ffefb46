//! Unified store error type.
//!
//! Every store, media and repository operation returns
//! `Result<T, StoreError>`. Constraint violations raised by SQLite are
//! translated into [`StoreError::Conflict`] / [`StoreError::NotFound`] so
//! callers never have to inspect driver error codes.

use thiserror::Error;

/// All errors that can occur while persisting simulation records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the given identifier.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A record with the same identifier already exists.
    #[error("{entity} already exists: {id}")]
    Conflict { entity: &'static str, id: String },

    /// Reading or writing an uploaded file failed.
    #[error("storage I/O error: {0}")]
    Storage(#[from] std::io::Error),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded schema migrations could not be applied.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The uploaded file name is empty or escapes the media root.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// A runtime bucket cannot count any higher.
    #[error("runtime stat bucket {exec_time} would overflow")]
    CounterOverflow { exec_time: i64 },

    /// A persisted column holds a value that cannot be decoded.
    #[error("malformed {column} in database: {raw:?}")]
    Decode { column: &'static str, raw: String },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// Translate a failed `INSERT` into a domain error.
    ///
    /// Unique violations become `Conflict { entity, id }`; foreign-key
    /// violations mean the referenced task is gone.
    pub(crate) fn from_insert(
        err: sqlx::Error,
        entity: &'static str,
        id: impl ToString,
        parent: Option<(&'static str, String)>,
    ) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::Conflict { entity, id: id.to_string() };
            }
            if db.is_foreign_key_violation() {
                if let Some((parent_entity, parent_id)) = parent {
                    return Self::NotFound { entity: parent_entity, id: parent_id };
                }
            }
        }
        Self::Database(err)
    }

    /// `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `true` for [`StoreError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
