//! # Database Error Types
//!
//! Errors for the persistence layer and the transaction coordinator.
//!
//! ## Error Flow
//! ```text
//! sqlx::Error ──► DbError (this module) ──► ApiError (apps/api)
//! CoreError  ──────────┘
//! ```
//!
//! The coordinator surfaces domain rejections (`InsufficientStock`,
//! `StateConflict`, ...) as `DbError::Domain` so callers get one error
//! type per unit of work while the taxonomy of `CoreError` stays intact.

use thiserror::Error;
use tienda_core::CoreError;

/// Database and coordinator errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A domain-level rejection. The transaction was rolled back; no
    /// partial effect remains.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Row lookup came back empty.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// UNIQUE index violation (duplicate SKU, duplicate folio, ...).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// FOREIGN KEY violation (dangling variant_id, sale_id, ...).
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The atomic commit itself failed. Guaranteed no partial effect:
    /// SQLite rolled the transaction back.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// All pool connections in use.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored value could not be decoded (corrupt JSON column, ...).
    #[error("Corrupt stored value in {entity}.{field}: {message}")]
    CorruptValue {
        entity: &'static str,
        field: &'static str,
        message: String,
    },

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound { entity: entity.into(), id: id.into() }
    }
}

/// Maps raw sqlx failures onto the taxonomy.
///
/// ```text
/// sqlx::Error::RowNotFound  → NotFound
/// sqlx::Error::Database     → constraint analysis on the message
/// sqlx::Error::PoolTimedOut → PoolExhausted
/// other                     → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field, value: "unknown".to_string() }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation { message: msg.to_string() }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
