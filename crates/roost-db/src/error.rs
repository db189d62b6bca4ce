//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (roost-core) ← Classified at the component boundary       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  API layer maps ErrorKind to a status code                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use roost_core::EngineError;
use thiserror::Error;

/// Message raised by the `bookings_no_overlap` trigger.
pub(crate) const OVERLAP_TRIGGER_MESSAGE: &str = "booking overlaps an existing reservation";

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for classification into [`EngineError`].
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a unit with an address already taken
    /// - A second open-ended description for the same unit
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - History, description or booking referencing a missing unit
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// An insert was rejected by an exclusion trigger.
    ///
    /// ## When This Occurs
    /// - A booking overlapping an existing one reached the store
    #[error("Exclusion violation on {table}: {message}")]
    ExclusionViolation { table: String, message: String },

    /// A CHECK constraint or guard trigger rejected the statement.
    ///
    /// ## When This Occurs
    /// - Updating append-only history or immutable bookings
    /// - Editing a description payload instead of closing it
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// SQLite reported BUSY or LOCKED (writer contention).
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed to begin, commit or roll back.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the failure is worth retrying the whole operation for.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::PoolExhausted | DbError::ConnectionFailed(_)
        )
    }
}

/// SQLite primary result codes for writer contention.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze code/message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
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

                if is_busy_code(db_err.code().as_deref()) {
                    DbError::Busy(msg.to_string())
                } else if msg.contains(OVERLAP_TRIGGER_MESSAGE) {
                    DbError::ExclusionViolation {
                        table: "bookings".to_string(),
                        message: msg.to_string(),
                    }
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if matches!(db_err.kind(), sqlx::error::ErrorKind::CheckViolation)
                    || msg.contains("CHECK constraint failed")
                    || msg.contains("append-only")
                    || msg.contains("immutable")
                    || msg.contains("never deleted")
                {
                    DbError::ConstraintViolation(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Internal(format!("attributes payload: {}", err))
    }
}

/// Classify storage failures into the engine's taxonomy.
///
/// ## Mapping
/// ```text
/// Busy / PoolExhausted / ConnectionFailed  → Transient
/// UniqueViolation                          → AlreadyExists
/// NotFound                                 → NotFound
/// everything else                          → Internal
/// ```
///
/// Exclusion violations are turned into `Overlap` by the ledger, which knows
/// the unit involved.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            return EngineError::Transient(err.to_string());
        }
        match err {
            DbError::UniqueViolation { field, value } => EngineError::AlreadyExists { field, value },
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Internal(other.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use roost_core::ErrorKind;

    #[test]
    fn test_busy_codes() {
        assert!(is_busy_code(Some("5")));
        assert!(is_busy_code(Some("6")));
        // SQLITE_BUSY_SNAPSHOT (extended)
        assert!(is_busy_code(Some("517")));
        assert!(!is_busy_code(Some("19")));
        assert!(!is_busy_code(Some("2067")));
        assert!(!is_busy_code(None));
    }

    #[test]
    fn test_engine_classification() {
        let transient: EngineError = DbError::Busy("database is locked".into()).into();
        assert_eq!(transient.kind(), ErrorKind::Transient);
        assert!(transient.is_retryable());

        let pool: EngineError = DbError::PoolExhausted.into();
        assert_eq!(pool.kind(), ErrorKind::Transient);

        let dup: EngineError = DbError::duplicate("address", "Budapest, Fő utca 1").into();
        assert_eq!(dup.kind(), ErrorKind::AlreadyExists);

        let missing: EngineError = DbError::not_found("unit", "u-1").into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let guard: EngineError =
            DbError::ConstraintViolation("unit history is append-only".into()).into();
        assert_eq!(guard.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
