//! # Error Types
//!
//! The failure taxonomy every engine operation reports.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  roost-core errors (this file)                                         │
//! │  ├── EngineError       - What the API layer sees                       │
//! │  └── ValidationErrors  - Aggregated field-level failures               │
//! │                                                                         │
//! │  roost-db errors (separate crate)                                      │
//! │  └── DbError           - Storage failures, classified into EngineError │
//! │                                                                         │
//! │  Flow: sqlx::Error → DbError → EngineError → API layer status code     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Validation failures are aggregated, never just the first one
//! 3. The engine never formats text for end users; [`ErrorKind`] is the
//!    machine-readable code the API layer maps to a status

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Engine Error
// =============================================================================

/// A tagged failure returned by the consistency engine.
///
/// Every variant is produced at a component boundary after the enclosing
/// transaction scope has already been rolled back.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced unit (or other record) does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A unique key is already taken (e.g. a unit address).
    #[error("{field} '{value}' already exists")]
    AlreadyExists { field: String, value: String },

    /// The caller is not the owning party of the resource.
    #[error("{caller} does not own {entity} {id}")]
    Forbidden {
        caller: String,
        entity: String,
        id: String,
    },

    /// One or more field-level failures.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The requested booking range intersects an existing booking.
    #[error("booking overlaps an existing reservation on unit {unit_id}")]
    Overlap { unit_id: String },

    /// Storage or connectivity failure; the whole operation may be retried.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// Unexpected failure; not retried automatically.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an AlreadyExists error.
    pub fn already_exists(field: impl Into<String>, value: impl Into<String>) -> Self {
        EngineError::AlreadyExists {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a Forbidden error for `caller` acting on `entity` `id`.
    pub fn forbidden(
        caller: impl Into<String>,
        entity: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        EngineError::Forbidden {
            caller: caller.into(),
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns the machine-readable code for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            EngineError::Forbidden { .. } => ErrorKind::Forbidden,
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Overlap { .. } => ErrorKind::Overlap,
            EngineError::Transient(_) => ErrorKind::Transient,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-submitting the whole operation can succeed.
    ///
    /// Only storage-level trouble qualifies. An `Overlap` may also clear up
    /// if the caller picks another range, but that is a different request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        EngineError::Validation(errors)
    }
}

/// Machine-readable failure codes for the API layer.
///
/// ## Suggested transport mapping
/// ```text
/// NOT_FOUND       → 404      OVERLAP    → 409
/// ALREADY_EXISTS  → 409      TRANSIENT  → 503
/// FORBIDDEN       → 403      INTERNAL   → 500
/// VALIDATION      → 400
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Forbidden,
    Validation,
    Overlap,
    Transient,
    Internal,
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A single field-level failure, e.g. `info.rooms: must be an integer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FieldError {
    /// Dotted path of the offending field (`price`, `info.beds`, ...).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

/// Aggregated validation failures.
///
/// Collect every problem with [`ValidationErrors::add`], then call
/// [`ValidationErrors::into_result`] once at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationErrors {
    fields: Vec<FieldError>,
}

impl ValidationErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        ValidationErrors::default()
    }

    /// Records a failure for `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Moves all failures of `other` into this collection.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.fields.extend(other.fields);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }

    /// Whether any failure was recorded for `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }

    /// `Ok(value)` if nothing was recorded, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
