//! # roost-core: Pure Domain Logic for Roost
//!
//! Everything the consistency engine decides without touching storage:
//! what a unit, a history entry, a descriptive record and a booking look
//! like, how metadata is validated, and how timelines are checked.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Roost Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            API layer (outside this workspace)                   │   │
//! │  │    auth, JSON parsing, status-code mapping                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ EngineResult<T>                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        roost-db: ConsistencyEngine + stores (SQLite)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ roost-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ temporal  │  │validation │  │   │
//! │  │   │   Unit    │  │   Money   │  │ TimeRange │  │ UnitInfo  │  │   │
//! │  │   │  Booking  │  │           │  │ timelines │  │  filters  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Unit, HistoryEntry, Description, Booking, ...)
//! - [`money`] - Integer-cents price type
//! - [`error`] - The engine's failure taxonomy
//! - [`validation`] - Reserved-key metadata parsing and request checks
//! - [`temporal`] - Half-open ranges, timeline reconstruction and invariants
//!
//! ## Example Usage
//!
//! ```rust
//! use roost_core::money::Money;
//! use roost_core::validation::parse_unit_info;
//! use std::collections::BTreeMap;
//!
//! let price: Money = "120.50".parse().unwrap();
//! assert_eq!(price.cents(), 12050);
//!
//! let mut info = BTreeMap::new();
//! info.insert("rooms".to_string(), "abc".to_string());
//! info.insert("beds".to_string(), "-1".to_string());
//!
//! let err = parse_unit_info(&info).unwrap_err();
//! assert_eq!(err.fields().len(), 2);
//! ```

pub mod error;
pub mod money;
pub mod temporal;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{EngineError, EngineResult, ErrorKind, FieldError, ValidationErrors};
pub use money::Money;
pub use temporal::TimeRange;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Reserved metadata key parsed into [`Description::rooms`].
pub const INFO_ROOMS_KEY: &str = "rooms";

/// Reserved metadata key parsed into [`Description::beds`].
pub const INFO_BEDS_KEY: &str = "beds";

/// Maximum length of a unit address.
pub const MAX_ADDRESS_LEN: usize = 500;
