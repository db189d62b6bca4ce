//! # Repository Module
//!
//! SQL for the four relations, one repository per concern.
//!
//! ## Repositories Borrow a Scope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UnitRegistry / ReservationLedger                                      │
//! │       │                                                                 │
//! │       │  scope.units().find(id)                                        │
//! │       │  scope.temporal().append_history(&entry)                       │
//! │       │  scope.bookings().count_overlapping(unit_id, range)            │
//! │       ▼                                                                 │
//! │  UnitRepository<'c> / TemporalRepository<'c> / BookingRepository<'c>  │
//! │       │   each holds &'c mut SqliteConnection of the open scope        │
//! │       ▼                                                                 │
//! │  SQLite transaction                                                    │
//! │                                                                         │
//! │  A repository can never run a statement outside a TransactionScope.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UnitRepository`] - Current unit rows and filtered listing
//! - [`TemporalRepository`] - History entries and descriptive records
//! - [`BookingRepository`] - Overlap counting, inserts and listings

pub mod booking;
pub mod temporal;
pub mod unit;

pub use booking::BookingRepository;
pub use temporal::TemporalRepository;
pub use unit::UnitRepository;
