//! # roost-db: Storage & Consistency Engine for Roost
//!
//! Persists units, their price history, their bitemporal descriptions and
//! their bookings in SQLite, and exposes every operation through
//! [`ConsistencyEngine`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Roost Data Flow                                  │
//! │                                                                         │
//! │  API layer (outside this workspace)                                    │
//! │       │  engine.create_booking(&req)                                    │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     roost-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ConsistencyEngine ── UnitLocks ── scope timeout               │   │
//! │  │        │                                                        │   │
//! │  │        ├── UnitRegistry ──────┐                                 │   │
//! │  │        └── ReservationLedger ─┤                                 │   │
//! │  │                               ▼                                 │   │
//! │  │   TransactionScope ── UnitRepository / TemporalRepository /     │   │
//! │  │        │              BookingRepository                         │   │
//! │  │        ▼                                                        │   │
//! │  │   Database (pool.rs) ── migrations (embedded)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - The façade: one scope per call, locks, timeouts
//! - [`registry`] - Unit creation, versioned updates, reads
//! - [`ledger`] - Booking creation and listings
//! - [`scope`] - Transaction scope
//! - [`locks`] - Per-unit advisory locks
//! - [`repository`] - SQL per relation
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`config`] - Environment configuration
//! - [`error`] - Database error types and their classification
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roost_db::{ConsistencyEngine, EngineConfig};
//!
//! let engine = ConsistencyEngine::connect(&EngineConfig::load()?).await?;
//! let units = engine.list_units(&UnitFilter::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod registry;
pub mod repository;
pub mod scope;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig};
pub use engine::ConsistencyEngine;
pub use error::{DbError, DbResult};
pub use ledger::ReservationLedger;
pub use locks::UnitLocks;
pub use pool::{Database, DbConfig};
pub use registry::UnitRegistry;
pub use scope::TransactionScope;

// Repository re-exports for convenience
pub use repository::{BookingRepository, TemporalRepository, UnitRepository};
