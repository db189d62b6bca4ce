//! # Consistency Engine
//!
//! The only entry point the API layer talks to.
//!
//! ## One Call, One Scope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  engine.create_booking(req)                                            │
//! │                                                                         │
//! │  bounded(scope_timeout) ┌────────────────────────────────────────────┐ │
//! │                         │ lock(unit_id)            (mutations only)  │ │
//! │                         │ scope = begin_write()   (BEGIN IMMEDIATE)  │ │
//! │                         │ result = ledger.create(&mut scope, req)    │ │
//! │                         │ settle(scope, result)                      │ │
//! │                         │    Ok  ──► commit                          │ │
//! │                         │    Err ──► rollback, return Err            │ │
//! │                         └────────────────────────────────────────────┘ │
//! │  elapsed? future dropped ──► scope dropped ──► rolled back ──► Transient│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations open write scopes, so writers to different units queue on the
//! SQLite write lock rather than failing. Reads use deferred scopes.
//!
//! Nothing is retried here. A `Transient` failure means the caller may
//! submit the whole operation again.
//!
//! ## Usage
//! ```rust,ignore
//! let engine = ConsistencyEngine::connect(&EngineConfig::load()?).await?;
//!
//! let unit = engine.create_unit(&new_unit).await?;
//! let booking = engine.create_booking(&new_booking).await?;
//! ```

use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::DbResult;
use crate::ledger::ReservationLedger;
use crate::locks::UnitLocks;
use crate::pool::Database;
use crate::registry::UnitRegistry;
use crate::scope::TransactionScope;
use roost_core::{
    Booking, BookingWithUnit, Description, EngineError, EngineResult, ErrorKind, HistoryEntry,
    NewBooking, NewUnit, OwnedUnit, PriceInterval, Unit, UnitFilter, UnitUpdate,
    UnitWithDescription,
};

/// Façade over the unit registry and the reservation ledger.
///
/// Cloning is cheap; clones share the pool and the lock table.
#[derive(Debug, Clone)]
pub struct ConsistencyEngine {
    db: Database,
    locks: UnitLocks,
    registry: UnitRegistry,
    ledger: ReservationLedger,
    scope_timeout: Duration,
}

impl ConsistencyEngine {
    /// Opens the database described by `config` and builds an engine on it.
    pub async fn connect(config: &EngineConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(Self::new(db, config.scope_timeout))
    }

    pub fn new(db: Database, scope_timeout: Duration) -> Self {
        ConsistencyEngine {
            db,
            locks: UnitLocks::new(),
            registry: UnitRegistry,
            ledger: ReservationLedger,
            scope_timeout,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Whether the store answers queries.
    pub async fn health_check(&self) -> bool {
        self.db.health_check().await
    }

    // =========================================================================
    // Units
    // =========================================================================

    /// Creates a unit (and its first description when metadata is given).
    pub async fn create_unit(&self, req: &NewUnit) -> EngineResult<UnitWithDescription> {
        let created = self
            .bounded("create_unit", async {
                let mut scope = self.begin_write().await?;
                let result = self.registry.create(&mut scope, req, Utc::now()).await;
                settle("create_unit", scope, result).await
            })
            .await?;

        info!(
            unit_id = %created.unit.id,
            owner_id = %created.unit.owner_id,
            "Unit created"
        );
        Ok(created)
    }

    /// Versioned update of price and/or metadata, serialized per unit.
    pub async fn update_unit(
        &self,
        unit_id: &str,
        req: &UnitUpdate,
    ) -> EngineResult<UnitWithDescription> {
        let updated = self
            .bounded("update_unit", async {
                let _lock = self.locks.acquire(unit_id).await;
                let mut scope = self.begin_write().await?;
                let result = self
                    .registry
                    .update_attributes(&mut scope, unit_id, req, Utc::now())
                    .await;
                settle("update_unit", scope, result).await
            })
            .await?;

        info!(
            unit_id = %unit_id,
            price_cents = updated.unit.price_cents,
            updated_at = %updated.unit.updated_at,
            "Unit updated"
        );
        Ok(updated)
    }

    /// A unit with its currently valid description.
    pub async fn get_unit(&self, unit_id: &str) -> EngineResult<UnitWithDescription> {
        self.bounded("get_unit", async {
            let mut scope = self.begin().await?;
            let result = self.registry.get(&mut scope, unit_id).await;
            settle("get_unit", scope, result).await
        })
        .await
    }

    /// Current units matching `filter`.
    pub async fn list_units(&self, filter: &UnitFilter) -> EngineResult<Vec<Unit>> {
        self.bounded("list_units", async {
            let mut scope = self.begin().await?;
            let result = self.registry.list(&mut scope, filter).await;
            settle("list_units", scope, result).await
        })
        .await
    }

    /// An owner's units with current descriptions and active bookings.
    pub async fn list_units_by_owner(&self, owner_id: &str) -> EngineResult<Vec<OwnedUnit>> {
        self.bounded("list_units_by_owner", async {
            let mut scope = self.begin().await?;
            let result = self
                .registry
                .list_by_owner(&mut scope, owner_id, Utc::now())
                .await;
            settle("list_units_by_owner", scope, result).await
        })
        .await
    }

    pub async fn unit_history(&self, unit_id: &str) -> EngineResult<Vec<HistoryEntry>> {
        self.bounded("unit_history", async {
            let mut scope = self.begin().await?;
            let result = self.registry.history(&mut scope, unit_id).await;
            settle("unit_history", scope, result).await
        })
        .await
    }

    pub async fn price_timeline(&self, unit_id: &str) -> EngineResult<Vec<PriceInterval>> {
        self.bounded("price_timeline", async {
            let mut scope = self.begin().await?;
            let result = self.registry.price_timeline(&mut scope, unit_id).await;
            settle("price_timeline", scope, result).await
        })
        .await
    }

    pub async fn description_history(&self, unit_id: &str) -> EngineResult<Vec<Description>> {
        self.bounded("description_history", async {
            let mut scope = self.begin().await?;
            let result = self.registry.description_history(&mut scope, unit_id).await;
            settle("description_history", scope, result).await
        })
        .await
    }

    // =========================================================================
    // Bookings
    // =========================================================================

    /// Reserves a range of a unit. At most one of several concurrent
    /// conflicting requests succeeds; the others get `Overlap`.
    pub async fn create_booking(&self, req: &NewBooking) -> EngineResult<BookingWithUnit> {
        let created = self
            .bounded("create_booking", async {
                let _lock = self.locks.acquire(&req.unit_id).await;
                let mut scope = self.begin_write().await?;
                let result = self.ledger.create(&mut scope, req, Utc::now()).await;
                settle("create_booking", scope, result).await
            })
            .await?;

        info!(
            booking_id = %created.booking.id,
            unit_id = %created.booking.unit_id,
            renter_id = %created.booking.renter_id,
            "Booking created"
        );
        Ok(created)
    }

    /// Active and future bookings of a unit.
    pub async fn list_bookings_by_unit(&self, unit_id: &str) -> EngineResult<Vec<Booking>> {
        self.bounded("list_bookings_by_unit", async {
            let mut scope = self.begin().await?;
            let result = self
                .ledger
                .list_by_unit(&mut scope, unit_id, Utc::now())
                .await;
            settle("list_bookings_by_unit", scope, result).await
        })
        .await
    }

    /// Every booking of a renter with its unit summary.
    pub async fn list_bookings_by_renter(
        &self,
        renter_id: &str,
    ) -> EngineResult<Vec<BookingWithUnit>> {
        self.bounded("list_bookings_by_renter", async {
            let mut scope = self.begin().await?;
            let result = self.ledger.list_by_renter(&mut scope, renter_id).await;
            settle("list_bookings_by_renter", scope, result).await
        })
        .await
    }

    // =========================================================================
    // Scope plumbing
    // =========================================================================

    async fn begin(&self) -> EngineResult<TransactionScope> {
        Ok(TransactionScope::begin(self.db.pool()).await?)
    }

    async fn begin_write(&self) -> EngineResult<TransactionScope> {
        Ok(TransactionScope::begin_write(self.db.pool()).await?)
    }

    /// Runs `work` under the scope timeout. Dropping `work` on expiry drops
    /// its scope, which rolls the transaction back.
    async fn bounded<T, F>(&self, operation: &'static str, work: F) -> EngineResult<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        match tokio::time::timeout(self.scope_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation = operation,
                    timeout_ms = self.scope_timeout.as_millis() as u64,
                    "Scope timed out and was rolled back"
                );
                Err(EngineError::Transient(format!(
                    "{} timed out after {:?}",
                    operation, self.scope_timeout
                )))
            }
        }
    }
}

/// Commits on success, rolls back on failure.
async fn settle<T>(
    operation: &'static str,
    scope: TransactionScope,
    result: EngineResult<T>,
) -> EngineResult<T> {
    match result {
        Ok(value) => {
            scope.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = scope.rollback().await {
                warn!(operation = operation, error = %rollback_err, "Rollback failed");
            }
            match err.kind() {
                ErrorKind::Transient | ErrorKind::Internal => {
                    warn!(operation = operation, error = %err, "Scope rolled back")
                }
                kind => debug!(operation = operation, ?kind, "Scope rolled back"),
            }
            Err(err)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
