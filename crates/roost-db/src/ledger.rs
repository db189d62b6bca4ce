//! # Reservation Ledger
//!
//! Booking creation and listings.
//!
//! ## Two Guards Against Double Booking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. UnitLocks (engine)    all attempts on one unit run one at a time   │
//! │         │                 inside this process                          │
//! │         ▼                                                               │
//! │  2. count_overlapping     > 0 ──► Overlap, nothing written             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  3. insert ──► bookings_no_overlap trigger                             │
//! │                 catches writers outside this process ──► Overlap       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger itself takes no lock; the caller must hold the unit's lock for
//! the whole scope.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::scope::TransactionScope;
use roost_core::temporal::truncate_to_millis;
use roost_core::validation::validate_new_booking;
use roost_core::{Booking, BookingWithUnit, EngineError, EngineResult, NewBooking, TimeRange};

/// Booking operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReservationLedger;

impl ReservationLedger {
    /// Reserves `[time_from, time_to)` of a unit.
    ///
    /// ## Returns
    /// * `Ok(BookingWithUnit)` - The stored booking and its unit
    /// * `Err(Validation)` - Empty identity or `time_from >= time_to`
    /// * `Err(NotFound)` - No such unit
    /// * `Err(Overlap)` - Intersects an existing booking of the unit
    pub async fn create(
        &self,
        scope: &mut TransactionScope,
        req: &NewBooking,
        now: DateTime<Utc>,
    ) -> EngineResult<BookingWithUnit> {
        // Stored at millisecond precision; a sub-millisecond range is empty
        let range: TimeRange = validate_new_booking(&NewBooking {
            time_from: truncate_to_millis(req.time_from),
            time_to: truncate_to_millis(req.time_to),
            ..req.clone()
        })?;

        let unit = scope
            .units()
            .find(&req.unit_id)
            .await?
            .ok_or_else(|| EngineError::not_found("unit", &req.unit_id))?;

        let overlapping = scope
            .bookings()
            .count_overlapping(&req.unit_id, &range)
            .await?;
        if overlapping > 0 {
            debug!(unit_id = %req.unit_id, overlapping = overlapping, "Booking rejected");
            return Err(EngineError::Overlap {
                unit_id: req.unit_id.clone(),
            });
        }

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            renter_id: req.renter_id.clone(),
            unit_id: req.unit_id.clone(),
            time_from: range.start,
            time_to: range.end,
        };

        scope
            .bookings()
            .insert(&booking, truncate_to_millis(now))
            .await
            .map_err(|e| match e {
                DbError::ExclusionViolation { .. } => EngineError::Overlap {
                    unit_id: req.unit_id.clone(),
                },
                other => other.into(),
            })?;

        Ok(BookingWithUnit {
            booking,
            unit: unit.summary(),
        })
    }

    /// Bookings of a unit that have not ended by `now`.
    pub async fn list_by_unit(
        &self,
        scope: &mut TransactionScope,
        unit_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Booking>> {
        if scope.units().find(unit_id).await?.is_none() {
            return Err(EngineError::not_found("unit", unit_id));
        }
        Ok(scope.bookings().list_ending_after(unit_id, now).await?)
    }

    /// Every booking of a renter with its unit summary.
    pub async fn list_by_renter(
        &self,
        scope: &mut TransactionScope,
        renter_id: &str,
    ) -> EngineResult<Vec<BookingWithUnit>> {
        Ok(scope.bookings().list_by_renter(renter_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
