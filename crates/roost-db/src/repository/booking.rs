//! # Booking Repository
//!
//! Database operations for the `bookings` relation.
//!
//! ## Overlap Query
//! ```text
//!   existing  [time_from ─────────── time_to)
//!   request            [from ─────────────── to)
//!
//!   conflict  ⇔  existing.time_from < to  AND  existing.time_to > from
//! ```
//!
//! The same predicate backs the `bookings_no_overlap` trigger, so an insert
//! that slips past the count is still rejected by the store.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use roost_core::{Booking, BookingWithUnit, TimeRange, UnitSummary};

/// Booking joined with its unit.
#[derive(Debug, sqlx::FromRow)]
struct BookingUnitRow {
    id: String,
    renter_id: String,
    unit_id: String,
    time_from: DateTime<Utc>,
    time_to: DateTime<Utc>,
    owner_id: String,
    address: String,
    price_cents: i64,
}

impl From<BookingUnitRow> for BookingWithUnit {
    fn from(row: BookingUnitRow) -> Self {
        BookingWithUnit {
            unit: UnitSummary {
                id: row.unit_id.clone(),
                owner_id: row.owner_id,
                address: row.address,
                price_cents: row.price_cents,
            },
            booking: Booking {
                id: row.id,
                renter_id: row.renter_id,
                unit_id: row.unit_id,
                time_from: row.time_from,
                time_to: row.time_to,
            },
        }
    }
}

/// Repository for bookings inside one transaction scope.
pub struct BookingRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> BookingRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        BookingRepository { conn }
    }

    /// Counts bookings of `unit_id` that overlap `range`.
    pub async fn count_overlapping(&mut self, unit_id: &str, range: &TimeRange) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE unit_id = ?1 AND time_from < ?3 AND time_to > ?2
            "#,
        )
        .bind(unit_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(unit_id = %unit_id, overlapping = count, "Counted overlapping bookings");
        Ok(count)
    }

    /// Inserts a booking.
    pub async fn insert(&mut self, booking: &Booking, created_at: DateTime<Utc>) -> DbResult<()> {
        debug!(
            id = %booking.id,
            unit_id = %booking.unit_id,
            from = %booking.time_from,
            to = %booking.time_to,
            "Inserting booking"
        );

        sqlx::query(
            r#"
            INSERT INTO bookings (id, renter_id, unit_id, time_from, time_to, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&booking.id)
        .bind(&booking.renter_id)
        .bind(&booking.unit_id)
        .bind(booking.time_from)
        .bind(booking.time_to)
        .bind(created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Bookings of a unit with `time_to > cutoff`, ordered by start.
    pub async fn list_ending_after(
        &mut self,
        unit_id: &str,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, renter_id, unit_id, time_from, time_to
            FROM bookings
            WHERE unit_id = ?1 AND time_to > ?2
            ORDER BY time_from
            "#,
        )
        .bind(unit_id)
        .bind(cutoff)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(bookings)
    }

    /// Every booking of a renter with its unit, ordered by start.
    pub async fn list_by_renter(&mut self, renter_id: &str) -> DbResult<Vec<BookingWithUnit>> {
        let rows = sqlx::query_as::<_, BookingUnitRow>(
            r#"
            SELECT b.id, b.renter_id, b.unit_id, b.time_from, b.time_to,
                   u.owner_id, u.address, u.price_cents
            FROM bookings b
            JOIN units u ON u.id = b.unit_id
            WHERE b.renter_id = ?1
            ORDER BY b.time_from
            "#,
        )
        .bind(renter_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(BookingWithUnit::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::scope::TransactionScope;
    use crate::DbError;
    use chrono::TimeZone;
    use roost_core::Unit;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn booking(id: &str, from: u32, to: u32) -> Booking {
        Booking {
            id: id.to_string(),
            renter_id: "r-1".to_string(),
            unit_id: "u-1".to_string(),
            time_from: day(from),
            time_to: day(to),
        }
    }

    async fn scope_with_unit(db: &Database) -> TransactionScope {
        let mut scope = TransactionScope::begin(db.pool()).await.unwrap();
        scope
            .units()
            .insert(&Unit {
                id: "u-1".to_string(),
                owner_id: "o-1".to_string(),
                address: "Budapest, Fő utca 1".to_string(),
                price_cents: 10_000,
                updated_at: day(1),
            })
            .await
            .unwrap();
        scope
    }

    #[tokio::test]
    async fn test_count_overlapping_is_half_open() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = scope_with_unit(&db).await;
        scope.bookings().insert(&booking("b-1", 10, 15), day(1)).await.unwrap();

        let overlapping = TimeRange::new(day(14), day(20));
        let touching = TimeRange::new(day(15), day(20));
        let before = TimeRange::new(day(5), day(10));

        assert_eq!(scope.bookings().count_overlapping("u-1", &overlapping).await.unwrap(), 1);
        assert_eq!(scope.bookings().count_overlapping("u-1", &touching).await.unwrap(), 0);
        assert_eq!(scope.bookings().count_overlapping("u-1", &before).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_trigger_rejects_overlapping_insert() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = scope_with_unit(&db).await;
        scope.bookings().insert(&booking("b-1", 10, 15), day(1)).await.unwrap();

        let err = scope
            .bookings()
            .insert(&booking("b-2", 12, 13), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ExclusionViolation { .. }));

        // Touching is fine
        scope.bookings().insert(&booking("b-3", 15, 18), day(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_bookings_are_immutable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = scope_with_unit(&db).await;
        scope.bookings().insert(&booking("b-1", 10, 15), day(1)).await.unwrap();

        let err = sqlx::query("UPDATE bookings SET renter_id = 'r-2'")
            .execute(scope.conn())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_listings() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = scope_with_unit(&db).await;
        scope.bookings().insert(&booking("b-2", 20, 22), day(1)).await.unwrap();
        scope.bookings().insert(&booking("b-1", 2, 4), day(1)).await.unwrap();

        let active = scope.bookings().list_ending_after("u-1", day(10)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "b-2");

        let mine = scope.bookings().list_by_renter("r-1").await.unwrap();
        assert_eq!(
            mine.iter().map(|b| b.booking.id.as_str()).collect::<Vec<_>>(),
            vec!["b-1", "b-2"]
        );
        assert_eq!(mine[0].unit.address, "Budapest, Fő utca 1");
    }
}
