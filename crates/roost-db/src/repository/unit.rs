//! # Unit Repository
//!
//! Database operations for the `units` relation (current state).
//!
//! ## Filtered Listing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UnitFilter { city, rooms, beds }                                      │
//! │                                                                         │
//! │  rooms/beds set?  ──► JOIN unit_descriptions d                         │
//! │                       ON d.unit_id = u.id AND d.valid_to IS NULL       │
//! │                       (only the currently valid record counts)         │
//! │                                                                         │
//! │  city set?        ──► matched in process on the first address segment  │
//! │                       SQLite lower() folds ASCII only                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::error::DbResult;
use roost_core::{Unit, UnitFilter};

const UNIT_COLUMNS: &str = "u.id, u.owner_id, u.address, u.price_cents, u.updated_at";

/// Repository for unit rows inside one transaction scope.
pub struct UnitRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> UnitRepository<'c> {
    /// Creates a new UnitRepository on a scope's connection.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        UnitRepository { conn }
    }

    /// Gets a unit by ID.
    pub async fn find(&mut self, id: &str) -> DbResult<Option<Unit>> {
        let unit = sqlx::query_as::<_, Unit>(&format!(
            "SELECT {} FROM units u WHERE u.id = ?1",
            UNIT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(unit)
    }

    /// Whether a unit already occupies `address`.
    pub async fn address_exists(&mut self, address: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM units WHERE address = ?1)")
                .bind(address)
                .fetch_one(&mut *self.conn)
                .await?;

        Ok(exists)
    }

    /// Inserts a new unit row.
    pub async fn insert(&mut self, unit: &Unit) -> DbResult<()> {
        debug!(id = %unit.id, address = %unit.address, "Inserting unit");

        sqlx::query(
            r#"
            INSERT INTO units (id, owner_id, address, price_cents, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.owner_id)
        .bind(&unit.address)
        .bind(unit.price_cents)
        .bind(unit.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Overwrites price and last-update instant in place.
    ///
    /// ## Returns
    /// Number of rows touched (0 if the unit does not exist).
    pub async fn update_price(
        &mut self,
        id: &str,
        price_cents: i64,
        updated_at: DateTime<Utc>,
    ) -> DbResult<u64> {
        debug!(id = %id, price_cents = price_cents, "Updating unit price");

        let result = sqlx::query("UPDATE units SET price_cents = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(price_cents)
            .bind(updated_at)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Lists current units matching `filter`, ordered by address.
    pub async fn list(&mut self, filter: &UnitFilter) -> DbResult<Vec<Unit>> {
        debug!(?filter, "Listing units");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM units u", UNIT_COLUMNS));

        if filter.needs_description() {
            qb.push(" JOIN unit_descriptions d ON d.unit_id = u.id AND d.valid_to IS NULL");
        }
        qb.push(" WHERE 1 = 1");
        if let Some(rooms) = filter.rooms {
            qb.push(" AND d.rooms = ").push_bind(rooms);
        }
        if let Some(beds) = filter.beds {
            qb.push(" AND d.beds = ").push_bind(beds);
        }
        qb.push(" ORDER BY u.address");

        let units = qb
            .build_query_as::<Unit>()
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(units
            .into_iter()
            .filter(|u| filter.matches_city(&u.address))
            .collect())
    }

    /// Lists the units of one owner, ordered by address.
    pub async fn list_by_owner(&mut self, owner_id: &str) -> DbResult<Vec<Unit>> {
        let units = sqlx::query_as::<_, Unit>(&format!(
            "SELECT {} FROM units u WHERE u.owner_id = ?1 ORDER BY u.address",
            UNIT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(units)
    }

    /// Total number of units.
    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM units")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
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
    use chrono::TimeZone;

    fn unit(id: &str, owner: &str, address: &str) -> Unit {
        Unit {
            id: id.to_string(),
            owner_id: owner.to_string(),
            address: address.to_string(),
            price_cents: 10_000,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = TransactionScope::begin(db.pool()).await.unwrap();

        let u = unit("u-1", "o-1", "Budapest, Fő utca 1");
        scope.units().insert(&u).await.unwrap();

        assert_eq!(scope.units().find("u-1").await.unwrap(), Some(u));
        assert!(scope.units().find("missing").await.unwrap().is_none());
        assert!(scope
            .units()
            .address_exists("Budapest, Fő utca 1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_address_is_unique_violation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = TransactionScope::begin(db.pool()).await.unwrap();

        scope
            .units()
            .insert(&unit("u-1", "o-1", "Budapest, Fő utca 1"))
            .await
            .unwrap();
        let err = scope
            .units()
            .insert(&unit("u-2", "o-2", "Budapest, Fő utca 1"))
            .await
            .unwrap_err();

        assert!(matches!(err, crate::DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_by_city_segment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = TransactionScope::begin(db.pool()).await.unwrap();

        scope
            .units()
            .insert(&unit("u-1", "o-1", "Budapest, Fő utca 1"))
            .await
            .unwrap();
        scope
            .units()
            .insert(&unit("u-2", "o-1", "Vienna, Budapester Straße 4"))
            .await
            .unwrap();

        let filter = UnitFilter {
            city: Some("BUDA".to_string()),
            ..UnitFilter::default()
        };
        let found = scope.units().list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "u-1");

        let all = scope.units().list(&UnitFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(scope.units().count().await.unwrap(), 2);
        assert_eq!(scope.units().list_by_owner("o-1").await.unwrap().len(), 2);
    }
}
