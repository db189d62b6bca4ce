//! # Temporal Record Repository
//!
//! Append-only history entries and bitemporal descriptive records.
//!
//! ## Closing a Descriptive Record
//! ```text
//!   before     d1 [t0 ──────────────────────── NULL)
//!
//!   close(t1)  d1 [t0 ──────── t1)
//!   insert     d2                [t1 ─────────── NULL)
//!
//!   Payload of d1 is never touched; only valid_to goes NULL → t1.
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::DbResult;
use roost_core::{Description, HistoryEntry};

const DESCRIPTION_COLUMNS: &str = "id, unit_id, valid_from, valid_to, rooms, beds, attributes";

/// Stored shape of a descriptive record; the payload column is JSON text.
#[derive(Debug, sqlx::FromRow)]
struct DescriptionRow {
    id: String,
    unit_id: String,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
    rooms: Option<i64>,
    beds: Option<i64>,
    attributes: String,
}

impl TryFrom<DescriptionRow> for Description {
    type Error = serde_json::Error;

    fn try_from(row: DescriptionRow) -> Result<Self, Self::Error> {
        let attributes: BTreeMap<String, String> = serde_json::from_str(&row.attributes)?;
        Ok(Description {
            id: row.id,
            unit_id: row.unit_id,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            rooms: row.rooms,
            beds: row.beds,
            attributes,
        })
    }
}

/// Repository for history entries and descriptive records inside one scope.
pub struct TemporalRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TemporalRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        TemporalRepository { conn }
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Appends a history entry.
    pub async fn append_history(&mut self, entry: &HistoryEntry) -> DbResult<()> {
        debug!(
            unit_id = %entry.unit_id,
            price_cents = entry.price_cents,
            invalidated_at = %entry.invalidated_at,
            "Appending unit history"
        );

        sqlx::query(
            r#"
            INSERT INTO unit_history (id, unit_id, price_cents, updated_at, invalidated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.unit_id)
        .bind(entry.price_cents)
        .bind(entry.updated_at)
        .bind(entry.invalidated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// History of a unit, oldest first.
    pub async fn history(&mut self, unit_id: &str) -> DbResult<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT id, unit_id, price_cents, updated_at, invalidated_at
            FROM unit_history
            WHERE unit_id = ?1
            ORDER BY invalidated_at
            "#,
        )
        .bind(unit_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(entries)
    }

    // =========================================================================
    // Descriptive Records
    // =========================================================================

    /// The open-ended record of a unit, if it ever had one.
    pub async fn current_description(&mut self, unit_id: &str) -> DbResult<Option<Description>> {
        let row = sqlx::query_as::<_, DescriptionRow>(&format!(
            "SELECT {} FROM unit_descriptions WHERE unit_id = ?1 AND valid_to IS NULL",
            DESCRIPTION_COLUMNS
        ))
        .bind(unit_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Description::try_from).transpose()?)
    }

    /// Every record of a unit ordered by `valid_from`.
    pub async fn descriptions(&mut self, unit_id: &str) -> DbResult<Vec<Description>> {
        let rows = sqlx::query_as::<_, DescriptionRow>(&format!(
            "SELECT {} FROM unit_descriptions WHERE unit_id = ?1 ORDER BY valid_from",
            DESCRIPTION_COLUMNS
        ))
        .bind(unit_id)
        .fetch_all(&mut *self.conn)
        .await?;

        let descriptions = rows
            .into_iter()
            .map(Description::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(descriptions)
    }

    /// Closes the open record of a unit at `at`.
    ///
    /// ## Returns
    /// Number of records closed: 0 if the unit never had one, else 1.
    pub async fn close_current_description(
        &mut self,
        unit_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<u64> {
        debug!(unit_id = %unit_id, at = %at, "Closing current description");

        let result = sqlx::query(
            "UPDATE unit_descriptions SET valid_to = ?2 WHERE unit_id = ?1 AND valid_to IS NULL",
        )
        .bind(unit_id)
        .bind(at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Inserts a descriptive record.
    pub async fn insert_description(&mut self, description: &Description) -> DbResult<()> {
        debug!(
            id = %description.id,
            unit_id = %description.unit_id,
            valid_from = %description.valid_from,
            "Inserting description"
        );

        let attributes = serde_json::to_string(&description.attributes)?;

        sqlx::query(
            r#"
            INSERT INTO unit_descriptions (id, unit_id, valid_from, valid_to, rooms, beds, attributes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&description.id)
        .bind(&description.unit_id)
        .bind(description.valid_from)
        .bind(description.valid_to)
        .bind(description.rooms)
        .bind(description.beds)
        .bind(attributes)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
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
    use chrono::{Duration, TimeZone};
    use roost_core::Unit;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn description(id: &str, from: DateTime<Utc>) -> Description {
        let mut attributes = BTreeMap::new();
        attributes.insert("view".to_string(), "sea".to_string());
        Description {
            id: id.to_string(),
            unit_id: "u-1".to_string(),
            valid_from: from,
            valid_to: None,
            rooms: Some(2),
            beds: Some(1),
            attributes,
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
                updated_at: t0(),
            })
            .await
            .unwrap();
        scope
    }

    #[tokio::test]
    async fn test_close_and_insert_keeps_one_open_record() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = scope_with_unit(&db).await;
        let t1 = t0() + Duration::days(1);

        scope
            .temporal()
            .insert_description(&description("d-1", t0()))
            .await
            .unwrap();
        assert_eq!(
            scope.temporal().close_current_description("u-1", t1).await.unwrap(),
            1
        );
        scope
            .temporal()
            .insert_description(&description("d-2", t1))
            .await
            .unwrap();

        let current = scope.temporal().current_description("u-1").await.unwrap().unwrap();
        assert_eq!(current.id, "d-2");
        assert_eq!(current.attributes.get("view").map(String::as_str), Some("sea"));

        let all = scope.temporal().descriptions("u-1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].valid_to, Some(t1));
        assert!(roost_core::temporal::check_description_timeline(&all).is_ok());
    }

    #[tokio::test]
    async fn test_second_open_record_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = scope_with_unit(&db).await;

        scope
            .temporal()
            .insert_description(&description("d-1", t0()))
            .await
            .unwrap();
        let err = scope
            .temporal()
            .insert_description(&description("d-2", t0() + Duration::hours(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = scope_with_unit(&db).await;

        scope
            .temporal()
            .append_history(&HistoryEntry {
                id: "h-1".to_string(),
                unit_id: "u-1".to_string(),
                price_cents: 9_000,
                updated_at: t0() - Duration::days(1),
                invalidated_at: t0(),
            })
            .await
            .unwrap();

        let err = sqlx::query("UPDATE unit_history SET price_cents = 1")
            .execute(scope.conn())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));

        let history = scope.temporal().history("u-1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price_cents, 9_000);
    }

    #[tokio::test]
    async fn test_payload_edit_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut scope = scope_with_unit(&db).await;
        scope
            .temporal()
            .insert_description(&description("d-1", t0()))
            .await
            .unwrap();

        let err = sqlx::query("UPDATE unit_descriptions SET rooms = 7 WHERE id = 'd-1'")
            .execute(scope.conn())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
    }
}
