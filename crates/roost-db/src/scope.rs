//! # Transaction Scope
//!
//! One logical request = one scope = one SQLite transaction.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   TransactionScope::begin(pool)                                        │
//! │          │                                                              │
//! │          ▼                                                              │
//! │   scope.units() / scope.temporal() / scope.bookings()                  │
//! │          │        every statement runs on the scope's connection        │
//! │          ▼                                                              │
//! │   ┌──────────────┐     ┌──────────────┐     ┌──────────────────────┐   │
//! │   │   commit()   │     │  rollback()  │     │  dropped (timeout,   │   │
//! │   │  visible     │     │  discarded   │     │  panic) → rolled back│   │
//! │   └──────────────┘     └──────────────┘     └──────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scopes do not nest. `commit` and `rollback` consume the scope, so a
//! finished scope cannot be reused.
//!
//! ## Read vs Write Scopes
//! - [`TransactionScope::begin`] issues a deferred `BEGIN`. Reads see one
//!   snapshot and never block writers.
//! - [`TransactionScope::begin_write`] issues `BEGIN IMMEDIATE`, taking the
//!   database write lock before the first read. Competing writers queue on
//!   the busy timeout instead of failing with `SQLITE_BUSY_SNAPSHOT` when
//!   their read snapshot goes stale, and a check-then-insert sees every
//!   previously committed row.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{BookingRepository, TemporalRepository, UnitRepository};

/// An open transaction against the store.
pub struct TransactionScope {
    tx: Transaction<'static, Sqlite>,
}

impl TransactionScope {
    /// Opens a read scope on a pooled connection.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool.begin().await.map_err(|e| scope_error("begin", e))?;
        debug!("Transaction scope opened");
        Ok(TransactionScope { tx })
    }

    /// Opens a scope that holds the write lock from its first statement.
    ///
    /// Waits up to the connection's busy timeout for other writers; past
    /// that the error is transient.
    pub async fn begin_write(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| scope_error("begin", e))?;
        debug!("Write scope opened");
        Ok(TransactionScope { tx })
    }

    /// Makes every write of the scope visible at once.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await.map_err(|e| scope_error("commit", e))?;
        debug!("Transaction scope committed");
        Ok(())
    }

    /// Discards every write of the scope.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| scope_error("rollback", e))?;
        debug!("Transaction scope rolled back");
        Ok(())
    }

    /// The connection the scope's statements run on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Unit rows of this scope.
    pub fn units(&mut self) -> UnitRepository<'_> {
        UnitRepository::new(self.conn())
    }

    /// History entries and descriptive records of this scope.
    pub fn temporal(&mut self) -> TemporalRepository<'_> {
        TemporalRepository::new(self.conn())
    }

    /// Bookings of this scope.
    pub fn bookings(&mut self) -> BookingRepository<'_> {
        BookingRepository::new(self.conn())
    }
}

/// Keeps contention retryable; anything else is a transaction failure.
fn scope_error(stage: &str, err: sqlx::Error) -> DbError {
    match DbError::from(err) {
        e if e.is_transient() => e,
        e => DbError::TransactionFailed(format!("{}: {}", stage, e)),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::time::Duration;

    async fn count_units(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM units")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn insert_unit(scope: &mut TransactionScope, address: &str) {
        sqlx::query(
            "INSERT INTO units (id, owner_id, address, price_cents, updated_at) \
             VALUES (?1, 'owner-1', ?2, 100, '2024-01-01T00:00:00+00:00')",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(address)
        .execute(scope.conn())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut scope = TransactionScope::begin(db.pool()).await.unwrap();
        insert_unit(&mut scope, "Budapest, Fő utca 1").await;
        scope.commit().await.unwrap();

        assert_eq!(count_units(&db).await, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut scope = TransactionScope::begin(db.pool()).await.unwrap();
        insert_unit(&mut scope, "Budapest, Fő utca 1").await;
        scope.rollback().await.unwrap();

        assert_eq!(count_units(&db).await, 0);
    }

    #[tokio::test]
    async fn test_write_scope_commits() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut scope = TransactionScope::begin_write(db.pool()).await.unwrap();
        insert_unit(&mut scope, "Budapest, Fő utca 1").await;
        scope.commit().await.unwrap();

        assert_eq!(count_units(&db).await, 1);
    }

    #[tokio::test]
    async fn test_write_scope_excludes_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("roost.db"))
            .max_connections(2)
            .busy_timeout(Duration::from_millis(100));
        let db = Database::new(config).await.unwrap();

        let mut first = TransactionScope::begin_write(db.pool()).await.unwrap();
        insert_unit(&mut first, "Budapest, Fő utca 1").await;

        let err = TransactionScope::begin_write(db.pool()).await.err().unwrap();
        assert!(err.is_transient());

        // Readers are not blocked and do not see uncommitted rows
        let mut reader = TransactionScope::begin(db.pool()).await.unwrap();
        let visible: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM units")
            .fetch_one(reader.conn())
            .await
            .unwrap();
        assert_eq!(visible, 0);
        reader.commit().await.unwrap();

        first.commit().await.unwrap();
        let mut second = TransactionScope::begin_write(db.pool()).await.unwrap();
        insert_unit(&mut second, "Budapest, Fő utca 2").await;
        second.commit().await.unwrap();

        assert_eq!(count_units(&db).await, 2);
    }

    #[tokio::test]
    async fn test_dropped_scope_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut scope = TransactionScope::begin(db.pool()).await.unwrap();
            insert_unit(&mut scope, "Budapest, Fő utca 1").await;
        }

        assert_eq!(count_units(&db).await, 0);
    }
}
