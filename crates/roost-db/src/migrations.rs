//! # Database Migrations
//!
//! Embedded SQL migrations for Roost.
//!
//! ## Schema Guards
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Relation            Guard                                             │
//! │  ──────────────────  ────────────────────────────────────────────────  │
//! │  units               UNIQUE(address), price_cents > 0, no DELETE       │
//! │  unit_history        no UPDATE, no DELETE                              │
//! │  unit_descriptions   one open record per unit (partial UNIQUE index),  │
//! │                      only "close" updates, no DELETE                   │
//! │  bookings            time_from < time_to, no overlap per unit,         │
//! │                      no UPDATE                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. **NEVER** modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Each migration runs in its own transaction, in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns information about migrations.
///
/// ## Returns
/// Tuple of (embedded_migrations, successfully_applied_migrations)
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    // A database that never ran migrations has no bookkeeping table yet
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    Ok((total, applied as usize))
}
