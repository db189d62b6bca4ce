//! # Per-Unit Advisory Locks
//!
//! Serializes mutations of one unit inside this process.
//!
//! ```text
//!   create_booking(u-1) ──► lock(u-1) ──► begin … count … insert … commit ──► unlock
//!   create_booking(u-1) ──► lock(u-1) ·········· waits ··········· ──► begin …
//!   create_booking(u-2) ──► lock(u-2) ──► begin … (runs in parallel)
//! ```
//!
//! The guard must outlive the transaction scope it protects: acquire the
//! lock first, commit or roll back, then drop the guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Entries whose lock nobody holds are swept once the table grows past this.
const PRUNE_THRESHOLD: usize = 1024;

/// Lock table keyed by unit id.
#[derive(Debug, Clone, Default)]
pub struct UnitLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held while a unit's scope is open. Released on drop.
#[derive(Debug)]
pub struct UnitLockGuard {
    unit_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl UnitLockGuard {
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }
}

impl UnitLocks {
    pub fn new() -> Self {
        UnitLocks::default()
    }

    /// Waits until no other task holds the lock for `unit_id`.
    pub async fn acquire(&self, unit_id: &str) -> UnitLockGuard {
        let lock = self.entry(unit_id);
        let guard = lock.lock_owned().await;
        debug!(unit_id = %unit_id, "Unit lock acquired");
        UnitLockGuard {
            unit_id: unit_id.to_string(),
            _guard: guard,
        }
    }

    /// Number of tracked units.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, unit_id: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.table();
        if table.len() >= PRUNE_THRESHOLD {
            // Only the table itself references an idle entry
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        table
            .entry(unit_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        // The map stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_unit_is_exclusive() {
        let locks = UnitLocks::new();
        let guard = locks.acquire("u-1").await;
        assert_eq!(guard.unit_id(), "u-1");

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("u-1")).await;
        assert!(second.is_err(), "second acquire must wait");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(50), locks.acquire("u-1")).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_different_units_do_not_block() {
        let locks = UnitLocks::new();
        let _a = locks.acquire("u-1").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("u-2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = UnitLocks::new();
        for i in 0..PRUNE_THRESHOLD {
            drop(locks.acquire(&format!("u-{}", i)).await);
        }
        let held = locks.acquire("held").await;
        assert_eq!(locks.len(), 1);
        assert_eq!(held.unit_id(), "held");
    }
}
