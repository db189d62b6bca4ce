//! # Temporal Math
//!
//! Half-open ranges and the invariants every timeline in Roost obeys.
//!
//! ## Half-Open Ranges
//! ```text
//!   booking A   [──────────────)            10 Jan → 15 Jan
//!   booking B                  [──────)     15 Jan → 18 Jan   touches A: OK
//!   booking C            [─────────)        13 Jan → 16 Jan   overlaps A: REJECTED
//!
//!   overlap(a, b)  ⇔  a.start < b.end  ∧  a.end > b.start
//! ```
//!
//! ## Price Timeline Reconstruction
//! ```text
//!   history (sorted by invalidated_at)           current row
//!   ┌────────────────┐ ┌────────────────┐        ┌──────────────────┐
//!   │ p0  t0 → t1    │ │ p1  t1 → t2    │   ...  │ pN  tN → (open)  │
//!   └────────────────┘ └────────────────┘        └──────────────────┘
//!
//!   entry.updated_at      = when that price became current
//!   entry.invalidated_at  = when it stopped; equals the next start
//! ```
//!
//! All instants are kept at millisecond precision so values survive a
//! round trip through storage unchanged.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Description, HistoryEntry, PriceInterval, Unit};

// =============================================================================
// Time Range
// =============================================================================

/// A half-open range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a range without checking `start < end`.
    #[inline]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeRange { start, end }
    }

    /// Creates a range, returning `None` when it would be empty or inverted.
    pub fn try_new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(TimeRange { start, end })
    }

    /// Whether the two ranges share at least one instant.
    ///
    /// Ranges that merely touch (`a.end == b.start`) do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Returns the first pair of overlapping ranges, if any.
pub fn find_overlap(ranges: &[TimeRange]) -> Option<(TimeRange, TimeRange)> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by_key(|r| (r.start, r.end));
    sorted
        .windows(2)
        .find(|w| w[0].overlaps(&w[1]))
        .map(|w| (w[0], w[1]))
}

// =============================================================================
// Instants
// =============================================================================

/// Drops sub-millisecond precision.
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::milliseconds(1)).unwrap_or(at)
}

/// The instant a mutation is stamped with.
///
/// Strictly after the unit's last update so history intervals always have
/// positive length, even if the clock stalls or steps backwards.
///
/// ```rust
/// use chrono::{Duration, TimeZone, Utc};
/// use roost_core::temporal::mutation_instant;
///
/// let last = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
/// let stale_clock = last - Duration::seconds(5);
/// assert_eq!(mutation_instant(stale_clock, last), last + Duration::milliseconds(1));
/// ```
pub fn mutation_instant(now: DateTime<Utc>, last_updated: DateTime<Utc>) -> DateTime<Utc> {
    let now = truncate_to_millis(now);
    let floor = truncate_to_millis(last_updated) + Duration::milliseconds(1);
    now.max(floor)
}

// =============================================================================
// Price Timeline
// =============================================================================

/// Rebuilds the full price timeline of a unit from its history plus the
/// current row. The result has one interval per history entry and a final
/// open interval for the current price.
pub fn price_timeline(history: &[HistoryEntry], current: &Unit) -> Vec<PriceInterval> {
    let mut entries: Vec<&HistoryEntry> = history.iter().collect();
    entries.sort_by_key(|e| e.invalidated_at);

    let mut timeline: Vec<PriceInterval> = entries
        .into_iter()
        .map(|e| PriceInterval {
            price_cents: e.price_cents,
            valid_from: e.updated_at,
            valid_to: Some(e.invalidated_at),
        })
        .collect();

    timeline.push(PriceInterval {
        price_cents: current.price_cents,
        valid_from: current.updated_at,
        valid_to: None,
    });
    timeline
}

/// Whether each interval ends exactly where the next begins and only the
/// last one is open.
pub fn is_contiguous(timeline: &[PriceInterval]) -> bool {
    let Some((last, rest)) = timeline.split_last() else {
        return true;
    };
    if last.valid_to.is_some() {
        return false;
    }
    rest.iter().zip(timeline.iter().skip(1)).all(|(a, b)| {
        a.valid_to
            .map_or(false, |to| to == b.valid_from && a.valid_from < to)
    })
}

// =============================================================================
// Description Timeline
// =============================================================================

/// A broken descriptive-record timeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineViolation {
    #[error("{count} descriptive records are open-ended")]
    MultipleOpen { count: usize },

    #[error("descriptive record {id} ends before it starts")]
    Inverted { id: String },

    #[error("descriptive records {first} and {second} overlap")]
    Overlapping { first: String, second: String },
}

/// Checks that a unit's descriptive records never overlap and at most one
/// of them is open-ended.
pub fn check_description_timeline(records: &[Description]) -> Result<(), TimelineViolation> {
    let open = records.iter().filter(|d| d.is_current()).count();
    if open > 1 {
        return Err(TimelineViolation::MultipleOpen { count: open });
    }

    if let Some(bad) = records
        .iter()
        .find(|d| d.valid_to.map_or(false, |to| to < d.valid_from))
    {
        return Err(TimelineViolation::Inverted { id: bad.id.clone() });
    }

    let mut sorted: Vec<&Description> = records.iter().collect();
    sorted.sort_by_key(|d| d.valid_from);

    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let a_end_after_b_start = a.valid_to.map_or(true, |to| to > b.valid_from);
        if a_end_after_b_start {
            return Err(TimelineViolation::Overlapping {
                first: a.id.clone(),
                second: b.id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
