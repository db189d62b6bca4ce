//! # Domain Types
//!
//! Core domain types used throughout Roost.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 One aggregate, keyed by unit id                         │
//! │                                                                         │
//! │                      ┌─────────────────┐                               │
//! │                      │      Unit       │  current row, mutated         │
//! │                      │  id, owner_id   │  in place, never deleted      │
//! │                      │  address (uniq) │                               │
//! │                      │  price, updated │                               │
//! │                      └────────┬────────┘                               │
//! │            ┌──────────────────┼──────────────────┐                     │
//! │            ▼                  ▼                  ▼                     │
//! │  ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐          │
//! │  │  HistoryEntry   │ │   Description   │ │     Booking     │          │
//! │  │  append-only    │ │  [from, to)     │ │  [from, to)     │          │
//! │  │  price snapshot │ │  to = None ⇒ ∞  │ │  never overlap  │          │
//! │  │  invalidated_at │ │  rooms, beds    │ │  per unit       │          │
//! │  └─────────────────┘ └─────────────────┘ └─────────────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identities are opaque strings (UUID v4 when the engine generates them).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::money::Money;
use crate::temporal::TimeRange;
use crate::{INFO_BEDS_KEY, INFO_ROOMS_KEY};

// =============================================================================
// Unit
// =============================================================================

/// Current state of a leasable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Unit {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Identity of the owning party.
    pub owner_id: String,

    /// Full address, unique across units. The first comma-delimited
    /// segment is the city.
    pub address: String,

    /// Current price in cents.
    pub price_cents: i64,

    /// Instant of the last mutation (creation or attribute update).
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the short form carried alongside bookings.
    pub fn summary(&self) -> UnitSummary {
        UnitSummary {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            address: self.address.clone(),
            price_cents: self.price_cents,
        }
    }
}

/// First comma-delimited segment of an address.
///
/// ```rust
/// use roost_core::types::city_of;
///
/// assert_eq!(city_of("Budapest, Andrássy út 12"), "Budapest");
/// assert_eq!(city_of("Vienna"), "Vienna");
/// ```
pub fn city_of(address: &str) -> &str {
    address.split(',').next().unwrap_or(address).trim()
}

/// Unit fields shown next to a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitSummary {
    pub id: String,
    pub owner_id: String,
    pub address: String,
    pub price_cents: i64,
}

// =============================================================================
// History Entry
// =============================================================================

/// Immutable snapshot of a unit's price/update state before a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct HistoryEntry {
    pub id: String,
    pub unit_id: String,
    /// Price as it was before the mutation.
    pub price_cents: i64,
    /// `Unit::updated_at` as it was before the mutation.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Instant the snapshot stopped being current.
    #[ts(as = "String")]
    pub invalidated_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Returns the snapshotted price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Description
// =============================================================================

/// Bitemporal descriptive record: valid over `[valid_from, valid_to)`.
///
/// `valid_to == None` means +∞, i.e. the record is the unit's current
/// description. Payload is never edited; a change closes this record and
/// opens a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Description {
    pub id: String,
    pub unit_id: String,
    #[ts(as = "String")]
    pub valid_from: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub valid_to: Option<DateTime<Utc>>,
    /// Parsed from the reserved `rooms` key; always > 0 when present.
    pub rooms: Option<i64>,
    /// Parsed from the reserved `beds` key; always >= 0 when present.
    pub beds: Option<i64>,
    /// Every non-reserved key, stored verbatim.
    pub attributes: BTreeMap<String, String>,
}

impl Description {
    /// Whether this is the open-ended (current) record.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Free-form metadata with the reserved keys folded back in, the shape
    /// clients originally submitted.
    pub fn info(&self) -> BTreeMap<String, String> {
        let mut info = self.attributes.clone();
        if let Some(rooms) = self.rooms {
            info.insert(INFO_ROOMS_KEY.to_string(), rooms.to_string());
        }
        if let Some(beds) = self.beds {
            info.insert(INFO_BEDS_KEY.to_string(), beds.to_string());
        }
        info
    }
}

// =============================================================================
// Booking
// =============================================================================

/// A reservation of a unit over the half-open range `[time_from, time_to)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Booking {
    pub id: String,
    pub renter_id: String,
    pub unit_id: String,
    #[ts(as = "String")]
    pub time_from: DateTime<Utc>,
    #[ts(as = "String")]
    pub time_to: DateTime<Utc>,
}

impl Booking {
    /// The reserved range.
    #[inline]
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.time_from, self.time_to)
    }
}

/// A booking together with the unit it reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookingWithUnit {
    pub booking: Booking,
    pub unit: UnitSummary,
}

// =============================================================================
// Read Models
// =============================================================================

/// A unit with its currently valid description, if it ever had one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitWithDescription {
    pub unit: Unit,
    pub description: Option<Description>,
}

/// An owner's unit with its current description and active bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OwnedUnit {
    pub unit: Unit,
    pub description: Option<Description>,
    pub bookings: Vec<Booking>,
}

/// One step of a unit's reconstructed price timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceInterval {
    pub price_cents: i64,
    #[ts(as = "String")]
    pub valid_from: DateTime<Utc>,
    /// `None` for the interval of the current row.
    #[ts(as = "Option<String>")]
    pub valid_to: Option<DateTime<Utc>>,
}

// =============================================================================
// Requests
// =============================================================================

/// Input of unit creation, already authenticated and structurally parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewUnit {
    pub owner_id: String,
    pub address: String,
    pub price: Money,
    /// Free-form metadata; `rooms` and `beds` are reserved keys.
    #[serde(default)]
    pub info: BTreeMap<String, String>,
}

/// Input of an attribute update. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitUpdate {
    /// Identity of the caller; must match the unit's owner.
    pub owner_id: String,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub info: Option<BTreeMap<String, String>>,
}

/// Input of booking creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBooking {
    pub renter_id: String,
    pub unit_id: String,
    #[ts(as = "String")]
    pub time_from: DateTime<Utc>,
    #[ts(as = "String")]
    pub time_to: DateTime<Utc>,
}

/// Read-only filter over current units. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitFilter {
    /// Case-insensitive substring of the address's city segment.
    pub city: Option<String>,
    /// Exact room count of the currently valid description.
    pub rooms: Option<i64>,
    /// Exact bed count of the currently valid description.
    pub beds: Option<i64>,
}

impl UnitFilter {
    /// Whether the filter needs the current description joined in.
    pub fn needs_description(&self) -> bool {
        self.rooms.is_some() || self.beds.is_some()
    }

    /// Applies the city criterion to an address.
    pub fn matches_city(&self, address: &str) -> bool {
        match &self.city {
            None => true,
            Some(city) => city_of(address)
                .to_lowercase()
                .contains(&city.trim().to_lowercase()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
