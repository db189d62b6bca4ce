//! # Validation Module
//!
//! Request validation for the consistency engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API layer                                                    │
//! │  ├── Authentication, JSON shape                                        │
//! │  └── Decimal price parsing (Money::from_str)                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, before any write                                │
//! │  ├── Reserved metadata keys (rooms, beds)                              │
//! │  ├── Address, price, booking range                                     │
//! │  └── Every failure collected, not just the first                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK / UNIQUE / FOREIGN KEY constraints                          │
//! │  └── Overlap and append-only triggers                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use roost_core::validation::parse_unit_info;
//! use std::collections::BTreeMap;
//!
//! let mut info = BTreeMap::new();
//! info.insert("rooms".to_string(), "3".to_string());
//! info.insert("view".to_string(), "sea".to_string());
//!
//! let parsed = parse_unit_info(&info).unwrap();
//! assert_eq!(parsed.rooms, Some(3));
//! assert_eq!(parsed.attributes.len(), 1);
//! ```

use std::collections::BTreeMap;

use crate::error::ValidationErrors;
use crate::money::Money;
use crate::temporal::TimeRange;
use crate::types::{NewBooking, NewUnit, UnitFilter, UnitUpdate};
use crate::{INFO_BEDS_KEY, INFO_ROOMS_KEY, MAX_ADDRESS_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationErrors>;

const MSG_REQUIRED: &str = "is required";
const MSG_NOT_INTEGER: &str = "must be an integer";
const MSG_NOT_POSITIVE: &str = "must be > 0";
const MSG_NEGATIVE: &str = "must be >= 0";

// =============================================================================
// Unit Metadata
// =============================================================================

/// Free-form unit metadata split into typed reserved keys and the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitInfo {
    pub rooms: Option<i64>,
    pub beds: Option<i64>,
    /// Every non-reserved key, verbatim.
    pub attributes: BTreeMap<String, String>,
}

/// Parses unit metadata.
///
/// ## Rules
/// - `rooms`, if present, must be an integer > 0
/// - `beds`, if present, must be an integer >= 0
/// - Any other key is kept as-is
///
/// Both reserved keys are checked before returning, so a request with two
/// bad keys reports two field errors.
pub fn parse_unit_info(info: &BTreeMap<String, String>) -> ValidationResult<UnitInfo> {
    let mut errors = ValidationErrors::new();
    let mut parsed = UnitInfo::default();

    for (key, value) in info {
        match key.as_str() {
            INFO_ROOMS_KEY => parsed.rooms = reserved_int(key, value, 1, MSG_NOT_POSITIVE, &mut errors),
            INFO_BEDS_KEY => parsed.beds = reserved_int(key, value, 0, MSG_NEGATIVE, &mut errors),
            _ => {
                parsed.attributes.insert(key.clone(), value.clone());
            }
        }
    }

    errors.into_result(parsed)
}

fn reserved_int(
    key: &str,
    value: &str,
    min: i64,
    below_min: &str,
    errors: &mut ValidationErrors,
) -> Option<i64> {
    let field = format!("info.{}", key);
    match value.parse::<i64>() {
        Err(_) => {
            errors.add(field, MSG_NOT_INTEGER);
            None
        }
        Ok(n) if n < min => {
            errors.add(field, below_min);
            None
        }
        Ok(n) => Some(n),
    }
}

// =============================================================================
// Field Validators
// =============================================================================

/// Validates an opaque identity (owner, renter, unit).
pub fn validate_id(field: &str, value: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(field, MSG_REQUIRED);
    }
}

/// Validates a unit address.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_ADDRESS_LEN`] characters
pub fn validate_address(address: &str, errors: &mut ValidationErrors) {
    if address.trim().is_empty() {
        errors.add("address", MSG_REQUIRED);
    } else if address.chars().count() > MAX_ADDRESS_LEN {
        errors.add(
            "address",
            format!("must be at most {} characters", MAX_ADDRESS_LEN),
        );
    }
}

/// Validates a unit price. Zero is not a price.
///
/// ```rust
/// use roost_core::money::Money;
/// use roost_core::validation::validate_price;
/// use roost_core::ValidationErrors;
///
/// let mut errors = ValidationErrors::new();
/// validate_price(Money::from_cents(0), &mut errors);
/// assert!(errors.contains("price"));
/// ```
pub fn validate_price(price: Money, errors: &mut ValidationErrors) {
    if !price.is_positive() {
        errors.add("price", MSG_NOT_POSITIVE);
    }
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a unit creation request and returns its parsed metadata.
pub fn validate_new_unit(req: &NewUnit) -> ValidationResult<UnitInfo> {
    let mut errors = ValidationErrors::new();
    validate_id("owner_id", &req.owner_id, &mut errors);
    validate_address(&req.address, &mut errors);
    validate_price(req.price, &mut errors);

    match parse_unit_info(&req.info) {
        Ok(info) => errors.into_result(info),
        Err(info_errors) => {
            errors.merge(info_errors);
            Err(errors)
        }
    }
}

/// Validates an attribute update.
///
/// Returns the parsed metadata when the update carries a non-empty map,
/// `None` when descriptive state is to be left alone.
pub fn validate_unit_update(req: &UnitUpdate) -> ValidationResult<Option<UnitInfo>> {
    let mut errors = ValidationErrors::new();
    validate_id("owner_id", &req.owner_id, &mut errors);
    if let Some(price) = req.price {
        validate_price(price, &mut errors);
    }

    let info = match req.info.as_ref().filter(|m| !m.is_empty()) {
        None => None,
        Some(map) => match parse_unit_info(map) {
            Ok(info) => Some(info),
            Err(info_errors) => {
                errors.merge(info_errors);
                None
            }
        },
    };

    errors.into_result(info)
}

/// Validates a booking request and returns its range.
pub fn validate_new_booking(req: &NewBooking) -> ValidationResult<TimeRange> {
    let mut errors = ValidationErrors::new();
    validate_id("renter_id", &req.renter_id, &mut errors);
    validate_id("unit_id", &req.unit_id, &mut errors);

    let range = TimeRange::try_new(req.time_from, req.time_to);
    if range.is_none() {
        errors.add("time_to", "must be after time_from");
    }

    match range {
        Some(range) => errors.into_result(range),
        None => Err(errors),
    }
}

impl UnitFilter {
    /// Builds a filter from raw query parameters.
    ///
    /// Allowed keys are `city`, `rooms` and `beds`. Blank values count as
    /// absent; `rooms` and `beds` must be integers; any other key is a
    /// validation failure.
    ///
    /// ```rust
    /// use roost_core::UnitFilter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut query = BTreeMap::new();
    /// query.insert("city".to_string(), "buda".to_string());
    /// query.insert("rooms".to_string(), "2".to_string());
    ///
    /// let filter = UnitFilter::from_query(&query).unwrap();
    /// assert_eq!(filter.rooms, Some(2));
    /// ```
    pub fn from_query(query: &BTreeMap<String, String>) -> ValidationResult<UnitFilter> {
        let mut errors = ValidationErrors::new();
        let mut filter = UnitFilter::default();

        for (key, value) in query {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "city" => filter.city = Some(value.to_string()),
                "rooms" => filter.rooms = query_int(key, value, &mut errors),
                "beds" => filter.beds = query_int(key, value, &mut errors),
                _ => errors.add(key.clone(), "is not a supported filter"),
            }
        }

        errors.into_result(filter)
    }
}

fn query_int(key: &str, value: &str, errors: &mut ValidationErrors) -> Option<i64> {
    match value.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            errors.add(key, MSG_NOT_INTEGER);
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn info(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn new_unit(address: &str, cents: i64, meta: &[(&str, &str)]) -> NewUnit {
        NewUnit {
            owner_id: "owner-1".to_string(),
            address: address.to_string(),
            price: Money::from_cents(cents),
            info: info(meta),
        }
    }

    #[test]
    fn test_reserved_keys_parsed() {
        let parsed = parse_unit_info(&info(&[("rooms", "2"), ("beds", "0"), ("wifi", "yes")])).unwrap();
        assert_eq!(parsed.rooms, Some(2));
        assert_eq!(parsed.beds, Some(0));
        assert_eq!(parsed.attributes, info(&[("wifi", "yes")]));
    }

    #[test]
    fn test_reserved_key_errors_are_aggregated() {
        let err = parse_unit_info(&info(&[("rooms", "abc"), ("beds", "-1")])).unwrap_err();
        assert_eq!(err.fields().len(), 2);
        assert!(err
            .fields()
            .iter()
            .any(|f| f.field == "info.rooms" && f.message == "must be an integer"));
        assert!(err
            .fields()
            .iter()
            .any(|f| f.field == "info.beds" && f.message == "must be >= 0"));
    }

    #[test]
    fn test_rooms_must_be_positive() {
        let err = parse_unit_info(&info(&[("rooms", "0")])).unwrap_err();
        assert_eq!(err.fields()[0].message, "must be > 0");
    }

    #[test]
    fn test_validate_new_unit() {
        assert!(validate_new_unit(&new_unit("Budapest, Fő utca 1", 12050, &[])).is_ok());

        let err = validate_new_unit(&new_unit("  ", 0, &[("rooms", "x")])).unwrap_err();
        assert!(err.contains("address"));
        assert!(err.contains("price"));
        assert!(err.contains("info.rooms"));

        let long = "A".repeat(MAX_ADDRESS_LEN + 1);
        assert!(validate_new_unit(&new_unit(&long, 100, &[]))
            .unwrap_err()
            .contains("address"));
    }

    #[test]
    fn test_validate_unit_update() {
        let update = UnitUpdate {
            owner_id: "owner-1".to_string(),
            price: Some(Money::from_cents(-5)),
            info: Some(info(&[("beds", "two")])),
        };
        let err = validate_unit_update(&update).unwrap_err();
        assert!(err.contains("price"));
        assert!(err.contains("info.beds"));

        let empty_info = UnitUpdate {
            owner_id: "owner-1".to_string(),
            price: None,
            info: Some(BTreeMap::new()),
        };
        assert_eq!(validate_unit_update(&empty_info).unwrap(), None);
    }

    #[test]
    fn test_validate_new_booking() {
        let from = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

        let ok = NewBooking {
            renter_id: "renter-1".into(),
            unit_id: "u-1".into(),
            time_from: from,
            time_to: to,
        };
        assert_eq!(validate_new_booking(&ok).unwrap(), TimeRange::new(from, to));

        let inverted = NewBooking {
            time_from: to,
            time_to: from,
            renter_id: String::new(),
            ..ok
        };
        let err = validate_new_booking(&inverted).unwrap_err();
        assert!(err.contains("time_to"));
        assert!(err.contains("renter_id"));
    }

    #[test]
    fn test_unit_filter_from_query() {
        let filter =
            UnitFilter::from_query(&info(&[("city", "buda"), ("rooms", "3"), ("beds", "")]))
                .unwrap();
        assert_eq!(filter.city.as_deref(), Some("buda"));
        assert_eq!(filter.rooms, Some(3));
        assert_eq!(filter.beds, None);

        let err = UnitFilter::from_query(&info(&[("rooms", "three"), ("beds", "x")])).unwrap_err();
        assert_eq!(err.fields().len(), 2);

        let err = UnitFilter::from_query(&info(&[("pool", "yes")])).unwrap_err();
        assert!(err.contains("pool"));
    }
}
