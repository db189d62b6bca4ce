//! # Unit Registry
//!
//! Creation, attribute updates and reads of units, with their price history
//! and descriptive timeline.
//!
//! ## Attribute Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_attributes(unit_id, owner, price?, info?)   one scope           │
//! │                                                                         │
//! │   0. validate price + info           ──► Validation (nothing written)  │
//! │   1. load unit                       ──► NotFound / Forbidden          │
//! │   2. at = max(now, updated_at + 1ms)                                    │
//! │   3. append history(old price, old updated_at, invalidated_at = at)    │
//! │   4. units.price = price ?? old, units.updated_at = at                 │
//! │   5. info given: close current description at `at`,                   │
//! │                  insert new description [at, ∞)                        │
//! │                                                                         │
//! │   any step fails ──► caller rolls the whole scope back                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method takes the caller's [`TransactionScope`]; the registry never
//! begins, commits or rolls back on its own.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DbError;
use crate::scope::TransactionScope;
use roost_core::temporal::{self, mutation_instant, truncate_to_millis};
use roost_core::validation::{validate_new_unit, validate_unit_update, UnitInfo};
use roost_core::{
    Description, EngineError, EngineResult, HistoryEntry, NewUnit, OwnedUnit, PriceInterval, Unit,
    UnitFilter, UnitUpdate, UnitWithDescription,
};

const UNIT: &str = "unit";

/// Unit operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitRegistry;

impl UnitRegistry {
    /// Creates a unit and, when metadata is given, its first descriptive
    /// record valid from `now` to +∞.
    ///
    /// ## Returns
    /// * `Ok(UnitWithDescription)` - Persisted unit
    /// * `Err(Validation)` - Bad address, price or reserved metadata key
    /// * `Err(AlreadyExists)` - Address taken
    pub async fn create(
        &self,
        scope: &mut TransactionScope,
        req: &NewUnit,
        now: DateTime<Utc>,
    ) -> EngineResult<UnitWithDescription> {
        let info = validate_new_unit(req)?;

        if scope.units().address_exists(&req.address).await? {
            return Err(EngineError::already_exists("address", &req.address));
        }

        let at = truncate_to_millis(now);
        let unit = Unit {
            id: Uuid::new_v4().to_string(),
            owner_id: req.owner_id.clone(),
            address: req.address.clone(),
            price_cents: req.price.cents(),
            updated_at: at,
        };

        debug!(id = %unit.id, owner_id = %unit.owner_id, "Creating unit");

        scope.units().insert(&unit).await.map_err(|e| match e {
            DbError::UniqueViolation { .. } => EngineError::already_exists("address", &req.address),
            other => other.into(),
        })?;

        let description = if req.info.is_empty() {
            None
        } else {
            Some(Self::open_description(scope, &unit.id, info, at).await?)
        };

        Ok(UnitWithDescription { unit, description })
    }

    /// Versioned attribute update; see the module diagram for the steps.
    ///
    /// ## Returns
    /// The unit as it is after the update, with its current description.
    pub async fn update_attributes(
        &self,
        scope: &mut TransactionScope,
        unit_id: &str,
        req: &UnitUpdate,
        now: DateTime<Utc>,
    ) -> EngineResult<UnitWithDescription> {
        let info = validate_unit_update(req)?;

        let current = scope
            .units()
            .find(unit_id)
            .await?
            .ok_or_else(|| EngineError::not_found(UNIT, unit_id))?;

        if current.owner_id != req.owner_id {
            return Err(EngineError::forbidden(&req.owner_id, UNIT, unit_id));
        }

        let at = mutation_instant(now, current.updated_at);

        scope
            .temporal()
            .append_history(&HistoryEntry {
                id: Uuid::new_v4().to_string(),
                unit_id: current.id.clone(),
                price_cents: current.price_cents,
                updated_at: current.updated_at,
                invalidated_at: at,
            })
            .await?;

        let price_cents = req.price.map_or(current.price_cents, |p| p.cents());
        let touched = scope.units().update_price(unit_id, price_cents, at).await?;
        if touched != 1 {
            return Err(EngineError::Internal(format!(
                "unit {} vanished during update",
                unit_id
            )));
        }

        let description = match info {
            Some(info) => {
                scope
                    .temporal()
                    .close_current_description(unit_id, at)
                    .await?;
                Some(Self::open_description(scope, unit_id, info, at).await?)
            }
            None => scope.temporal().current_description(unit_id).await?,
        };

        debug!(
            id = %unit_id,
            old_price_cents = current.price_cents,
            price_cents = price_cents,
            at = %at,
            "Unit attributes updated"
        );

        Ok(UnitWithDescription {
            unit: Unit {
                price_cents,
                updated_at: at,
                ..current
            },
            description,
        })
    }

    /// A unit with its currently valid description.
    pub async fn get(
        &self,
        scope: &mut TransactionScope,
        unit_id: &str,
    ) -> EngineResult<UnitWithDescription> {
        let unit = self.require(scope, unit_id).await?;
        let description = scope.temporal().current_description(unit_id).await?;
        Ok(UnitWithDescription { unit, description })
    }

    /// Current units matching `filter`.
    pub async fn list(
        &self,
        scope: &mut TransactionScope,
        filter: &UnitFilter,
    ) -> EngineResult<Vec<Unit>> {
        Ok(scope.units().list(filter).await?)
    }

    /// An owner's units, each with its current description and the bookings
    /// that have not ended before `now`.
    pub async fn list_by_owner(
        &self,
        scope: &mut TransactionScope,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<OwnedUnit>> {
        let units = scope.units().list_by_owner(owner_id).await?;
        // time_to >= now, at millisecond precision
        let cutoff = truncate_to_millis(now) - chrono::Duration::milliseconds(1);

        let mut owned = Vec::with_capacity(units.len());
        for unit in units {
            let description = scope.temporal().current_description(&unit.id).await?;
            let bookings = scope.bookings().list_ending_after(&unit.id, cutoff).await?;
            owned.push(OwnedUnit {
                unit,
                description,
                bookings,
            });
        }
        Ok(owned)
    }

    /// History entries of a unit ordered by `invalidated_at`.
    pub async fn history(
        &self,
        scope: &mut TransactionScope,
        unit_id: &str,
    ) -> EngineResult<Vec<HistoryEntry>> {
        self.require(scope, unit_id).await?;
        Ok(scope.temporal().history(unit_id).await?)
    }

    /// Contiguous price intervals from history plus the current row.
    ///
    /// A gap or overlap in the stored history is reported as `Internal`.
    pub async fn price_timeline(
        &self,
        scope: &mut TransactionScope,
        unit_id: &str,
    ) -> EngineResult<Vec<PriceInterval>> {
        let unit = self.require(scope, unit_id).await?;
        let history = scope.temporal().history(unit_id).await?;
        let timeline = temporal::price_timeline(&history, &unit);

        if !temporal::is_contiguous(&timeline) {
            warn!(unit_id = %unit_id, intervals = timeline.len(), "Price history is not contiguous");
            return Err(EngineError::Internal(format!(
                "price history of unit {} is not contiguous",
                unit_id
            )));
        }
        Ok(timeline)
    }

    /// Every descriptive record of a unit ordered by `valid_from`.
    ///
    /// Overlapping or multiply-open records are reported as `Internal`.
    pub async fn description_history(
        &self,
        scope: &mut TransactionScope,
        unit_id: &str,
    ) -> EngineResult<Vec<Description>> {
        self.require(scope, unit_id).await?;
        let records = scope.temporal().descriptions(unit_id).await?;

        if let Err(violation) = temporal::check_description_timeline(&records) {
            warn!(unit_id = %unit_id, error = %violation, "Description timeline is broken");
            return Err(EngineError::Internal(format!(
                "description timeline of unit {}: {}",
                unit_id, violation
            )));
        }
        Ok(records)
    }

    async fn require(&self, scope: &mut TransactionScope, unit_id: &str) -> EngineResult<Unit> {
        scope
            .units()
            .find(unit_id)
            .await?
            .ok_or_else(|| EngineError::not_found(UNIT, unit_id))
    }

    async fn open_description(
        scope: &mut TransactionScope,
        unit_id: &str,
        info: UnitInfo,
        at: DateTime<Utc>,
    ) -> EngineResult<Description> {
        let description = Description {
            id: Uuid::new_v4().to_string(),
            unit_id: unit_id.to_string(),
            valid_from: at,
            valid_to: None,
            rooms: info.rooms,
            beds: info.beds,
            attributes: info.attributes,
        };
        scope.temporal().insert_description(&description).await?;
        Ok(description)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, TimeZone};
    use roost_core::{ErrorKind, Money};
    use std::collections::BTreeMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn info(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn new_unit(meta: &[(&str, &str)]) -> NewUnit {
        NewUnit {
            owner_id: "owner-1".to_string(),
            address: "Budapest, Fő utca 1".to_string(),
            price: Money::from_cents(12_050),
            info: info(meta),
        }
    }

    async fn setup() -> (Database, TransactionScope) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = TransactionScope::begin(db.pool()).await.unwrap();
        (db, scope)
    }

    #[tokio::test]
    async fn test_create_with_metadata() {
        let (_db, mut scope) = setup().await;
        let registry = UnitRegistry;

        let created = registry
            .create(&mut scope, &new_unit(&[("rooms", "3"), ("wifi", "yes")]), t0())
            .await
            .unwrap();

        let description = created.description.unwrap();
        assert_eq!(description.rooms, Some(3));
        assert_eq!(description.valid_from, t0());
        assert!(description.is_current());
        assert_eq!(created.unit.price().to_string(), "120.50");
    }

    #[tokio::test]
    async fn test_create_without_metadata_has_no_description() {
        let (_db, mut scope) = setup().await;
        let created = UnitRegistry
            .create(&mut scope, &new_unit(&[]), t0())
            .await
            .unwrap();
        assert!(created.description.is_none());

        let fetched = UnitRegistry.get(&mut scope, &created.unit.id).await.unwrap();
        assert_eq!(fetched.unit, created.unit);
    }

    #[tokio::test]
    async fn test_duplicate_address() {
        let (_db, mut scope) = setup().await;
        UnitRegistry.create(&mut scope, &new_unit(&[]), t0()).await.unwrap();

        let err = UnitRegistry
            .create(&mut scope, &new_unit(&[]), t0())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_update_closes_and_opens_description() {
        let (_db, mut scope) = setup().await;
        let created = UnitRegistry
            .create(&mut scope, &new_unit(&[("rooms", "2")]), t0())
            .await
            .unwrap();
        let id = created.unit.id.clone();
        let t1 = t0() + Duration::days(3);

        let updated = UnitRegistry
            .update_attributes(
                &mut scope,
                &id,
                &UnitUpdate {
                    owner_id: "owner-1".to_string(),
                    price: Some(Money::from_cents(15_000)),
                    info: Some(info(&[("rooms", "4"), ("beds", "2")])),
                },
                t1,
            )
            .await
            .unwrap();

        assert_eq!(updated.unit.price_cents, 15_000);
        assert_eq!(updated.unit.updated_at, t1);
        assert_eq!(updated.description.as_ref().unwrap().rooms, Some(4));

        let records = UnitRegistry.description_history(&mut scope, &id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|d| d.is_current()).count(), 1);
        assert_eq!(records[0].valid_to, Some(t1));
        assert_eq!(records[1].valid_from, t1);

        let history = UnitRegistry.history(&mut scope, &id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price_cents, 12_050);
        assert_eq!(history[0].invalidated_at, t1);
    }

    #[tokio::test]
    async fn test_update_without_prior_description_opens_first() {
        let (_db, mut scope) = setup().await;
        let created = UnitRegistry.create(&mut scope, &new_unit(&[]), t0()).await.unwrap();

        let updated = UnitRegistry
            .update_attributes(
                &mut scope,
                &created.unit.id,
                &UnitUpdate {
                    owner_id: "owner-1".to_string(),
                    price: None,
                    info: Some(info(&[("beds", "0")])),
                },
                t0() + Duration::hours(1),
            )
            .await
            .unwrap();

        assert_eq!(updated.unit.price_cents, 12_050);
        assert_eq!(updated.description.unwrap().beds, Some(0));
    }

    #[tokio::test]
    async fn test_update_with_stale_clock_stays_monotonic() {
        let (_db, mut scope) = setup().await;
        let created = UnitRegistry.create(&mut scope, &new_unit(&[]), t0()).await.unwrap();

        let updated = UnitRegistry
            .update_attributes(
                &mut scope,
                &created.unit.id,
                &UnitUpdate {
                    owner_id: "owner-1".to_string(),
                    price: Some(Money::from_cents(100)),
                    info: None,
                },
                t0() - Duration::minutes(5),
            )
            .await
            .unwrap();

        assert_eq!(updated.unit.updated_at, t0() + Duration::milliseconds(1));
    }

    #[tokio::test]
    async fn test_update_errors() {
        let (_db, mut scope) = setup().await;
        let created = UnitRegistry.create(&mut scope, &new_unit(&[]), t0()).await.unwrap();

        let stranger = UnitUpdate {
            owner_id: "owner-2".to_string(),
            price: Some(Money::from_cents(1)),
            info: None,
        };
        let err = UnitRegistry
            .update_attributes(&mut scope, &created.unit.id, &stranger, t0())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = UnitRegistry
            .update_attributes(&mut scope, "missing", &stranger, t0())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!(UnitRegistry
            .history(&mut scope, &created.unit.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_by_rooms_uses_current_description() {
        let (_db, mut scope) = setup().await;
        let created = UnitRegistry
            .create(&mut scope, &new_unit(&[("rooms", "2")]), t0())
            .await
            .unwrap();
        UnitRegistry
            .update_attributes(
                &mut scope,
                &created.unit.id,
                &UnitUpdate {
                    owner_id: "owner-1".to_string(),
                    price: None,
                    info: Some(info(&[("rooms", "5")])),
                },
                t0() + Duration::days(1),
            )
            .await
            .unwrap();

        let two = UnitFilter {
            rooms: Some(2),
            ..UnitFilter::default()
        };
        let five = UnitFilter {
            rooms: Some(5),
            ..UnitFilter::default()
        };
        assert!(UnitRegistry.list(&mut scope, &two).await.unwrap().is_empty());
        assert_eq!(UnitRegistry.list(&mut scope, &five).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gap_in_price_history_is_internal() {
        let (_db, mut scope) = setup().await;
        let created = UnitRegistry.create(&mut scope, &new_unit(&[]), t0()).await.unwrap();
        let id = created.unit.id.clone();

        // Ends a day before the current row starts
        scope
            .temporal()
            .append_history(&HistoryEntry {
                id: Uuid::new_v4().to_string(),
                unit_id: id.clone(),
                price_cents: 9_900,
                updated_at: t0() - Duration::days(2),
                invalidated_at: t0() - Duration::days(1),
            })
            .await
            .unwrap();

        let err = UnitRegistry
            .price_timeline(&mut scope, &id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_overlapping_descriptions_are_internal() {
        let (_db, mut scope) = setup().await;
        let created = UnitRegistry
            .create(&mut scope, &new_unit(&[("rooms", "2")]), t0())
            .await
            .unwrap();
        let id = created.unit.id.clone();

        scope
            .temporal()
            .insert_description(&Description {
                id: Uuid::new_v4().to_string(),
                unit_id: id.clone(),
                valid_from: t0() - Duration::days(1),
                valid_to: Some(t0() + Duration::days(1)),
                rooms: Some(1),
                beds: None,
                attributes: BTreeMap::new(),
            })
            .await
            .unwrap();

        let err = UnitRegistry
            .description_history(&mut scope, &id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
