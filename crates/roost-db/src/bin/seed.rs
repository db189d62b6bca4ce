//! # Seed Data Generator
//!
//! Populates the database with units, price history and bookings for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 units (default) into $ROOST_DB_PATH or ./roost.db
//! cargo run -p roost-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p roost-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p roost-db --bin seed -- --db ./data/roost.db
//! ```
//!
//! ## Generated Data
//! Each unit has:
//! - Unique address: `{City}, {Street} {N}`
//! - Owner: one of a handful of owner ids
//! - Price: 45.00 - 244.00, then one or two price updates (history)
//! - Metadata: rooms, beds and a couple of free-form keys
//! - Up to three non-overlapping bookings

use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roost_core::{Money, NewBooking, NewUnit, UnitUpdate};
use roost_db::{ConsistencyEngine, EngineConfig, TransactionScope};

const CITIES: &[&str] = &["Budapest", "Debrecen", "Szeged", "Pécs", "Győr", "Wien"];

const STREETS: &[&str] = &[
    "Fő utca",
    "Kossuth Lajos utca",
    "Petőfi Sándor utca",
    "Rákóczi út",
    "Dózsa György út",
    "Andrássy út",
    "Váci utca",
    "Ringstraße",
];

const OWNERS: &[&str] = &["owner-anna", "owner-bence", "owner-csilla", "owner-dani"];

const RENTERS: &[&str] = &["renter-eva", "renter-feri", "renter-gabi"];

const VIEWS: &[&str] = &["street", "courtyard", "park", "river"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config = EngineConfig::load()?;
    let mut count: usize = 200;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Roost Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of units to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: $ROOST_DB_PATH or ./roost.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(path = %config.database_path.display(), count = count, "Seeding database");

    let engine = ConsistencyEngine::connect(&config).await?;

    let existing = {
        let mut scope = TransactionScope::begin(engine.database().pool()).await?;
        let n = scope.units().count().await?;
        scope.commit().await?;
        n
    };
    if existing > 0 {
        warn!(existing = existing, "Database already has units, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut units = 0;
    let mut updates = 0;
    let mut bookings = 0;

    for seed in 0..count {
        let created = match engine.create_unit(&generate_unit(seed)).await {
            Ok(created) => created,
            Err(e) => {
                warn!(seed = seed, error = %e, "Failed to create unit");
                continue;
            }
        };
        units += 1;

        let unit = created.unit;
        for step in 0..(1 + seed % 2) {
            let update = UnitUpdate {
                owner_id: unit.owner_id.clone(),
                price: Some(Money::from_cents(unit.price_cents + 500 * (step as i64 + 1))),
                info: None,
            };
            if engine.update_unit(&unit.id, &update).await.is_ok() {
                updates += 1;
            }
        }

        let today = Utc::now();
        for n in 0..(seed % 4) {
            let from = today + Duration::days((n * 10 + seed % 7) as i64);
            let req = NewBooking {
                renter_id: RENTERS[(seed + n) % RENTERS.len()].to_string(),
                unit_id: unit.id.clone(),
                time_from: from,
                time_to: from + Duration::days(2 + (seed % 5) as i64),
            };
            match engine.create_booking(&req).await {
                Ok(_) => bookings += 1,
                Err(e) => warn!(unit_id = %unit.id, error = %e, "Failed to create booking"),
            }
        }
    }

    let elapsed = start.elapsed();
    info!(
        units = units,
        price_updates = updates,
        bookings = bookings,
        elapsed_ms = elapsed.as_millis() as u64,
        "Seed complete"
    );

    engine.database().close().await;
    Ok(())
}

/// Generates one unit with realistic data.
fn generate_unit(seed: usize) -> NewUnit {
    let city = CITIES[seed % CITIES.len()];
    let street = STREETS[(seed / CITIES.len()) % STREETS.len()];
    let number = seed / (CITIES.len() * STREETS.len()) + 1;

    let mut info = BTreeMap::new();
    info.insert("rooms".to_string(), (1 + seed % 5).to_string());
    info.insert("beds".to_string(), (seed % 4).to_string());
    info.insert("view".to_string(), VIEWS[seed % VIEWS.len()].to_string());
    if seed % 3 == 0 {
        info.insert("balcony".to_string(), "yes".to_string());
    }

    NewUnit {
        owner_id: OWNERS[seed % OWNERS.len()].to_string(),
        address: format!("{}, {} {}", city, street, number),
        price: Money::from_cents(4_500 + ((seed * 37) % 200) as i64 * 100),
        info,
    }
}
