//! # Seed Data Generator
//!
//! Populates the database with a small rental fleet for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named in velorent.toml (or ./velorent.db)
//! cargo run -p velorent-db --bin seed
//!
//! # Specify database path
//! cargo run -p velorent-db --bin seed -- --db ./data/velorent.db
//!
//! # Use an explicit config file
//! cargo run -p velorent-db --bin seed -- --config ./velorent.toml
//! ```
//!
//! ## Generated Data
//! - Categories: City, Mountain, Road, Electric, each with its own rates
//! - A few bikes per category (zero rates inherit the category's)
//! - One confirmed weekly reservation starting tomorrow
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - Default: INFO level

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use velorent_core::{BikeCondition, FrameSize, Interval, Money, RateTable, RateUnit};
use velorent_db::{Database, NewBike, NewCategory, NewReservation, RentalConfig};

/// (category, sequence, hourly, daily, weekly, monthly) in euros
const CATEGORIES: &[(&str, i64, i64, i64, i64, i64)] = &[
    ("City", 10, 5, 25, 100, 300),
    ("Mountain", 20, 8, 40, 160, 480),
    ("Road", 30, 7, 35, 140, 420),
    ("Electric", 40, 12, 60, 240, 720),
];

/// (name, serial, brand, model, frame size, color)
const BIKES: &[(&str, &[(&str, &str, &str, &str, FrameSize, &str)])] = &[
    (
        "City",
        &[
            ("C-01", "WCT-0001", "Gazelle", "Esprit", FrameSize::M, "black"),
            ("C-02", "WCT-0002", "Gazelle", "Esprit", FrameSize::L, "blue"),
            ("C-03", "WCT-0003", "Batavus", "Diva", FrameSize::S, "red"),
        ],
    ),
    (
        "Mountain",
        &[
            ("M-01", "WMT-0001", "Trek", "Marlin 7", FrameSize::M, "green"),
            ("M-02", "WMT-0002", "Cube", "Aim Pro", FrameSize::L, "grey"),
        ],
    ),
    (
        "Road",
        &[("R-01", "WRD-0001", "Specialized", "Allez", FrameSize::M, "white")],
    ),
    (
        "Electric",
        &[
            ("E-01", "WEL-0001", "Riese & Müller", "Nevo", FrameSize::M, "black"),
            ("E-02", "WEL-0002", "Cube", "Kathmandu Hybrid", FrameSize::Xl, "grey"),
        ],
    ),
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,velorent_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn euros(amount: i64) -> Money {
    Money::from_major_minor(amount, 0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Velorent Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (overrides the config)");
                println!("  -c, --config <PATH>   Config file (default: platform velorent.toml)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing();

    let mut config = RentalConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("🌱 Velorent Seed Data Generator");
    println!("===============================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::from_config(&config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.categories().list_active().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} categories", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating fleet...");

    let mut first_bike_id = None;
    let mut bike_count = 0;

    for &(name, sequence, hourly, daily, weekly, monthly) in CATEGORIES {
        let rates = RateTable::new(euros(hourly), euros(daily), euros(weekly), euros(monthly));
        let category = db
            .categories()
            .create(NewCategory::named(name).sequence(sequence).rates(rates))
            .await?;
        println!("  {} ({}/day)", category.name, category.rates.rate(RateUnit::Daily));

        let bikes = BIKES
            .iter()
            .find(|(category_name, _)| *category_name == name)
            .map(|(_, bikes)| *bikes)
            .unwrap_or_default();

        for &(bike_name, serial, brand, model, frame_size, color) in bikes {
            let input = NewBike {
                brand: Some(brand.to_string()),
                model: Some(model.to_string()),
                year: Some(2023),
                frame_size: Some(frame_size),
                color: Some(color.to_string()),
                ..NewBike::named(bike_name)
                    .category(&category.id)
                    .serial_number(serial)
                    .condition(BikeCondition::Good)
            };

            match db.bikes().create(input).await {
                Ok(bike) => {
                    bike_count += 1;
                    first_bike_id.get_or_insert(bike.id);
                }
                Err(e) => eprintln!("Failed to create {}: {}", bike_name, e),
            }
        }
    }

    println!("✓ Created {} categories and {} bikes", CATEGORIES.len(), bike_count);

    if let Some(bike_id) = first_bike_id {
        let start = Utc::now() + Duration::days(1);
        let interval = Interval::new(start, start + Duration::days(7));

        let draft = db
            .reservations()
            .create(
                NewReservation::new(&bike_id, "Demo Customer", interval)
                    .rate_unit(RateUnit::Weekly)
                    .customer_email("demo@example.com"),
            )
            .await?;
        db.reservations().confirm(&draft.id).await?;

        println!(
            "✓ Confirmed {} ({} x {} = {})",
            draft.contract_number,
            draft.quantity,
            draft.unit_price(),
            draft.subtotal()
        );
    }

    println!();
    println!("Done! Run reports with db.reports().occupancy()");

    Ok(())
}
