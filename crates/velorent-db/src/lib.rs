//! # velorent-db: Record Layer for Velorent
//!
//! This crate stores categories, bikes and reservations in SQLite and wires
//! the pure rules of `velorent-core` to storage inside transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Velorent Data Flow                               │
//! │                                                                         │
//! │  Caller (desk app, API, seed binary)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   velorent-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ CategoryRepo   │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ BikeRepo       │   │ 001_init.sql │  │   │
//! │  │   │ Policy        │    │ ReservationRepo│   │ 002_reports  │  │   │
//! │  │   │ Clock         │    │ ReportRepo ... │   │              │  │   │
//! │  │   └───────────────┘    └───────┬────────┘   └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                                ▼                               │   │
//! │  │                 velorent-core (validate, price, lifecycle)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `velorent.toml` loading with env overrides
//! - [`pool`] - Connection pool creation and the [`Database`] handle
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use velorent_db::{Database, NewReservation, RentalConfig};
//!
//! let config = RentalConfig::load_or_default(None);
//! let db = Database::from_config(&config).await?;
//!
//! let draft = db.reservations()
//!     .create(NewReservation::new(&bike_id, "Ada", interval))
//!     .await?;
//! db.reservations().confirm(&draft.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::RentalConfig;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    BikeRepository, BikeStats, CategoryRepository, ChangeLogEntry, ChangeLogRepository,
    NewBike, NewCategory, NewReservation, OccupancyRow, RentalReportRow, ReportRepository,
    ReservationRepository, SequenceRepository,
};
