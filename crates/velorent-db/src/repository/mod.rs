//! # Repository Module
//!
//! Database repository implementations for Velorent.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                                 │
//! │       │  db.reservations().confirm(id)                                 │
//! │       ▼                                                                 │
//! │  ReservationRepository                                                 │
//! │  ├── BEGIN                                                             │
//! │  ├── load reservation, bike, holding reservations of the bike          │
//! │  ├── velorent_core::lifecycle::confirm(..)   (pure rules)              │
//! │  ├── UPDATE reservations / bikes                                       │
//! │  ├── INSERT INTO change_log                                            │
//! │  └── COMMIT  (any error → rollback on drop)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row structs (`*Row`, `#[derive(sqlx::FromRow)]`) mirror the tables and
//! convert into the `velorent-core` types.
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`] - Bike categories and their default rates
//! - [`BikeRepository`] - Bikes, availability actions and rental stats
//! - [`ReservationRepository`] - Reservations and their lifecycle
//! - [`SequenceRepository`] - Contract number counters
//! - [`ChangeLogRepository`] - Append-only change log
//! - [`ReportRepository`] - Rental and occupancy reports

pub mod bike;
pub mod category;
pub mod change_log;
pub mod report;
pub mod reservation;
pub mod sequence;

pub use bike::{BikeRepository, BikeStats, NewBike};
pub use category::{CategoryRepository, NewCategory};
pub use change_log::{ChangeLogEntry, ChangeLogRepository};
pub use report::{OccupancyRow, RentalReportRow, ReportRepository};
pub use reservation::{NewReservation, ReservationRepository};
pub use sequence::SequenceRepository;
