//! # velorent-core: Pure Rental Logic for Velorent
//!
//! Interval reservations of bikes with tiered pricing. Everything here is a
//! pure function over plain data; storage lives in `velorent-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Velorent Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ velorent-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ scheduler │  │  compute  │  │ lifecycle │  │   │
//! │  │   │   Bike    │  │ overlap   │  │ dispatch  │  │ confirm   │  │   │
//! │  │   │Reservation│  │ pricing   │  │ helpers   │  │ start/... │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   money • validation • sequence • clock • error                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOGGING                            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 velorent-db (Record Layer)                      │   │
//! │  │     SQLite schema, transactions, contract numbers, reports      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Category, Bike, Reservation and their enums
//! - [`money`] - Money in integer cents
//! - [`scheduler`] - Overlap validation, duration and pricing
//! - [`compute`] - Recompute dispatch and field mutation helpers
//! - [`lifecycle`] - Reservation state machine and bike availability
//! - [`sequence`] - Contract number formatting
//! - [`validation`] - Field rules
//! - [`clock`] - Injectable "now"
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use velorent_core::scheduler::{compute_duration, price_with_unit};
//! use velorent_core::{Money, RateUnit};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap();
//!
//! let quote = price_with_unit(Money::from_cents(2500), RateUnit::Daily, compute_duration(start, end));
//! assert_eq!(quote.quantity, 2.0);
//! assert_eq!(quote.subtotal.cents(), 5000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod compute;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod scheduler;
pub mod sequence;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::{LifecyclePolicy, TransitionOutcome};
pub use money::Money;
pub use scheduler::{Interval, PriceQuote, RentalDuration};
pub use sequence::ContractSequence;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Contract number of a reservation that has not been numbered yet.
pub const NEW_CONTRACT_PLACEHOLDER: &str = "New";

/// Maximum length of bike, category and customer names.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length of a frame serial number.
pub const MAX_SERIAL_LENGTH: usize = 50;
