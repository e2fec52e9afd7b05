//! # Domain Types
//!
//! Core domain types used throughout Velorent.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    Category     │   │      Bike       │   │    Reservation      │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  id (UUID)      │◄──│  category_id    │◄──│  resource_id        │   │
//! │  │  name (unique)  │   │  serial_number  │   │  contract_number    │   │
//! │  │  rates          │   │  state          │   │  start / end        │   │
//! │  └─────────────────┘   │  rates          │   │  rate_unit          │   │
//! │                        └─────────────────┘   │  state              │   │
//! │                                              └─────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    RateUnit     │   │  ResourceState  │   │  ReservationState   │   │
//! │  │  Hourly         │   │  Available      │   │  Draft              │   │
//! │  │  Daily          │   │  Reserved       │   │  Confirmed          │   │
//! │  │  Weekly         │   │  Rented         │   │  Ongoing            │   │
//! │  │  Monthly        │   │  Maintenance    │   │  Done               │   │
//! │  └─────────────────┘   │  Retired        │   │  Cancelled          │   │
//! │                        └─────────────────┘   └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (name, serial_number, contract_number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;
use crate::scheduler::Interval;

// =============================================================================
// Rate Unit
// =============================================================================

/// Billing granularity selected for a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl RateUnit {
    /// All units, in increasing bucket size.
    pub const ALL: [RateUnit; 4] = [
        RateUnit::Hourly,
        RateUnit::Daily,
        RateUnit::Weekly,
        RateUnit::Monthly,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            RateUnit::Hourly => "hourly",
            RateUnit::Daily => "daily",
            RateUnit::Weekly => "weekly",
            RateUnit::Monthly => "monthly",
        }
    }
}

impl Default for RateUnit {
    fn default() -> Self {
        RateUnit::Daily
    }
}

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hourly" | "hour" => Ok(RateUnit::Hourly),
            "daily" | "day" => Ok(RateUnit::Daily),
            "weekly" | "week" => Ok(RateUnit::Weekly),
            "monthly" | "month" => Ok(RateUnit::Monthly),
            other => Err(ValidationError::InvalidFormat {
                field: "rate_unit".to_string(),
                reason: format!(
                    "unknown rate unit '{}', expected hourly, daily, weekly or monthly",
                    other
                ),
            }),
        }
    }
}

// =============================================================================
// Rate Table
// =============================================================================

/// Price per rate unit, in cents.
///
/// ## Inheritance
/// ```text
/// Category "City"   hourly 500   daily 2500  weekly 10000  monthly 30000
///                       │            │            │             │
/// Bike "C-07"       hourly 0     daily 2000  weekly 0      monthly 0
///                       ▼            ▼            ▼             ▼
/// Effective         hourly 500   daily 2000  weekly 10000  monthly 30000
/// ```
/// A bike rate of zero means "not customised" and takes the category rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateTable {
    pub hourly_cents: i64,
    pub daily_cents: i64,
    pub weekly_cents: i64,
    pub monthly_cents: i64,
}

impl RateTable {
    /// Creates a rate table from the four unit prices.
    pub const fn new(hourly: Money, daily: Money, weekly: Money, monthly: Money) -> Self {
        RateTable {
            hourly_cents: hourly.cents(),
            daily_cents: daily.cents(),
            weekly_cents: weekly.cents(),
            monthly_cents: monthly.cents(),
        }
    }

    /// Default category rates: 5 €/hour, 25 €/day, 100 €/week, 300 €/month.
    pub const fn category_default() -> Self {
        RateTable {
            hourly_cents: 500,
            daily_cents: 2500,
            weekly_cents: 10000,
            monthly_cents: 30000,
        }
    }

    /// Returns the price for one unit of `unit`.
    pub const fn rate(&self, unit: RateUnit) -> Money {
        let cents = match unit {
            RateUnit::Hourly => self.hourly_cents,
            RateUnit::Daily => self.daily_cents,
            RateUnit::Weekly => self.weekly_cents,
            RateUnit::Monthly => self.monthly_cents,
        };
        Money::from_cents(cents)
    }

    /// Fills every zero rate from `fallback`.
    pub const fn inherit_from(&self, fallback: &RateTable) -> RateTable {
        RateTable {
            hourly_cents: Money::from_cents(self.hourly_cents)
                .or_if_zero(Money::from_cents(fallback.hourly_cents))
                .cents(),
            daily_cents: Money::from_cents(self.daily_cents)
                .or_if_zero(Money::from_cents(fallback.daily_cents))
                .cents(),
            weekly_cents: Money::from_cents(self.weekly_cents)
                .or_if_zero(Money::from_cents(fallback.weekly_cents))
                .cents(),
            monthly_cents: Money::from_cents(self.monthly_cents)
                .or_if_zero(Money::from_cents(fallback.monthly_cents))
                .cents(),
        }
    }
}

// =============================================================================
// Resource State
// =============================================================================

/// Availability of a bike.
///
/// `Maintenance` and `Retired` are the two flavours of "unavailable".
/// `Reserved` is only set when the lifecycle policy reserves bikes at
/// confirmation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Available,
    Reserved,
    Rented,
    Maintenance,
    Retired,
}

impl ResourceState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Available => "available",
            ResourceState::Reserved => "reserved",
            ResourceState::Rented => "rented",
            ResourceState::Maintenance => "maintenance",
            ResourceState::Retired => "retired",
        }
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        ResourceState::Available
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Bike Attributes
// =============================================================================

/// Physical condition of a bike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum BikeCondition {
    New,
    Excellent,
    Good,
    Fair,
    Poor,
}

impl BikeCondition {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BikeCondition::New => "new",
            BikeCondition::Excellent => "excellent",
            BikeCondition::Good => "good",
            BikeCondition::Fair => "fair",
            BikeCondition::Poor => "poor",
        }
    }
}

impl Default for BikeCondition {
    fn default() -> Self {
        BikeCondition::Good
    }
}

impl fmt::Display for BikeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum FrameSize {
    Xs,
    S,
    M,
    L,
    Xl,
}

// =============================================================================
// Category
// =============================================================================

/// A family of bikes (city, mountain, road, electric) with default rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, unique across categories.
    pub name: String,

    /// Ordering in lists (lower first).
    pub sequence: i64,

    pub description: Option<String>,

    /// Default rates inherited by bikes of this category.
    pub rates: RateTable,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Bike (Resource)
// =============================================================================

/// A rentable bike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bike {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Name or shop reference (e.g. "C-07").
    pub name: String,

    pub category_id: Option<String>,

    /// Manufacturer serial number, unique when present.
    pub serial_number: Option<String>,

    pub brand: Option<String>,

    pub model: Option<String>,

    pub year: Option<i64>,

    pub frame_size: Option<FrameSize>,

    pub color: Option<String>,

    /// Availability. Only the lifecycle and the explicit
    /// available/maintenance actions change it.
    pub state: ResourceState,

    pub condition: BikeCondition,

    /// Effective rates (category rates already inherited).
    pub rates: RateTable,

    pub description: Option<String>,

    /// Soft delete flag.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Bike {
    /// Price for one unit of `unit`.
    #[inline]
    pub fn rate(&self, unit: RateUnit) -> Money {
        self.rates.rate(unit)
    }

    /// Checks if the bike can be confirmed for a rental right now.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.is_active && self.state == ResourceState::Available
    }
}

// =============================================================================
// Reservation State
// =============================================================================

/// Lifecycle of a reservation.
///
/// ```text
/// draft ──► confirmed ──► ongoing ──► done
///   │           │
///   └─────┬─────┘
///         ▼
///     cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Draft,
    Confirmed,
    Ongoing,
    Done,
    Cancelled,
}

impl ReservationState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Draft => "draft",
            ReservationState::Confirmed => "confirmed",
            ReservationState::Ongoing => "ongoing",
            ReservationState::Done => "done",
            ReservationState::Cancelled => "cancelled",
        }
    }

    /// Confirmed and ongoing reservations hold their interval; drafts and
    /// cancelled ones do not block anybody.
    #[inline]
    pub const fn holds_interval(&self) -> bool {
        matches!(self, ReservationState::Confirmed | ReservationState::Ongoing)
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ReservationState::Done | ReservationState::Cancelled)
    }
}

impl Default for ReservationState {
    fn default() -> Self {
        ReservationState::Draft
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Reservation
// =============================================================================

/// A time-bounded booking of a bike, the core billable unit.
///
/// Computed fields (`duration_*`, `unit_price_cents`, `quantity`,
/// `subtotal_cents`) are kept current by [`crate::compute::recompute`];
/// nothing recomputes them implicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Human-readable contract number, [`crate::NEW_CONTRACT_PLACEHOLDER`]
    /// until first persisted.
    pub contract_number: String,

    /// The booked bike (reference, not ownership).
    pub resource_id: String,

    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    /// Set when the bike comes back.
    pub actual_return: Option<DateTime<Utc>>,

    pub rate_unit: RateUnit,

    /// Unit price forced by the clerk while in draft.
    pub unit_price_override_cents: Option<i64>,

    /// Effective unit price (frozen at confirmation).
    pub unit_price_cents: i64,

    /// Billable quantity in `rate_unit`s.
    pub quantity: f64,

    pub subtotal_cents: i64,

    pub duration_hours: f64,
    pub duration_days: f64,

    pub state: ReservationState,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Creates a draft reservation with zeroed computed fields.
    ///
    /// Call [`crate::compute::recompute_all`] afterwards to fill them.
    pub fn draft(
        resource_id: impl Into<String>,
        customer_name: impl Into<String>,
        interval: Interval,
        rate_unit: RateUnit,
        now: DateTime<Utc>,
    ) -> Self {
        Reservation {
            id: uuid::Uuid::new_v4().to_string(),
            contract_number: crate::NEW_CONTRACT_PLACEHOLDER.to_string(),
            resource_id: resource_id.into(),
            customer_name: customer_name.into(),
            customer_phone: None,
            customer_email: None,
            start: interval.start,
            end: interval.end,
            actual_return: None,
            rate_unit,
            unit_price_override_cents: None,
            unit_price_cents: 0,
            quantity: 0.0,
            subtotal_cents: 0,
            duration_hours: 0.0,
            duration_days: 0.0,
            state: ReservationState::Draft,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The booked `[start, end)` interval.
    #[inline]
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Total billed amount. Equal to the subtotal; no taxes or discounts
    /// are applied at this level.
    #[inline]
    pub fn total(&self) -> Money {
        self.subtotal()
    }

    /// Pricing is frozen once the reservation leaves draft.
    #[inline]
    pub fn is_price_frozen(&self) -> bool {
        self.state != ReservationState::Draft
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
