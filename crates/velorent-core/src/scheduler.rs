//! # Reservation Scheduler
//!
//! Answers two questions, deterministically and without side effects:
//! "is this interval bookable for this bike?" and "what does it cost?".
//!
//! ## Overlap Rule (half-open intervals)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  [s1, e1) and [s2, e2) overlap  ⇔  s1 < e2  AND  s2 < e1               │
//! │                                                                         │
//! │  10:00 ─────── 12:00                                                   │
//! │                12:00 ─────── 14:00     back to back: NO overlap        │
//! │          11:59 ─ 12:01                 straddles both: overlap         │
//! │                                                                         │
//! │  Only CONFIRMED and ONGOING reservations hold their interval.          │
//! │  Drafts and cancelled reservations never block a booking.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tiered Pricing
//! ```text
//! ┌──────────┬────────────────────────────────────┬───────────────────────┐
//! │ unit     │ quantity                           │ example (2 h rental)  │
//! ├──────────┼────────────────────────────────────┼───────────────────────┤
//! │ hourly   │ hours (exact, no minimum)          │ 2.0                   │
//! │ daily    │ max(1, round(days, 0))             │ 1                     │
//! │ weekly   │ max(1, round(days / 7, 1))         │ 1                     │
//! │ monthly  │ max(1, round(days / 30, 1))        │ 1                     │
//! └──────────┴────────────────────────────────────┴───────────────────────┘
//! ```
//! Rounding applies to the exact value of the computed float, ties to even:
//! 7.35 days is 1.0500000000000000444 weeks and bills as 1.1.
//! Months are 30 days, not calendar months.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Bike, RateUnit, Reservation, ReservationState};

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: f64 = 86400.0;
const DAYS_PER_WEEK: f64 = 7.0;
const DAYS_PER_MONTH: f64 = 30.0;

// =============================================================================
// Interval
// =============================================================================

/// A half-open `[start, end)` time interval.
///
/// Construction does not check `end > start`; [`validate_interval`] does.
/// That keeps duration math usable on any pair of timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Interval { start, end }
    }

    /// Half-open overlap test. Symmetric.
    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Duration of the interval.
    #[inline]
    pub fn duration(&self) -> RentalDuration {
        compute_duration(self.start, self.end)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Checks `end > start`.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use velorent_core::scheduler::{validate_interval, Interval};
///
/// let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
/// assert!(validate_interval(&Interval::new(t, t)).is_err());
/// ```
pub fn validate_interval(interval: &Interval) -> CoreResult<()> {
    if interval.end <= interval.start {
        return Err(CoreError::InvalidInterval {
            start: interval.start,
            end: interval.end,
        });
    }
    Ok(())
}

/// Validates a candidate reservation against the other reservations.
///
/// ## Rules
/// 1. A cancelled candidate is not checked at all.
/// 2. `end > start`, else [`CoreError::InvalidInterval`].
/// 3. Among `existing`, only reservations for the same bike, other than the
///    candidate itself, in `confirmed` or `ongoing` state are considered.
/// 4. If any of those overlaps, [`CoreError::Overlap`] names the one with the
///    earliest start (ties broken by id).
///
/// Pure: nothing is mutated.
///
/// ## User Workflow
/// ```text
/// Clerk edits dates / confirms / starts
///      │
///      ▼
/// load confirmed+ongoing reservations for the bike  (same transaction)
///      │
///      ▼
/// validate(candidate, existing) ← THIS FUNCTION
///      │
///      ├── end <= start?  → InvalidInterval
///      ├── conflict?      → Overlap { contract_number, start, end }
///      └── OK             → write the change, commit
/// ```
pub fn validate<'a, I>(candidate: &Reservation, existing: I) -> CoreResult<()>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    if candidate.state == ReservationState::Cancelled {
        return Ok(());
    }

    let wanted = candidate.interval();
    validate_interval(&wanted)?;

    let conflict = existing
        .into_iter()
        .filter(|other| other.id != candidate.id)
        .filter(|other| other.resource_id == candidate.resource_id)
        .filter(|other| other.state.holds_interval())
        .filter(|other| wanted.overlaps(&other.interval()))
        .min_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    match conflict {
        Some(other) => Err(CoreError::Overlap {
            reservation_id: other.id.clone(),
            contract_number: other.contract_number.clone(),
            start: other.start,
            end: other.end,
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Duration
// =============================================================================

/// Continuous rental duration, not floored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RentalDuration {
    pub hours: f64,
    pub days: f64,
}

/// Computes the duration between two timestamps in hours and days.
///
/// A zero-length (or reversed) interval is not an error here; it yields
/// zero (or negative) values. Use [`validate_interval`] for validity.
pub fn compute_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> RentalDuration {
    let millis = (end - start).num_milliseconds() as f64;
    let seconds = millis / 1000.0;
    RentalDuration {
        hours: seconds / SECONDS_PER_HOUR,
        days: seconds / SECONDS_PER_DAY,
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Result of pricing a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub unit_price: Money,
    pub quantity: f64,
    pub subtotal: Money,
}

/// Billable quantity for a duration in the given unit.
pub fn compute_quantity(rate_unit: RateUnit, duration: RentalDuration) -> f64 {
    match rate_unit {
        RateUnit::Hourly => duration.hours,
        RateUnit::Daily => round_half_even(duration.days, 0).max(1.0),
        RateUnit::Weekly => round_half_even(duration.days / DAYS_PER_WEEK, 1).max(1.0),
        RateUnit::Monthly => round_half_even(duration.days / DAYS_PER_MONTH, 1).max(1.0),
    }
}

/// Unit price for the bike in the given unit; zero without a bike.
///
/// A missing bike is a soft failure: the reservation can still be drafted
/// and is simply priced at zero.
#[inline]
pub fn lookup_unit_price(resource: Option<&Bike>, rate_unit: RateUnit) -> Money {
    resource
        .map(|bike| bike.rate(rate_unit))
        .unwrap_or_else(Money::zero)
}

/// Prices a rental.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use velorent_core::scheduler::{compute_duration, compute_price};
/// use velorent_core::RateUnit;
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
///
/// // No bike: zero price, quantity still computed.
/// let quote = compute_price(None, RateUnit::Daily, compute_duration(start, end));
/// assert_eq!(quote.quantity, 1.0);
/// assert!(quote.subtotal.is_zero());
/// ```
pub fn compute_price(
    resource: Option<&Bike>,
    rate_unit: RateUnit,
    duration: RentalDuration,
) -> PriceQuote {
    price_with_unit(lookup_unit_price(resource, rate_unit), rate_unit, duration)
}

/// Prices a rental with an already known unit price (override or frozen).
pub fn price_with_unit(unit_price: Money, rate_unit: RateUnit, duration: RentalDuration) -> PriceQuote {
    let quantity = compute_quantity(rate_unit, duration);
    PriceQuote {
        unit_price,
        quantity,
        subtotal: unit_price.scale(quantity),
    }
}

/// Rounds the exact binary value of `value` to `decimals` places, ties to even.
///
/// Scaling by a power of ten first would round twice: `1.05 * 10` is exactly
/// `10.5` in floating point even though `1.05` sits just above the midpoint.
fn round_half_even(value: f64, decimals: u32) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BikeCondition, RateTable, ResourceState};
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn bike() -> Bike {
        Bike {
            id: "bike-r".to_string(),
            name: "R".to_string(),
            category_id: None,
            serial_number: None,
            brand: None,
            model: None,
            year: None,
            frame_size: None,
            color: None,
            state: ResourceState::Available,
            condition: BikeCondition::Good,
            rates: RateTable {
                hourly_cents: 500,
                daily_cents: 2500,
                weekly_cents: 10000,
                monthly_cents: 30000,
            },
            description: None,
            is_active: true,
            created_at: at(2024, 1, 1, 0, 0),
            updated_at: at(2024, 1, 1, 0, 0),
        }
    }

    fn reservation(id: &str, start: DateTime<Utc>, end: DateTime<Utc>, state: ReservationState) -> Reservation {
        let mut r = Reservation::draft("bike-r", "Customer", Interval::new(start, end), RateUnit::Daily, start);
        r.id = id.to_string();
        r.contract_number = format!("RENT/2024/{}", id);
        r.state = state;
        r
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let cases = [
            (at(2024, 1, 1, 10, 0), at(2024, 1, 1, 12, 0), at(2024, 1, 1, 11, 0), at(2024, 1, 1, 13, 0)),
            (at(2024, 1, 1, 10, 0), at(2024, 1, 1, 12, 0), at(2024, 1, 1, 12, 0), at(2024, 1, 1, 14, 0)),
            (at(2024, 1, 1, 10, 0), at(2024, 1, 1, 18, 0), at(2024, 1, 1, 11, 0), at(2024, 1, 1, 12, 0)),
            (at(2024, 1, 1, 10, 0), at(2024, 1, 1, 11, 0), at(2024, 1, 2, 10, 0), at(2024, 1, 2, 11, 0)),
        ];
        for (s1, e1, s2, e2) in cases {
            let a = Interval::new(s1, e1);
            let b = Interval::new(s2, e2);
            assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }
    }

    #[test]
    fn test_half_open_boundary() {
        let morning = Interval::new(at(2024, 1, 1, 10, 0), at(2024, 1, 1, 12, 0));
        let afternoon = Interval::new(at(2024, 1, 1, 12, 0), at(2024, 1, 1, 14, 0));
        let straddle = Interval::new(at(2024, 1, 1, 11, 59), at(2024, 1, 1, 12, 1));

        assert!(!morning.overlaps(&afternoon));
        assert!(straddle.overlaps(&morning));
        assert!(straddle.overlaps(&afternoon));
    }

    #[test]
    fn test_zero_length_duration_is_zero_but_invalid() {
        let t = at(2024, 1, 1, 10, 0);
        let duration = compute_duration(t, t);
        assert_eq!(duration.hours, 0.0);
        assert_eq!(duration.days, 0.0);

        let candidate = reservation("new", t, t, ReservationState::Draft);
        let err = validate(&candidate, &[]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInterval { .. }));
    }

    #[test]
    fn test_duration_is_fractional() {
        let duration = compute_duration(at(2024, 1, 1, 10, 0), at(2024, 1, 2, 16, 30));
        assert!((duration.hours - 30.5).abs() < 1e-9);
        assert!((duration.days - 30.5 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_reports_earliest_conflict() {
        let candidate = reservation("new", at(2024, 1, 1, 0, 0), at(2024, 1, 10, 0, 0), ReservationState::Draft);
        let existing = vec![
            reservation("b", at(2024, 1, 5, 0, 0), at(2024, 1, 6, 0, 0), ReservationState::Confirmed),
            reservation("a", at(2024, 1, 2, 0, 0), at(2024, 1, 3, 0, 0), ReservationState::Ongoing),
        ];

        match validate(&candidate, &existing) {
            Err(CoreError::Overlap { reservation_id, .. }) => assert_eq!(reservation_id, "a"),
            other => panic!("expected overlap, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_ignores_drafts_cancelled_self_and_other_bikes() {
        let candidate = reservation("self", at(2024, 1, 1, 0, 0), at(2024, 1, 2, 0, 0), ReservationState::Confirmed);
        let mut other_bike = reservation("x", at(2024, 1, 1, 0, 0), at(2024, 1, 2, 0, 0), ReservationState::Confirmed);
        other_bike.resource_id = "bike-z".to_string();
        let mut stale_self = candidate.clone();
        stale_self.start = at(2024, 1, 1, 6, 0);

        let existing = vec![
            reservation("d", at(2024, 1, 1, 0, 0), at(2024, 1, 2, 0, 0), ReservationState::Draft),
            reservation("c", at(2024, 1, 1, 0, 0), at(2024, 1, 2, 0, 0), ReservationState::Cancelled),
            reservation("f", at(2024, 1, 1, 0, 0), at(2024, 1, 2, 0, 0), ReservationState::Done),
            other_bike,
            stale_self,
        ];

        assert!(validate(&candidate, &existing).is_ok());
    }

    #[test]
    fn test_cancelled_candidate_is_not_checked() {
        let t = at(2024, 1, 1, 10, 0);
        let candidate = reservation("gone", t, t, ReservationState::Cancelled);
        assert!(validate(&candidate, &[]).is_ok());
    }

    #[test]
    fn test_minimum_billing_unit() {
        let two_hours = compute_duration(at(2024, 1, 1, 10, 0), at(2024, 1, 1, 12, 0));
        assert_eq!(compute_quantity(RateUnit::Daily, two_hours), 1.0);
        assert_eq!(compute_quantity(RateUnit::Weekly, two_hours), 1.0);
        assert_eq!(compute_quantity(RateUnit::Monthly, two_hours), 1.0);
        assert_eq!(compute_quantity(RateUnit::Hourly, two_hours), 2.0);
    }

    #[test]
    fn test_quantity_rounding() {
        // 2.5 days rounds to even (2), 3.5 days rounds to 4
        let two_and_half = RentalDuration { hours: 60.0, days: 2.5 };
        let three_and_half = RentalDuration { hours: 84.0, days: 3.5 };
        assert_eq!(compute_quantity(RateUnit::Daily, two_and_half), 2.0);
        assert_eq!(compute_quantity(RateUnit::Daily, three_and_half), 4.0);

        // 9 days = 1.2857 weeks → 1.3
        let nine_days = RentalDuration { hours: 216.0, days: 9.0 };
        assert!((compute_quantity(RateUnit::Weekly, nine_days) - 1.3).abs() < 1e-9);

        // 45 days = 1.5 months
        let forty_five = RentalDuration { hours: 1080.0, days: 45.0 };
        assert!((compute_quantity(RateUnit::Monthly, forty_five) - 1.5).abs() < 1e-9);

        // Near-ties resolve on the float actually computed, not its decimal label
        let start = at(2024, 1, 1, 0, 0);
        let just_above = compute_duration(start, start + chrono::Duration::minutes(10584));
        let just_below = compute_duration(start, start + chrono::Duration::minutes(19656));
        assert!((compute_quantity(RateUnit::Weekly, just_above) - 1.1).abs() < 1e-9);
        assert!((compute_quantity(RateUnit::Weekly, just_below) - 1.9).abs() < 1e-9);
    }

    #[test]
    fn test_missing_resource_prices_at_zero() {
        let duration = RentalDuration { hours: 48.0, days: 2.0 };
        let quote = compute_price(None, RateUnit::Daily, duration);
        assert!(quote.unit_price.is_zero());
        assert_eq!(quote.quantity, 2.0);
        assert!(quote.subtotal.is_zero());
    }

    #[test]
    fn test_hourly_price_uses_exact_hours() {
        let duration = compute_duration(at(2024, 1, 1, 10, 0), at(2024, 1, 1, 11, 30));
        let quote = compute_price(Some(&bike()), RateUnit::Hourly, duration);
        assert_eq!(quote.quantity, 1.5);
        assert_eq!(quote.subtotal.cents(), 750);
    }

    /// Daily rate 25, two full days → 50.
    #[test]
    fn test_scenario_daily_two_days() {
        let duration = compute_duration(at(2024, 1, 1, 10, 0), at(2024, 1, 3, 10, 0));
        assert_eq!(duration.days, 2.0);

        let quote = compute_price(Some(&bike()), RateUnit::Daily, duration);
        assert_eq!(quote.unit_price.cents(), 2500);
        assert_eq!(quote.quantity, 2.0);
        assert_eq!(quote.subtotal.cents(), 5000);
    }

    /// A second booking inside a confirmed one is rejected, naming the first.
    #[test]
    fn test_scenario_overlap_with_confirmed() {
        let first = reservation("1", at(2024, 1, 1, 10, 0), at(2024, 1, 3, 10, 0), ReservationState::Confirmed);
        let second = reservation("2", at(2024, 1, 2, 0, 0), at(2024, 1, 2, 12, 0), ReservationState::Draft);

        match validate(&second, std::slice::from_ref(&first)) {
            Err(CoreError::Overlap { reservation_id, contract_number, start, end }) => {
                assert_eq!(reservation_id, "1");
                assert_eq!(contract_number, "RENT/2024/1");
                assert_eq!(start, first.start);
                assert_eq!(end, first.end);
            }
            other => panic!("expected overlap, got {:?}", other),
        }
    }

    /// One week at weekly rate 100 → quantity 1.0, subtotal 100.
    #[test]
    fn test_scenario_weekly_one_week() {
        let duration = compute_duration(at(2024, 1, 10, 9, 0), at(2024, 1, 17, 9, 0));
        assert_eq!(duration.days, 7.0);

        let quote = compute_price(Some(&bike()), RateUnit::Weekly, duration);
        assert_eq!(quote.quantity, 1.0);
        assert_eq!(quote.subtotal.cents(), 10000);
    }
}
