//! # Computed Fields
//!
//! Explicit recomputation of a reservation's derived fields.
//!
//! ## Dispatch Table
//! ```text
//! ┌──────────────┬──────────┬────────────┬──────────┬──────────┐
//! │ changed      │ duration │ unit price │ quantity │ subtotal │
//! ├──────────────┼──────────┼────────────┼──────────┼──────────┤
//! │ Start / End  │    ✓     │            │    ✓     │    ✓     │
//! │ RateUnit     │          │     ✓      │    ✓     │    ✓     │
//! │ Resource     │          │     ✓      │          │    ✓     │
//! │ UnitPrice    │          │     ✓      │          │    ✓     │
//! └──────────────┴──────────┴────────────┴──────────┴──────────┘
//! ```
//! Nothing recomputes implicitly. Every mutation helper in this module calls
//! [`recompute`] with the fields it touched, and the caller persists the
//! result.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::scheduler::{compute_duration, compute_quantity, lookup_unit_price, Interval};
use crate::types::{Bike, RateUnit, Reservation};

/// Input fields of a reservation that feed computed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationField {
    Start,
    End,
    RateUnit,
    Resource,
    UnitPrice,
}

impl ReservationField {
    pub const ALL: [ReservationField; 5] = [
        ReservationField::Start,
        ReservationField::End,
        ReservationField::RateUnit,
        ReservationField::Resource,
        ReservationField::UnitPrice,
    ];

    const fn affects_duration(&self) -> bool {
        matches!(self, ReservationField::Start | ReservationField::End)
    }

    const fn affects_unit_price(&self) -> bool {
        matches!(
            self,
            ReservationField::RateUnit | ReservationField::Resource | ReservationField::UnitPrice
        )
    }

    const fn affects_quantity(&self) -> bool {
        matches!(
            self,
            ReservationField::Start | ReservationField::End | ReservationField::RateUnit
        )
    }
}

/// Recomputes the fields depending on `changed`.
///
/// `resource` is the reservation's bike, or `None` when it cannot be found
/// (priced at zero). Once the reservation left draft the unit price is frozen
/// and the bike's current rates are ignored.
pub fn recompute(reservation: &mut Reservation, changed: &[ReservationField], resource: Option<&Bike>) {
    if changed.is_empty() {
        return;
    }

    if changed.iter().any(ReservationField::affects_duration) {
        let duration = compute_duration(reservation.start, reservation.end);
        reservation.duration_hours = duration.hours;
        reservation.duration_days = duration.days;
    }

    if changed.iter().any(ReservationField::affects_unit_price) && !reservation.is_price_frozen() {
        reservation.unit_price_cents = resolve_unit_price(reservation, resource).cents();
    }

    if changed.iter().any(ReservationField::affects_quantity) {
        let duration = compute_duration(reservation.start, reservation.end);
        reservation.quantity = compute_quantity(reservation.rate_unit, duration);
    }

    reservation.subtotal_cents = reservation.unit_price().scale(reservation.quantity).cents();
}

/// Recomputes every derived field.
pub fn recompute_all(reservation: &mut Reservation, resource: Option<&Bike>) {
    recompute(reservation, &ReservationField::ALL, resource);
}

/// Override wins over the bike's rate.
fn resolve_unit_price(reservation: &Reservation, resource: Option<&Bike>) -> Money {
    match reservation.unit_price_override_cents {
        Some(cents) => Money::from_cents(cents),
        None => lookup_unit_price(resource, reservation.rate_unit),
    }
}

// =============================================================================
// Mutation Helpers
// =============================================================================

/// Moves the reservation to a new interval.
///
/// Allowed until the reservation is done or cancelled. The interval itself
/// is not validated here; run [`crate::scheduler::validate`] before
/// persisting.
pub fn reschedule(reservation: &mut Reservation, interval: Interval, resource: Option<&Bike>) -> CoreResult<()> {
    if reservation.state.is_terminal() {
        return Err(locked(reservation, "dates"));
    }

    reservation.start = interval.start;
    reservation.end = interval.end;
    recompute(reservation, &[ReservationField::Start, ReservationField::End], resource);
    Ok(())
}

/// Changes the billing unit. Draft only.
pub fn change_rate_unit(reservation: &mut Reservation, rate_unit: RateUnit, resource: Option<&Bike>) -> CoreResult<()> {
    if reservation.is_price_frozen() {
        return Err(locked(reservation, "rate unit"));
    }

    reservation.rate_unit = rate_unit;
    recompute(reservation, &[ReservationField::RateUnit], resource);
    Ok(())
}

/// Moves the reservation to another bike. Draft only.
pub fn change_resource(reservation: &mut Reservation, resource_id: &str, resource: Option<&Bike>) -> CoreResult<()> {
    if reservation.is_price_frozen() {
        return Err(locked(reservation, "bike"));
    }

    reservation.resource_id = resource_id.to_string();
    recompute(reservation, &[ReservationField::Resource], resource);
    Ok(())
}

/// Forces (or clears, with `None`) the unit price. Draft only.
pub fn override_unit_price(
    reservation: &mut Reservation,
    unit_price: Option<Money>,
    resource: Option<&Bike>,
) -> CoreResult<()> {
    if reservation.is_price_frozen() {
        return Err(locked(reservation, "unit price"));
    }

    if let Some(price) = unit_price {
        if price.is_negative() {
            return Err(ValidationError::MustBeNonNegative {
                field: "unit_price".to_string(),
            }
            .into());
        }
    }

    reservation.unit_price_override_cents = unit_price.map(|p| p.cents());
    recompute(reservation, &[ReservationField::UnitPrice], resource);
    Ok(())
}

fn locked(reservation: &Reservation, field: &'static str) -> CoreError {
    CoreError::ReservationLocked {
        contract_number: reservation.contract_number.clone(),
        state: reservation.state,
        field,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
