//! # Reservation Lifecycle
//!
//! The reservation state machine and the bike state changes it drives.
//!
//! ## Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  action   from                to          bike side effect              │
//! │  ───────  ──────────────────  ──────────  ─────────────────────────────  │
//! │  confirm  draft               confirmed   must be available;            │
//! │                                           → reserved (policy only)      │
//! │  start    confirmed           ongoing     → rented                      │
//! │  finish   ongoing             done        → available, return = now     │
//! │  cancel   draft | confirmed   cancelled   reserved → available          │
//! │                                           (policy only)                 │
//! │                                                                         │
//! │  Any other (action, state) pair is SKIPPED: nothing changes and no     │
//! │  error is raised, unless the policy is strict.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! With the default policy, confirmation does not touch the bike. Two
//! confirmed reservations of the same bike are kept apart by the overlap
//! check alone, which is why `confirm` and `start` re-run it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compute::recompute_all;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::scheduler::validate;
use crate::types::{Bike, BikeCondition, Reservation, ReservationState, ResourceState};

// =============================================================================
// Policy
// =============================================================================

/// Knobs for the two behaviours the shop may want to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    /// Raise [`CoreError::InvalidTransition`] instead of skipping a
    /// transition requested from the wrong state.
    #[serde(default)]
    pub strict_transitions: bool,

    /// Mark the bike `reserved` at confirmation and release it when a
    /// confirmed reservation is cancelled.
    #[serde(default)]
    pub reserve_on_confirm: bool,
}

/// Lifecycle actions, for messages and the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Confirm,
    Start,
    Finish,
    Cancel,
}

impl Action {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::Start => "start",
            Action::Finish => "finish",
            Action::Cancel => "cancel",
        }
    }
}

/// What a transition call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        from: ReservationState,
        to: ReservationState,
    },
    /// The reservation was not in a state the action applies to.
    Skipped { state: ReservationState },
}

impl TransitionOutcome {
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

// =============================================================================
// Reservation Transitions
// =============================================================================

/// `draft → confirmed`.
///
/// ## Steps
/// 1. Skip unless draft.
/// 2. Bike must be available, else [`CoreError::ResourceUnavailable`]
///    (the reservation stays draft).
/// 3. Overlap check against `existing`.
/// 4. Refresh pricing from the bike, then freeze it by leaving draft.
pub fn confirm<'a, I>(
    reservation: &mut Reservation,
    bike: &mut Bike,
    existing: I,
    policy: LifecyclePolicy,
) -> CoreResult<TransitionOutcome>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    if reservation.state != ReservationState::Draft {
        return skip_or_fail(reservation, Action::Confirm, policy);
    }
    ensure_same_bike(reservation, bike)?;

    if !bike.is_available() {
        return Err(CoreError::ResourceUnavailable {
            resource_id: bike.id.clone(),
            state: bike.state,
        });
    }

    validate(reservation, existing)?;

    recompute_all(reservation, Some(bike));
    reservation.state = ReservationState::Confirmed;
    if policy.reserve_on_confirm {
        bike.state = ResourceState::Reserved;
    }

    Ok(applied(ReservationState::Draft, ReservationState::Confirmed))
}

/// `confirmed → ongoing`; the bike becomes `rented`.
///
/// The bike must be `available` (or `reserved`, as left by a
/// reserve-on-confirm policy). A bike still out with a late customer or in
/// maintenance cannot be handed over.
pub fn start<'a, I>(
    reservation: &mut Reservation,
    bike: &mut Bike,
    existing: I,
    policy: LifecyclePolicy,
) -> CoreResult<TransitionOutcome>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    if reservation.state != ReservationState::Confirmed {
        return skip_or_fail(reservation, Action::Start, policy);
    }
    ensure_same_bike(reservation, bike)?;

    if !matches!(bike.state, ResourceState::Available | ResourceState::Reserved) {
        return Err(CoreError::ResourceUnavailable {
            resource_id: bike.id.clone(),
            state: bike.state,
        });
    }

    validate(reservation, existing)?;

    reservation.state = ReservationState::Ongoing;
    bike.state = ResourceState::Rented;

    Ok(applied(ReservationState::Confirmed, ReservationState::Ongoing))
}

/// `ongoing → done`; the actual return time is recorded.
///
/// The bike goes back to `available`, or to `maintenance` if its condition
/// was marked `poor` during the rental.
pub fn finish(
    reservation: &mut Reservation,
    bike: &mut Bike,
    now: DateTime<Utc>,
    policy: LifecyclePolicy,
) -> CoreResult<TransitionOutcome> {
    if reservation.state != ReservationState::Ongoing {
        return skip_or_fail(reservation, Action::Finish, policy);
    }
    ensure_same_bike(reservation, bike)?;

    reservation.state = ReservationState::Done;
    reservation.actual_return = Some(now);
    bike.state = if bike.condition == BikeCondition::Poor {
        ResourceState::Maintenance
    } else {
        ResourceState::Available
    };

    Ok(applied(ReservationState::Ongoing, ReservationState::Done))
}

/// `draft | confirmed → cancelled`.
///
/// `bike` may be absent (deleted bike); cancellation still goes through.
pub fn cancel(
    reservation: &mut Reservation,
    bike: Option<&mut Bike>,
    policy: LifecyclePolicy,
) -> CoreResult<TransitionOutcome> {
    let from = reservation.state;
    if !matches!(from, ReservationState::Draft | ReservationState::Confirmed) {
        return skip_or_fail(reservation, Action::Cancel, policy);
    }

    reservation.state = ReservationState::Cancelled;

    if policy.reserve_on_confirm && from == ReservationState::Confirmed {
        if let Some(bike) = bike {
            if bike.id == reservation.resource_id && bike.state == ResourceState::Reserved {
                bike.state = ResourceState::Available;
            }
        }
    }

    Ok(applied(from, ReservationState::Cancelled))
}

fn skip_or_fail(
    reservation: &Reservation,
    action: Action,
    policy: LifecyclePolicy,
) -> CoreResult<TransitionOutcome> {
    if policy.strict_transitions {
        return Err(CoreError::InvalidTransition {
            contract_number: reservation.contract_number.clone(),
            action: action.as_str(),
            state: reservation.state,
        });
    }
    Ok(TransitionOutcome::Skipped {
        state: reservation.state,
    })
}

fn ensure_same_bike(reservation: &Reservation, bike: &Bike) -> CoreResult<()> {
    if reservation.resource_id != bike.id {
        return Err(CoreError::ResourceNotFound(reservation.resource_id.clone()));
    }
    Ok(())
}

#[inline]
fn applied(from: ReservationState, to: ReservationState) -> TransitionOutcome {
    TransitionOutcome::Applied { from, to }
}

// =============================================================================
// Bike Actions
// =============================================================================
// Manual availability changes made by the shop. A rented bike is only
// released by finishing its rental, a reserved one by starting or cancelling
// its reservation.

/// Puts the bike back in the rental pool.
///
/// A bike in `poor` condition may not be available.
pub fn mark_available(bike: &mut Bike) -> CoreResult<()> {
    ensure_not_held(bike)?;
    if bike.condition == BikeCondition::Poor {
        return Err(ValidationError::ConditionConflict {
            name: bike.name.clone(),
            condition: bike.condition.to_string(),
            state: ResourceState::Available.to_string(),
        }
        .into());
    }
    bike.state = ResourceState::Available;
    Ok(())
}

/// Sends the bike to the workshop.
pub fn send_to_maintenance(bike: &mut Bike) -> CoreResult<()> {
    ensure_not_held(bike)?;
    bike.state = ResourceState::Maintenance;
    Ok(())
}

/// Takes the bike out of the fleet for good.
pub fn retire(bike: &mut Bike) -> CoreResult<()> {
    ensure_not_held(bike)?;
    bike.state = ResourceState::Retired;
    Ok(())
}

fn ensure_not_held(bike: &Bike) -> CoreResult<()> {
    if matches!(bike.state, ResourceState::Rented | ResourceState::Reserved) {
        return Err(CoreError::ResourceUnavailable {
            resource_id: bike.id.clone(),
            state: bike.state,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
