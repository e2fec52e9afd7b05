//! # Error Types
//!
//! Domain-specific error types for velorent-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  velorent-core errors (this file)                                      │
//! │  ├── CoreError        - Scheduling and lifecycle rejections            │
//! │  └── ValidationError  - Field/record validation failures               │
//! │                                                                         │
//! │  velorent-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → host UI message         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries enough context (contract number, interval, state)
//! to be shown to the end user as-is.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{ReservationState, ResourceState};

// =============================================================================
// Core Error
// =============================================================================

/// Scheduling and lifecycle errors.
///
/// None of these are retried internally. A conflict is a definitive
/// rejection reported straight to the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The reservation interval is empty or reversed (`end <= start`).
    #[error("End date ({end}) must be after start date ({start})")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The interval conflicts with a confirmed or ongoing reservation.
    ///
    /// ## User Workflow
    /// ```text
    /// Book bike B-12 from Jan 2 00:00 to Jan 2 12:00
    ///      │
    ///      ▼
    /// RENT/2024/00001 holds B-12 from Jan 1 10:00 to Jan 3 10:00
    ///      │
    ///      ▼
    /// Overlap { contract_number: "RENT/2024/00001", .. }
    ///      │
    ///      ▼
    /// UI shows: "Bike is already booked by RENT/2024/00001 ..."
    /// ```
    #[error("Bike is already booked by {contract_number} from {start} to {end}")]
    Overlap {
        reservation_id: String,
        contract_number: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Confirmation attempted while the bike is not available.
    #[error("Bike {resource_id} is {state} and cannot be booked")]
    ResourceUnavailable {
        resource_id: String,
        state: ResourceState,
    },

    /// Bike cannot be found.
    #[error("Bike not found: {0}")]
    ResourceNotFound(String),

    /// Reservation cannot be found.
    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    /// Transition requested from the wrong state.
    ///
    /// Only raised when the lifecycle policy is strict; the default policy
    /// skips the transition silently.
    #[error("Cannot {action} reservation {contract_number}: it is {state}")]
    InvalidTransition {
        contract_number: String,
        action: &'static str,
        state: ReservationState,
    },

    /// The field is frozen once the reservation left the draft state.
    #[error("Reservation {contract_number} is {state}; {field} can no longer change")]
    ReservationLocked {
        contract_number: String,
        state: ReservationState,
        field: &'static str,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the validators in [`crate::validation`] before any record is
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Amount must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID, unknown enum value).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields hold values that may not be combined.
    #[error("Bike {name} is in {condition} condition and cannot be {state}")]
    ConditionConflict {
        name: String,
        condition: String,
        state: String,
    },

    /// Duplicate value (e.g., duplicate serial number).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
