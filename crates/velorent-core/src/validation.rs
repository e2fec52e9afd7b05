//! # Validation Module
//!
//! Field rules for categories, bikes and reservations.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE                                                   │
//! │  ├── Required / length / format checks                                  │
//! │  ├── Non-negative rates                                                 │
//! │  └── Condition vs. state (a poor bike is never available)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: scheduler / lifecycle                                         │
//! │  └── Interval validity, overlap, transitions                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── UNIQUE (category name, bike serial number)                         │
//! │  ├── CHECK (rates >= 0)                                                 │
//! │  └── Foreign keys                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use velorent_core::validation::{validate_bike_name, validate_serial_number};
//!
//! validate_bike_name("City C-07").unwrap();
//! validate_serial_number("WTU-123-456").unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{Bike, BikeCondition, RateTable, ResourceState};
use crate::{MAX_NAME_LENGTH, MAX_SERIAL_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Oldest model year accepted for a bike.
const MIN_MODEL_YEAR: i64 = 1900;
/// Newest model year accepted for a bike.
const MAX_MODEL_YEAR: i64 = 2100;

// =============================================================================
// String Validators
// =============================================================================

fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validates a bike name.
///
/// ## Example
/// ```rust
/// use velorent_core::validation::validate_bike_name;
///
/// assert!(validate_bike_name("Mountain M-02").is_ok());
/// assert!(validate_bike_name("  ").is_err());
/// ```
pub fn validate_bike_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

/// Validates a category name. Uniqueness is enforced by the database.
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    validate_name("category name", name)
}

/// Validates the customer name on a reservation.
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    validate_name("customer name", name)
}

/// Validates a frame serial number.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens, slashes and dots only
pub fn validate_serial_number(serial: &str) -> ValidationResult<()> {
    let serial = serial.trim();

    if serial.is_empty() {
        return Err(ValidationError::Required {
            field: "serial number".to_string(),
        });
    }

    if serial.len() > MAX_SERIAL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "serial number".to_string(),
            max: MAX_SERIAL_LENGTH,
        });
    }

    if !serial
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '/' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "serial number".to_string(),
            reason: "must contain only letters, digits, '-', '/' and '.'".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional e-mail address. Only the shape is checked.
pub fn validate_email(email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(());
    };

    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a rate in cents. Zero is allowed and means "inherit".
///
/// ## Example
/// ```rust
/// use velorent_core::validation::validate_rate_cents;
///
/// assert!(validate_rate_cents("daily rate", 2500).is_ok());
/// assert!(validate_rate_cents("daily rate", 0).is_ok());
/// assert!(validate_rate_cents("daily rate", -1).is_err());
/// ```
pub fn validate_rate_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates all four rates of a table.
pub fn validate_rate_table(rates: &RateTable) -> ValidationResult<()> {
    validate_rate_cents("hourly rate", rates.hourly_cents)?;
    validate_rate_cents("daily rate", rates.daily_cents)?;
    validate_rate_cents("weekly rate", rates.weekly_cents)?;
    validate_rate_cents("monthly rate", rates.monthly_cents)?;
    Ok(())
}

/// Validates a model year.
pub fn validate_year(year: Option<i64>) -> ValidationResult<()> {
    match year {
        Some(y) if !(MIN_MODEL_YEAR..=MAX_MODEL_YEAR).contains(&y) => Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: MIN_MODEL_YEAR,
            max: MAX_MODEL_YEAR,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Bike Rules
// =============================================================================

/// A bike in poor condition cannot be available for rent.
pub fn validate_condition_state(
    name: &str,
    condition: BikeCondition,
    state: ResourceState,
) -> ValidationResult<()> {
    if condition == BikeCondition::Poor && state == ResourceState::Available {
        return Err(ValidationError::ConditionConflict {
            name: name.to_string(),
            condition: condition.to_string(),
            state: state.to_string(),
        });
    }
    Ok(())
}

/// Runs every field rule on a bike.
///
/// ## User Workflow
/// ```text
/// Clerk saves bike form
///      │
///      ▼
/// validate_bike(&bike) ← THIS FUNCTION
///      │
///      ├── name empty / too long?      → Required / TooLong
///      ├── bad serial number?          → InvalidFormat
///      ├── negative rate?              → MustBeNonNegative
///      ├── poor AND available?         → ConditionConflict
///      └── OK → insert (UNIQUE serial checked by SQLite)
/// ```
pub fn validate_bike(bike: &Bike) -> ValidationResult<()> {
    validate_bike_name(&bike.name)?;
    if let Some(serial) = bike.serial_number.as_deref() {
        validate_serial_number(serial)?;
    }
    validate_year(bike.year)?;
    validate_rate_table(&bike.rates)?;
    validate_condition_state(&bike.name, bike.condition, bike.state)?;
    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use velorent_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_names() {
        assert!(validate_bike_name("City C-07").is_ok());
        assert!(validate_bike_name("").is_err());
        assert!(validate_category_name(&"A".repeat(201)).is_err());
        assert!(validate_customer_name("Ada Lovelace").is_ok());
    }

    #[test]
    fn test_validate_serial_number() {
        assert!(validate_serial_number("WTU-123-456").is_ok());
        assert!(validate_serial_number("FR/2023.11").is_ok());

        assert!(validate_serial_number("").is_err());
        assert!(validate_serial_number("has space").is_err());
        assert!(validate_serial_number(&"9".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email(None).is_ok());
        assert!(validate_email(Some("")).is_ok());
        assert!(validate_email(Some("ada@example.com")).is_ok());
        assert!(validate_email(Some("ada")).is_err());
        assert!(validate_email(Some("@example.com")).is_err());
    }

    #[test]
    fn test_validate_rates() {
        assert!(validate_rate_table(&RateTable::category_default()).is_ok());

        let negative = RateTable {
            weekly_cents: -100,
            ..RateTable::category_default()
        };
        assert_eq!(
            validate_rate_table(&negative),
            Err(ValidationError::MustBeNonNegative {
                field: "weekly rate".to_string()
            })
        );
    }

    #[test]
    fn test_validate_year() {
        assert!(validate_year(None).is_ok());
        assert!(validate_year(Some(2023)).is_ok());
        assert!(validate_year(Some(1850)).is_err());
    }

    #[test]
    fn test_poor_condition_cannot_be_available() {
        assert!(validate_condition_state("X", BikeCondition::Poor, ResourceState::Available).is_err());
        assert!(validate_condition_state("X", BikeCondition::Poor, ResourceState::Maintenance).is_ok());
        assert!(validate_condition_state("X", BikeCondition::Good, ResourceState::Available).is_ok());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
