//! # Contract Numbers
//!
//! Formatting of human-readable contract numbers. Allocation of the counter
//! itself belongs to the record layer (`velorent-db`), which increments it
//! inside the same transaction that inserts the reservation.
//!
//! ## Format
//! ```text
//! {prefix}{year}/{number, zero padded}
//!
//! RENT/2024/00001
//! RENT/2024/00002
//! ```

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Sequence code under which contract numbers are allocated.
pub const RENTAL_SEQUENCE_CODE: &str = "rental.order";

/// How contract numbers are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSequence {
    /// Text before the year, e.g. `RENT/`.
    pub prefix: String,

    /// Minimum number of digits of the counter.
    pub padding: usize,
}

impl Default for ContractSequence {
    fn default() -> Self {
        ContractSequence {
            prefix: "RENT/".to_string(),
            padding: 5,
        }
    }
}

impl ContractSequence {
    pub fn new(prefix: impl Into<String>, padding: usize) -> ValidationResult<Self> {
        let sequence = ContractSequence {
            prefix: prefix.into(),
            padding,
        };
        sequence.validate()?;
        Ok(sequence)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.prefix.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "contract prefix".to_string(),
            });
        }
        if self.padding == 0 || self.padding > 12 {
            return Err(ValidationError::OutOfRange {
                field: "contract padding".to_string(),
                min: 1,
                max: 12,
            });
        }
        Ok(())
    }

    /// Renders the `number`-th contract of the year of `at`.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use velorent_core::sequence::ContractSequence;
    ///
    /// let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    /// assert_eq!(ContractSequence::default().format(7, at), "RENT/2024/00007");
    /// ```
    pub fn format(&self, number: i64, at: DateTime<Utc>) -> String {
        format!(
            "{}{}/{:0width$}",
            self.prefix,
            at.year(),
            number,
            width = self.padding
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_pads_counter() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let seq = ContractSequence::new("LOC/", 3).unwrap();
        assert_eq!(seq.format(1, at), "LOC/2025/001");
        assert_eq!(seq.format(1234, at), "LOC/2025/1234");
    }

    #[test]
    fn test_invalid_sequence_rejected() {
        assert!(ContractSequence::new("", 5).is_err());
        assert!(ContractSequence::new("RENT/", 0).is_err());
    }
}
