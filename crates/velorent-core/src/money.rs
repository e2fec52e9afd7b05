//! # Money Module
//!
//! Provides the `Money` type for rental rates and subtotals.
//!
//! ## Integer Cents, Fractional Quantities
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rates are stored in cents:        daily rate 25.00 € → 2500           │
//! │  Quantities may be fractional:     hourly 1.5 h, weekly 1.3 weeks      │
//! │                                                                         │
//! │  subtotal = round(rate_cents × quantity)                               │
//! │    2500 × 2.0  = 5000  → 50.00 €                                       │
//! │     500 × 1.25 =  625  →  6.25 €                                       │
//! │   10000 × 1.3  = 13000 → 130.00 €                                      │
//! │                                                                         │
//! │  The only float step is the final scale; every stored amount is an     │
//! │  integer number of cents.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use velorent_core::money::Money;
//!
//! let daily = Money::from_cents(2500); // 25.00 €
//! let subtotal = daily.scale(2.0);
//! assert_eq!(subtotal.cents(), 5000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in euro cents.
///
/// ## Design Decisions
/// - **i64 (signed)**: keeps arithmetic closed under subtraction
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use velorent_core::money::Money;
    ///
    /// let rate = Money::from_cents(2500);
    /// assert_eq!(rate.cents(), 2500);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from euros and cents.
    ///
    /// ## Example
    /// ```rust
    /// use velorent_core::money::Money;
    ///
    /// let rate = Money::from_major_minor(25, 50); // 25.50 €
    /// assert_eq!(rate.cents(), 2550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-euro portion.
    #[inline]
    pub const fn euros(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a fractional billing quantity, rounding to the cent.
    ///
    /// Half cents round away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use velorent_core::money::Money;
    ///
    /// let hourly = Money::from_cents(500); // 5.00 €/h
    /// assert_eq!(hourly.scale(1.5).cents(), 750);
    /// assert_eq!(hourly.scale(0.0).cents(), 0);
    /// ```
    pub fn scale(&self, quantity: f64) -> Money {
        Money((self.0 as f64 * quantity).round() as i64)
    }

    /// Returns `self` unless it is zero, in which case `fallback`.
    ///
    /// Used for rate inheritance: a bike rate left at zero takes the
    /// category rate.
    #[inline]
    pub const fn or_if_zero(self, fallback: Money) -> Money {
        if self.0 == 0 {
            fallback
        } else {
            self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `25.00 €`. Debug/log output only; the host formats amounts
/// for display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02} €", sign, self.euros().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a whole number of units.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(2550);
        assert_eq!(money.cents(), 2550);
        assert_eq!(money.euros(), 25);
        assert_eq!(money.cents_part(), 50);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(25, 0).cents(), 2500);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(2500).to_string(), "25.00 €");
        assert_eq!(Money::from_cents(5).to_string(), "0.05 €");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50 €");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
    }

    #[test]
    fn test_scale_fractional_quantity() {
        let weekly = Money::from_cents(10000);
        assert_eq!(weekly.scale(1.3).cents(), 13000);

        // 5.00 €/h for 20 minutes = 1.666... €
        let hourly = Money::from_cents(500);
        assert_eq!(hourly.scale(1.0 / 3.0).cents(), 167);
    }

    #[test]
    fn test_or_if_zero() {
        let category = Money::from_cents(2500);
        assert_eq!(Money::zero().or_if_zero(category), category);
        assert_eq!(Money::from_cents(3000).or_if_zero(category).cents(), 3000);
    }
}
