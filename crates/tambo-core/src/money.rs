//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer céntimos (1/100 of a sol)                        │
//! │    S/ 118.00 → 11800                                                    │
//! │    IGV split: 10000 base + 1800 tax, always summing back to 11800       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tambo_core::money::Money;
//!
//! let price = Money::from_cents(1099); // S/ 10.99
//! let doubled = price * 2;             // S/ 21.98
//! assert_eq!(doubled.cents(), 2198);
//! assert_eq!(price.to_string(), "S/ 10.99");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Rounding
// =============================================================================

/// Integer division rounding half away from zero.
///
/// `den` must be positive.
fn round_div(num: i128, den: i128) -> i64 {
    let half = den / 2;
    let q = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    q as i64
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in céntimos (PEN).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values for voids, refunds, discounts
/// - **Tuple struct**: zero-cost abstraction over i64
/// - Records in `types` keep raw `*_cents: i64` columns; this type is used
///   wherever arithmetic happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from céntimos.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from soles and céntimos.
    ///
    /// ## Example
    /// ```rust
    /// use tambo_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in céntimos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole soles portion.
    #[inline]
    pub const fn soles(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the céntimos portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Clamps negative amounts to zero.
    #[inline]
    pub fn non_negative(self) -> Money {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }

    /// Returns `rate` of this amount, rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use tambo_core::money::{Money, TaxRate};
    ///
    /// // ONP 13% of S/ 1,500.00
    /// let onp = Money::from_cents(150_000).percentage(TaxRate::from_bps(1300));
    /// assert_eq!(onp.cents(), 19_500);
    /// ```
    pub fn percentage(&self, rate: TaxRate) -> Money {
        Money(round_div(self.0 as i128 * rate.bps() as i128, 10_000))
    }

    /// Splits a tax-inclusive amount into `(base, tax)`.
    ///
    /// ## How It Works
    /// ```text
    /// total = 11800, IGV 18%
    ///      │
    ///      ▼
    /// base = round(11800 × 10000 / 11800) = 10000
    /// tax  = total − base                 =  1800
    /// ```
    /// The tax is derived by subtraction, so `base + tax == total` holds
    /// for every amount, including one-céntimo remainders.
    pub fn split_inclusive(&self, rate: TaxRate) -> (Money, Money) {
        let denom = 10_000i128 + rate.bps() as i128;
        let base = Money(round_div(self.0 as i128 * 10_000, denom));
        (base, *self - base)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Divides by `parts`, rounding half away from zero.
    ///
    /// Used for daily rates (salary / 30). `parts` must be positive.
    pub fn divide(&self, parts: i64) -> Money {
        Money(round_div(self.0 as i128, parts.max(1) as i128))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug/receipt formatting: `S/ 1234.50`, `-S/ 5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}S/ {}.{:02}", sign, self.soles().abs(), self.cents_part())
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// A rate in basis points (1 bps = 0.01%).
///
/// Used for IGV (1800), pension contributions (ONP 1300, AFP fund 1000),
/// EsSalud (900) and discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

impl Add for TaxRate {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        TaxRate(self.0 + other.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
