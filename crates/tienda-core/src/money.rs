//! # Money Module
//!
//! Integer money for the commerce engine.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                         │
//! │                                                                     │
//! │  0.1 + 0.2 = 0.30000000000000004   ❌                               │
//! │  $10.00 / 3 = $3.33 (×3 = $9.99)   → lost $0.01                    │
//! │                                                                     │
//! │  OUR SOLUTION: integer cents + integer basis points                 │
//! │  A 10% discount on 100000 cents is (100000 × 1000) / 10000 cents,  │
//! │  rounded half-up - deterministic on every machine                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every subtotal, discount, tax, total, deposit and commission in the
//! system flows through [`Money`]; every percentage (discount codes,
//! commission rules) flows through [`RateBps`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money
// =============================================================================

/// A monetary value in the smallest currency unit (centavos).
///
/// Signed so that compensating entries (refunds, adjustments) can be
/// expressed, but the engine's invariants keep every persisted total
/// non-negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Clamps a would-be-negative amount to zero.
    #[inline]
    pub fn clamp_non_negative(self) -> Money {
        Money(self.0.max(0))
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Money {
    type Output = Money;
    fn mul(self, rhs: i64) -> Money {
        Money(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl fmt::Display for Money {
    /// Formats as a decimal amount, e.g. `1099` cents → `$10.99`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

// =============================================================================
// RateBps
// =============================================================================

/// A percentage rate in basis points (1 bps = 0.01%).
///
/// 1000 bps = 10%. Used for percentage discount codes and percentage
/// commission rules, keeping all rate math in integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBps(u32);

impl RateBps {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        RateBps(bps)
    }

    /// Builds a rate from an untrusted `i64`, clamping into the `u32`
    /// range. Stored rates are only constrained to be non-negative.
    #[inline]
    pub const fn from_bps_i64(bps: i64) -> Self {
        if bps < 0 {
            RateBps(0)
        } else if bps > u32::MAX as i64 {
            RateBps(u32::MAX)
        } else {
            RateBps(bps as u32)
        }
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Applies this rate to an amount, rounding half-up to whole cents.
    ///
    /// `apply(1000 bps, $100.00)` = `$10.00`; `apply(333 bps, $0.99)` = 3c.
    pub fn apply(&self, amount: Money) -> Money {
        let raw = amount.cents() as i128 * self.0 as i128;
        // Half-up rounding against the 10000 bps divisor.
        let rounded = (raw + 5000) / 10000;
        Money::from_cents(rounded as i64)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
