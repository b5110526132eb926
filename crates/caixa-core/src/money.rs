//! # Amounts in Centavos
//!
//! Every amount in the ledger is an `i64` count of the smallest currency
//! unit. Sums of sale lines, installment splits and ledger balances are
//! exact; the only rounding step is [`Money::divide_rounded`], and the
//! schedule generator puts its remainder on the last installment:
//!
//! ```text
//! 100000 / 3 ──► 33333 + 33333 + 33334 = 100000
//! ```
//!
//! ## Usage
//! ```rust
//! use caixa_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let line = price * 3;                // 32.97
//! assert_eq!(line.cents(), 3297);
//!
//! // Decimal strings only at the presentation boundary
//! let typed: Money = "150.50".parse().unwrap();
//! assert_eq!(typed.cents(), 15_050);
//! assert_eq!(typed.to_string(), "150.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A signed amount in centavos. Negative values only appear in balances.
///
/// Serialized as a bare integer of cents.
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  SaleItem.unit_price × quantity ──► Sale.total                          │
/// │                                                                         │
/// │  Sale.total − down_payment ──► financeable ──► Installment.amount × N  │
/// │                                                                         │
/// │  Payment.amount ──► Installment.paid_amount ──► CashFlowEntry.amount   │
/// │                                                                         │
/// │  EVERY monetary value in the ledger flows through this type            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// `(reais, centavos)`; a negative amount carries its sign on `major`.
    ///
    /// ```rust
    /// use caixa_core::money::Money;
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

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole reais, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Centavos part, 0 to 99.
    #[inline]
    pub const fn minor(&self) -> i64 {
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

    /// Line total for `qty` units.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Divides by `parts` and rounds to the nearest cent, halves away from zero.
    ///
    /// This is the "round to 2 decimal places" step of installment math.
    /// The caller is responsible for placing the remainder.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// // 1000.00 / 3 = 333.333… → 333.33
    /// assert_eq!(Money::from_cents(100_000).divide_rounded(3).cents(), 33_333);
    /// // 2.00 / 3 = 0.666… → 0.67
    /// assert_eq!(Money::from_cents(200).divide_rounded(3).cents(), 67);
    /// // 0.05 / 2 = 0.025 → 0.03
    /// assert_eq!(Money::from_cents(5).divide_rounded(2).cents(), 3);
    /// ```
    ///
    /// ## Panics
    /// Panics if `parts` is zero.
    pub fn divide_rounded(&self, parts: u32) -> Money {
        let value = self.0 as i128;
        let parts = parts as i128;
        let quotient = (2 * value.abs() + parts) / (2 * parts);
        let signed = if value < 0 { -quotient } else { quotient };
        Money(signed as i64)
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
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering (`151.00`, `-5.50`), no currency symbol.
///
/// Currency symbols and locale formatting belong to the presentation layer
/// (see `LedgerConfig::format_currency` in caixa-ledger).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Parses decimal input such as `"150"`, `"150.5"`, `"150.50"` or `"-3.10"`.
///
/// More than two fractional digits are rejected rather than rounded.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };

        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected digits before the decimal point"));
        }
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("at most two decimal places"));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| invalid("amount is too large"))?;
        let minor: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid("bad cents"))? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid("bad cents"))?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("amount is too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
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

/// Multiplication by i64 (quantities, installment counts).
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

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_minor_parts() {
        let price = Money::from_cents(15_990);
        assert_eq!(price.major(), 159);
        assert_eq!(price.minor(), 90);
        assert_eq!(Money::from_major_minor(-5, 50).minor(), 50);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!("1000.00".parse::<Money>().unwrap().cents(), 100_000);
        assert_eq!("1000".parse::<Money>().unwrap().cents(), 100_000);
        assert_eq!("0.5".parse::<Money>().unwrap().cents(), 50);
        assert_eq!("-3.10".parse::<Money>().unwrap().cents(), -310);

        assert!("".parse::<Money>().is_err());
        assert!("1.234".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
        assert!("1,50".parse::<Money>().is_err());
    }

    #[test]
    fn test_remaining_balance_arithmetic() {
        let amount = Money::from_cents(30_000);
        let mut paid = Money::from_cents(15_000);
        paid += Money::from_cents(10_000);

        assert_eq!(amount - paid, Money::from_cents(5_000));
        assert_eq!(Money::from_cents(4_990) * 2, Money::from_cents(9_980));
        assert_eq!((amount - paid).min(Money::from_cents(7_000)).cents(), 5_000);
    }

    #[test]
    fn test_sum() {
        let amounts = [
            Money::from_cents(33_333),
            Money::from_cents(33_333),
            Money::from_cents(33_334),
        ];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.cents(), 100_000);
    }

    #[test]
    fn test_divide_rounded_half_away_from_zero() {
        assert_eq!(Money::from_cents(90_000).divide_rounded(3).cents(), 30_000);
        assert_eq!(Money::from_cents(100_000).divide_rounded(3).cents(), 33_333);
        assert_eq!(Money::from_cents(200).divide_rounded(3).cents(), 67);
        assert_eq!(Money::from_cents(5).divide_rounded(2).cents(), 3);
        assert_eq!(Money::from_cents(-5).divide_rounded(2).cents(), -3);
        assert_eq!(Money::from_cents(7).divide_rounded(1).cents(), 7);
    }

    #[test]
    fn test_sign_checks() {
        assert!(Money::default().is_zero());
        assert!(!Money::zero().is_positive());

        let overdrawn = Money::from_cents(2_500) - Money::from_cents(3_000);
        assert!(overdrawn.is_negative());
        assert_eq!(overdrawn.abs().cents(), 500);
    }

    /// Documents why installment math never uses plain truncating division:
    /// three truncated thirds of 10.00 lose a cent.
    #[test]
    fn test_truncating_split_loses_a_cent() {
        let ten = Money::from_cents(1000);
        let truncated = Money::from_cents(ten.cents() / 3) * 3;

        assert_eq!(ten - truncated, Money::from_cents(1));
    }
}
