use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Ledger-precision monetary amount, always carried at 8 fractional digits.
///
/// `Amount` never converts implicitly to or from a float. The only way to
/// reach chain-scale units (18 decimals for USDT, 9 for PLEX) is through
/// [`Amount::to_wei`] / [`WeiAmount::to_amount`], both of which round down.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn from_decimal(d: Decimal) -> Self {
        Self(d.round_dp(8))
    }

    pub fn try_from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Self::from_decimal(Decimal::from_str(s)?))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn max(self, other: Self) -> Self {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Saturating subtraction: never goes below zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        if self.0 <= other.0 {
            Amount::ZERO
        } else {
            Amount(self.0 - other.0)
        }
    }

    /// Converts to a chain-scale integer amount at `decimals`, truncating
    /// toward zero. This is the only path from ledger amounts to wei-scale
    /// values; it is deliberately lossy in the same direction a wallet UI
    /// would be (never rounds up what a transfer would actually move).
    pub fn to_wei(&self, decimals: u8) -> WeiAmount {
        let scaled = self.0 * Decimal::from(10u64.pow(decimals as u32));
        let truncated = scaled.trunc();
        WeiAmount(truncated.to_u128().unwrap_or(0))
    }

    pub fn from_f64_for_tests(v: f64) -> Self {
        Self::from_decimal(Decimal::from_f64(v).expect("finite literal"))
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

/// Chain-scale integer amount (u128), tagged with the number of decimals it
/// was produced at so [`WeiAmount::to_amount`] can't silently misinterpret
/// an 18-decimal USDT value as 9-decimal PLEX or vice versa.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct WeiAmount(u128);

impl WeiAmount {
    pub fn from_raw(value: u128) -> Self {
        Self(value)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn to_amount(&self, decimals: u8) -> Amount {
        let d = Decimal::from(self.0) / Decimal::from(10u64.pow(decimals as u32));
        Amount::from_decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_wei_truncates_not_rounds() {
        let a = Amount::try_from_str("1.999999999999999999").unwrap();
        let wei = a.to_wei(18);
        // 8 fractional digits retained by Amount, so this is really 1.99999999,
        // scaled by 1e18 and truncated.
        assert_eq!(wei.raw(), 1_999_999_990_000_000_000u128);
    }

    #[test]
    fn round_trip_through_wei_loses_no_precision_within_8dp() {
        let a = Amount::try_from_str("42.12345678").unwrap();
        let wei = a.to_wei(18);
        let back = wei.to_amount(18);
        assert_eq!(a, back);
    }

    #[test]
    fn saturating_sub_never_negative() {
        let a = Amount::try_from_str("5").unwrap();
        let b = Amount::try_from_str("10").unwrap();
        assert_eq!(a.saturating_sub(b), Amount::ZERO);
    }
}
