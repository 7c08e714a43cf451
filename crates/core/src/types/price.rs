//! Type-safe price representation using decimal arithmetic.
//!
//! The cart service reports prices as bare decimal amounts in the store
//! currency. Cached cart records may carry the amount as a JSON number or as a
//! numeric string, so [`Price::lenient`] accepts both and falls back to zero.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when strictly parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),
    /// The amount is negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
}

/// A non-negative amount in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Parse a price from a JSON value, defaulting to zero.
    ///
    /// Numbers and numeric strings are accepted. Anything else (null, bool,
    /// garbage strings, negative amounts) yields [`Price::ZERO`].
    #[must_use]
    pub fn lenient(value: &serde_json::Value) -> Self {
        let parsed = match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Decimal::from)
                .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
            serde_json::Value::String(s) => s.trim().parse::<Decimal>().ok(),
            _ => None,
        };
        parsed.and_then(|d| Self::new(d).ok()).unwrap_or(Self::ZERO)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = s
            .trim()
            .parse::<Decimal>()
            .map_err(|_| PriceError::Invalid(s.to_string()))?;
        Self::new(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_lenient_accepts_numbers_and_strings() {
        assert_eq!(Price::lenient(&json!(50)), "50".parse().unwrap());
        assert_eq!(Price::lenient(&json!("19.99")), "19.99".parse().unwrap());
        assert_eq!(Price::lenient(&json!(12.5)), "12.5".parse().unwrap());
    }

    #[test]
    fn test_lenient_defaults_to_zero() {
        assert_eq!(Price::lenient(&json!(null)), Price::ZERO);
        assert_eq!(Price::lenient(&json!("abc")), Price::ZERO);
        assert_eq!(Price::lenient(&json!(true)), Price::ZERO);
        assert_eq!(Price::lenient(&json!(-3)), Price::ZERO);
    }

    #[test]
    fn test_strict_parse_rejects_negative() {
        assert!(matches!("-1".parse::<Price>(), Err(PriceError::Negative(_))));
        assert!(matches!("x".parse::<Price>(), Err(PriceError::Invalid(_))));
    }

    #[test]
    fn test_times_and_sum() {
        let unit: Price = "2.50".parse().unwrap();
        let total: Price = [unit.times(2), unit.times(1)].into_iter().sum();
        assert_eq!(total, "7.5".parse().unwrap());
        assert_eq!(total.to_string(), "7.50");
    }
}
