//! Fixed-point price representation.
//!
//! The matching engine keys its ladders by price, so the representation
//! must be `Ord` and cheaply `Copy` — a `BTreeMap<f64, _>` is a non-starter
//! because floats aren't `Ord`. [`Price`] stores currency units as an
//! integer count of hundredths ("ticks"), which gives exact comparisons and
//! round-trips cleanly through the decimal strings the wire format and CLI
//! use (e.g. `"100.5"`).

use std::fmt;
use std::str::FromStr;

/// One hundredth of a currency unit.
const TICK_SCALE: i64 = 100;

/// A price expressed as an exact integer number of ticks (1 tick = 0.01
/// currency unit). `Ord`/`Copy`/`Hash` so it can key a `BTreeMap` ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(into = "String")]
pub struct Price(i64);

/// Quantity of units on an order or trade. Always a positive integer while
/// resting; fractional quantities are a declared non-goal.
pub type Quantity = u64;

impl Price {
    /// Constructs a price directly from a tick count.
    pub const fn from_ticks(ticks: i64) -> Self {
        Price(ticks)
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Whole-currency-unit component, truncating toward zero.
    pub fn whole(self) -> i64 {
        self.0 / TICK_SCALE
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.0 < 0;
        let magnitude = self.0.unsigned_abs();
        let whole = magnitude / TICK_SCALE as u64;
        let frac = magnitude % TICK_SCALE as u64;
        if negative {
            write!(f, "-")?;
        }
        write!(f, "{whole}.{frac:02}")
    }
}

impl From<Price> for String {
    fn from(p: Price) -> String {
        p.to_string()
    }
}

/// Error returned when a string can't be parsed as a [`Price`].
#[derive(Debug, thiserror::Error)]
#[error("invalid price literal: {0:?}")]
pub struct ParsePriceError(String);

impl FromStr for Price {
    type Err = ParsePriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| ParsePriceError(s.to_string()))?;
        Price::try_from(value).map_err(|_| ParsePriceError(s.to_string()))
    }
}

impl<'de> serde::Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Num(f64),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Num(n) => Price::try_from(n).map_err(serde::de::Error::custom),
        }
    }
}

/// Error returned when an `f64` can't be represented exactly enough as ticks.
#[derive(Debug, thiserror::Error)]
#[error("price must be finite: {0}")]
pub struct NonFinitePrice(f64);

impl TryFrom<f64> for Price {
    type Error = NonFinitePrice;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(NonFinitePrice(value));
        }
        Ok(Price((value * TICK_SCALE as f64).round() as i64))
    }
}

impl From<Price> for f64 {
    fn from(p: Price) -> f64 {
        p.0 as f64 / TICK_SCALE as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_decimal_string() {
        let p: Price = "100.50".parse().unwrap();
        assert_eq!(p.to_string(), "100.50");
        let p2: Price = "100.5".parse().unwrap();
        assert_eq!(p, p2);
    }

    #[test]
    fn ordering_matches_numeric_value() {
        let low: Price = "99.00".parse().unwrap();
        let high: Price = "101.00".parse().unwrap();
        assert!(low < high);
    }

    #[test]
    fn rejects_non_finite() {
        assert!(Price::try_from(f64::NAN).is_err());
        assert!(Price::try_from(f64::INFINITY).is_err());
    }

    #[test]
    fn serde_round_trip() {
        let p: Price = "42.13".parse().unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"42.13\"");
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
