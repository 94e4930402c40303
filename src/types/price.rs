use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(i64); // Fixed-point with 8 decimal places

impl Price {
    const MULTIPLIER: i64 = 100_000_000; // 10^8

    pub fn from_raw(value: i64) -> Self {
        Price(value)
    }

    pub fn raw_value(&self) -> i64 {
        self.0
    }

    pub fn from_f64(value: f64) -> Self {
        Price((value * Self::MULTIPLIER as f64).round() as i64)
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / Self::MULTIPLIER as f64
    }

    pub fn zero() -> Self {
        Price(0)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn abs(&self) -> Self {
        Price(self.0.abs())
    }

    /// Relative difference against a non-zero baseline, as a fraction.
    pub fn relative_delta(&self, baseline: Price) -> f64 {
        if baseline.0 == 0 {
            return f64::INFINITY;
        }
        ((self.0 - baseline.0).abs() as f64) / (baseline.0.abs() as f64)
    }

    /// Percent change against a non-zero baseline, e.g. 2.5 for +2.5%.
    pub fn percent_change_from(&self, baseline: Price) -> Option<f64> {
        if baseline.0 == 0 {
            return None;
        }
        Some(((self.0 - baseline.0) as f64 / baseline.0 as f64) * 100.0)
    }
}

impl Add for Price {
    type Output = Price;
    fn add(self, other: Price) -> Price {
        Price(self.0 + other.0)
    }
}

impl Sub for Price {
    type Output = Price;
    fn sub(self, other: Price) -> Price {
        Price(self.0 - other.0)
    }
}

impl Mul<i64> for Price {
    type Output = Price;
    fn mul(self, scalar: i64) -> Price {
        Price(self.0 * scalar)
    }
}

impl Div<i64> for Price {
    type Output = Price;
    fn div(self, scalar: i64) -> Price {
        Price(self.0 / scalar)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// Serialize a `Price` as a plain f64 on the wire.
pub mod as_f64 {
    use super::Price;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(price: &Price, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(price.to_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Price, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Price::from_f64(value))
    }
}
