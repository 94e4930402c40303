use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Traded volume, fixed-point with 8 decimal places.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    const MULTIPLIER: i64 = 100_000_000; // 10^8

    pub fn from_raw(value: i64) -> Self {
        Quantity(value)
    }

    pub fn raw_value(&self) -> i64 {
        self.0
    }

    pub fn from_f64(value: f64) -> Self {
        Quantity((value * Self::MULTIPLIER as f64).round() as i64)
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / Self::MULTIPLIER as f64
    }

    pub fn zero() -> Self {
        Quantity(0)
    }
}

impl Add for Quantity {
    type Output = Quantity;
    fn add(self, other: Quantity) -> Quantity {
        Quantity(self.0 + other.0)
    }
}

impl Sub for Quantity {
    type Output = Quantity;
    fn sub(self, other: Quantity) -> Quantity {
        Quantity(self.0 - other.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// Serialize an `Option<Quantity>` as a plain f64 on the wire.
pub mod opt_as_f64 {
    use super::Quantity;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        quantity: &Option<Quantity>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match quantity {
            Some(q) => serializer.serialize_some(&q.to_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Quantity>, D::Error> {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.map(Quantity::from_f64))
    }
}
