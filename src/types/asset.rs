use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of tradable instrument sharing staleness and throttle policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    Crypto,
    Stock,
    Forex,
    Commodity,
    Index,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Crypto => "CRYPTO",
            AssetClass::Stock => "STOCK",
            AssetClass::Forex => "FOREX",
            AssetClass::Commodity => "COMMODITY",
            AssetClass::Index => "INDEX",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
