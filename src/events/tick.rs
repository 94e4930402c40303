use serde::{Deserialize, Serialize};

use crate::events::route::RouteState;
use crate::types::asset::AssetClass;
use crate::types::price::{self, Price};
use crate::types::quantity::{self, Quantity};
use crate::types::timestamp::Timestamp;

/// One normalized market-data observation. Created by a provider adapter,
/// immutable afterwards, discarded once routed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub price: Price,
    pub previous_close: Option<Price>,
    pub open_price: Option<Price>,
    pub volume: Option<Quantity>,
    /// Time the provider says the observation occurred.
    pub source_timestamp: Timestamp,
    /// Local ingestion time.
    pub received_timestamp: Timestamp,
    pub provider_id: String,
}

impl PriceTick {
    /// Age of the observation at ingestion.
    pub fn age(&self) -> std::time::Duration {
        self.received_timestamp - self.source_timestamp
    }

    pub fn change_percent(&self) -> Option<f64> {
        self.previous_close
            .and_then(|prev| self.price.percent_change_from(prev))
    }
}

/// Why a tick was refused by the validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    InvalidPrice,
    Stale,
    SchemaError,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::InvalidPrice => "INVALID_PRICE",
            RejectionReason::Stale => "STALE",
            RejectionReason::SchemaError => "SCHEMA_ERROR",
        }
    }
}

/// The payload fanned out to subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedTick {
    pub symbol: String,
    pub asset_class: AssetClass,
    #[serde(with = "price::as_f64")]
    pub price: Price,
    pub change_percent: Option<f64>,
    #[serde(with = "quantity::opt_as_f64", default)]
    pub volume: Option<Quantity>,
    pub timestamp: Timestamp,
    pub source_state: RouteState,
    pub provider_id: String,
}

impl RoutedTick {
    pub fn from_tick(tick: &PriceTick, source_state: RouteState) -> Self {
        RoutedTick {
            symbol: tick.symbol.clone(),
            asset_class: tick.asset_class,
            price: tick.price,
            change_percent: tick.change_percent(),
            volume: tick.volume,
            timestamp: tick.source_timestamp,
            source_state,
            provider_id: tick.provider_id.clone(),
        }
    }
}
