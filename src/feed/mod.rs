pub mod adapter;
pub mod baseline;
pub mod connectors;

use crate::events::tick::{PriceTick, RejectionReason};
use crate::feed::baseline::derive_baseline;
use crate::types::asset::AssetClass;
use crate::types::price::Price;
use crate::types::quantity::Quantity;
use crate::types::timestamp::Timestamp;

/// One observation as it came off the wire, before normalization.
#[derive(Clone, Debug)]
pub struct RawTick {
    pub provider_id: String,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub price: f64,
    pub previous_close: Option<f64>,
    /// Some providers supply percent change instead of a previous close.
    pub percent_change: Option<f64>,
    pub open: Option<f64>,
    pub volume: Option<f64>,
    /// Provider-reported observation time, ms since epoch.
    pub timestamp: u64,
    /// Local ingestion time, ms since epoch.
    pub received_at: u64,
}

impl RawTick {
    /// Normalize into a canonical tick. A previous close missing from the
    /// wire is recovered from the percent change when possible.
    pub fn normalize(&self) -> Result<PriceTick, RejectionReason> {
        if !self.price.is_finite() {
            return Err(RejectionReason::SchemaError);
        }
        let price = Price::from_f64(self.price);
        let previous_close = match self.previous_close {
            Some(pc) if pc.is_finite() => Some(Price::from_f64(pc)),
            Some(_) => return Err(RejectionReason::SchemaError),
            None => self
                .percent_change
                .and_then(|pct| derive_baseline(price, pct)),
        };
        Ok(PriceTick {
            symbol: self.symbol.clone(),
            asset_class: self.asset_class,
            price,
            previous_close,
            open_price: self.open.filter(|o| o.is_finite()).map(Price::from_f64),
            volume: self.volume.filter(|v| v.is_finite()).map(Quantity::from_f64),
            source_timestamp: Timestamp::from_millis(self.timestamp),
            received_timestamp: Timestamp::from_millis(self.received_at),
            provider_id: self.provider_id.clone(),
        })
    }
}
