#![allow(dead_code)]

use std::time::Duration;

use feedrouter::config::loader::AppConfig;
use feedrouter::config::{
    BackoffConfig, ConnectionType, HealthConfig, ProviderConfig, ServerConfig, SymbolMapping,
    ThrottleConfig, ValidationConfig,
};
use feedrouter::events::tick::PriceTick;
use feedrouter::feed::RawTick;
use feedrouter::types::asset::AssetClass;
use feedrouter::types::price::Price;
use feedrouter::types::timestamp::Timestamp;

pub const PRIMARY: &str = "pushfeed";
pub const FALLBACK: &str = "pollfeed";

/// Base instant for deterministic clock math in tests.
pub const T0_MS: u64 = 1_700_000_000_000;

pub fn at(offset: Duration) -> Timestamp {
    Timestamp::from_millis(T0_MS + offset.as_millis() as u64)
}

pub fn at_secs(offset_secs: u64) -> Timestamp {
    at(Duration::from_secs(offset_secs))
}

fn mappings(symbols: &[(&str, AssetClass)]) -> Vec<SymbolMapping> {
    symbols
        .iter()
        .map(|(symbol, asset_class)| SymbolMapping {
            symbol: symbol.to_string(),
            asset_class: *asset_class,
        })
        .collect()
}

/// Two-provider setup mirroring production: a push primary and a polling
/// fallback, both serving BTC, ETH and AAPL.
pub fn test_config() -> AppConfig {
    let symbols = [
        ("BTC", AssetClass::Crypto),
        ("ETH", AssetClass::Crypto),
        ("AAPL", AssetClass::Stock),
    ];
    AppConfig {
        providers: vec![
            ProviderConfig {
                provider_id: PRIMARY.to_string(),
                connection: ConnectionType::WebSocket {
                    url: "wss://primary.test/ticks".to_string(),
                },
                enabled: true,
                healthy_window: Duration::from_secs(30),
                symbols: mappings(&symbols),
            },
            ProviderConfig {
                provider_id: FALLBACK.to_string(),
                connection: ConnectionType::RestPolling {
                    url: "https://fallback.test/quotes".to_string(),
                    interval: Duration::from_secs(15),
                },
                enabled: true,
                healthy_window: Duration::from_secs(45),
                symbols: mappings(&symbols),
            },
        ],
        health: HealthConfig::default(),
        validation: ValidationConfig::default(),
        throttle: ThrottleConfig::default(),
        backoff: BackoffConfig::default(),
        server: ServerConfig::default(),
    }
}

/// A raw wire tick observed and received at the same instant.
pub fn raw_tick(
    provider: &str,
    symbol: &str,
    asset_class: AssetClass,
    price: f64,
    at: Timestamp,
) -> RawTick {
    RawTick {
        provider_id: provider.to_string(),
        symbol: symbol.to_string(),
        asset_class,
        price,
        previous_close: None,
        percent_change: None,
        open: None,
        volume: None,
        timestamp: at.as_millis(),
        received_at: at.as_millis(),
    }
}

pub fn price_tick(
    provider: &str,
    symbol: &str,
    asset_class: AssetClass,
    price: f64,
    source: Timestamp,
    received: Timestamp,
) -> PriceTick {
    PriceTick {
        symbol: symbol.to_string(),
        asset_class,
        price: Price::from_f64(price),
        previous_close: None,
        open_price: None,
        volume: None,
        source_timestamp: source,
        received_timestamp: received,
        provider_id: provider.to_string(),
    }
}
