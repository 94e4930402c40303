use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::asset::AssetClass;

pub mod loader;

/// One upstream provider in priority order: the first enabled entry is the
/// primary source, the second is the fallback.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub connection: ConnectionType,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Silence tolerated before the provider is no longer HEALTHY. Poll
    /// providers should scale this with their polling interval.
    #[serde(default = "default_healthy_window")]
    pub healthy_window: Duration,
    pub symbols: Vec<SymbolMapping>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ConnectionType {
    WebSocket { url: String },
    RestPolling { url: String, interval: Duration },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SymbolMapping {
    pub symbol: String,
    pub asset_class: AssetClass,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Period of the background health sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: Duration,
    /// Silence after which a provider is UNAVAILABLE for a symbol.
    #[serde(default = "default_unavailable_window")]
    pub unavailable_window: Duration,
    /// Consecutive failures before a provider is DEGRADED.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Continuous primary health required before failing back.
    #[serde(default = "default_stabilization_delay")]
    pub stabilization_delay: Duration,
    /// Idle per-symbol state is dropped after this long.
    #[serde(default = "default_retention")]
    pub retention: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            sweep_interval: default_sweep_interval(),
            unavailable_window: default_unavailable_window(),
            max_consecutive_failures: default_max_consecutive_failures(),
            stabilization_delay: default_stabilization_delay(),
            retention: default_retention(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Max single-step move relative to the prior accepted tick, as a
    /// fraction (0.20 = 20%). Guards against decimal-placement bugs upstream.
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    /// Cross-source disagreement that raises a discrepancy signal (fraction).
    #[serde(default = "default_cross_source_delta")]
    pub cross_source_delta: f64,
    /// Optional emergency threshold: a cross-source disagreement above this
    /// forces failover to the disagreeing provider if it is HEALTHY.
    /// Disabled by default.
    #[serde(default)]
    pub emergency_discrepancy: Option<f64>,
    /// Tolerated source-clock lead over local time.
    #[serde(default = "default_clock_skew_tolerance")]
    pub clock_skew_tolerance: Duration,
    #[serde(default)]
    pub staleness: StalenessConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            max_step: default_max_step(),
            cross_source_delta: default_cross_source_delta(),
            emergency_discrepancy: None,
            clock_skew_tolerance: default_clock_skew_tolerance(),
            staleness: StalenessConfig::default(),
        }
    }
}

/// Per-asset-class tick age limits. Delayed stock feeds legitimately lag by
/// minutes; crypto push feeds should not.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StalenessConfig {
    #[serde(default = "default_staleness_crypto")]
    pub crypto: Duration,
    #[serde(default = "default_staleness_stock")]
    pub stock: Duration,
    #[serde(default = "default_staleness_forex")]
    pub forex: Duration,
    #[serde(default = "default_staleness_commodity")]
    pub commodity: Duration,
    #[serde(default = "default_staleness_index")]
    pub index: Duration,
}

impl StalenessConfig {
    pub fn for_class(&self, class: AssetClass) -> Duration {
        match class {
            AssetClass::Crypto => self.crypto,
            AssetClass::Stock => self.stock,
            AssetClass::Forex => self.forex,
            AssetClass::Commodity => self.commodity,
            AssetClass::Index => self.index,
        }
    }
}

impl Default for StalenessConfig {
    fn default() -> Self {
        StalenessConfig {
            crypto: default_staleness_crypto(),
            stock: default_staleness_stock(),
            forex: default_staleness_forex(),
            commodity: default_staleness_commodity(),
            index: default_staleness_index(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ThrottleConfig {
    /// Max coalesced messages per second per symbol.
    #[serde(default = "default_max_messages_per_sec")]
    pub max_messages_per_sec: u32,
}

impl ThrottleConfig {
    /// Length of one coalescing window.
    pub fn window(&self) -> Duration {
        Duration::from_millis(1000 / self.max_messages_per_sec.max(1) as u64)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            max_messages_per_sec: default_max_messages_per_sec(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_initial")]
    pub initial: Duration,
    #[serde(default = "default_backoff_cap")]
    pub cap: Duration,
    /// Reconnect attempts before an adapter gives up until operator reset.
    #[serde(default = "default_backoff_max_attempts")]
    pub max_attempts: u32,
    /// Per-attempt connect and per-read timeout.
    #[serde(default = "default_io_timeout")]
    pub io_timeout: Duration,
}

impl BackoffConfig {
    /// Delay before reconnect attempt `attempt` (0-based): doubles from
    /// `initial`, capped at `cap`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.min(16);
        let delay = self.initial.saturating_mul(1u32 << exp);
        delay.min(self.cap)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            initial: default_backoff_initial(),
            cap: default_backoff_cap(),
            max_attempts: default_backoff_max_attempts(),
            io_timeout: default_io_timeout(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_healthy_window() -> Duration {
    Duration::from_secs(30)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_unavailable_window() -> Duration {
    Duration::from_secs(60)
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_stabilization_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_retention() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_max_step() -> f64 {
    0.20
}

fn default_cross_source_delta() -> f64 {
    0.05
}

fn default_clock_skew_tolerance() -> Duration {
    Duration::from_secs(5)
}

fn default_staleness_crypto() -> Duration {
    Duration::from_secs(60)
}

fn default_staleness_stock() -> Duration {
    Duration::from_secs(20 * 60)
}

fn default_staleness_forex() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_staleness_commodity() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_staleness_index() -> Duration {
    Duration::from_secs(20 * 60)
}

fn default_max_messages_per_sec() -> u32 {
    20
}

fn default_backoff_initial() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_cap() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_max_attempts() -> u32 {
    10
}

fn default_io_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
