use std::time::Duration;

use feedrouter::config::{BackoffConfig, StalenessConfig, ThrottleConfig};
use feedrouter::error::Error;
use feedrouter::types::asset::AssetClass;

use crate::common::{test_config, FALLBACK, PRIMARY};

#[test]
fn throttle_window_follows_rate() {
    let throttle = ThrottleConfig {
        max_messages_per_sec: 20,
    };
    assert_eq!(throttle.window(), Duration::from_millis(50));

    let throttle = ThrottleConfig {
        max_messages_per_sec: 0,
    };
    // A zero rate must not divide by zero.
    assert_eq!(throttle.window(), Duration::from_millis(1000));
}

#[test]
fn backoff_doubles_and_caps() {
    let backoff = BackoffConfig::default();
    assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(1));
    assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(2));
    assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(4));
    assert_eq!(backoff.delay_for_attempt(4), Duration::from_secs(16));
    assert_eq!(backoff.delay_for_attempt(5), Duration::from_secs(30));
    assert_eq!(backoff.delay_for_attempt(30), Duration::from_secs(30));
}

#[test]
fn staleness_defaults_per_asset_class() {
    let staleness = StalenessConfig::default();
    assert_eq!(staleness.for_class(AssetClass::Crypto), Duration::from_secs(60));
    assert_eq!(
        staleness.for_class(AssetClass::Stock),
        Duration::from_secs(20 * 60)
    );
}

#[test]
fn provider_priority_order() {
    let config = test_config();
    assert_eq!(config.primary().provider_id, PRIMARY);
    assert_eq!(config.fallback().unwrap().provider_id, FALLBACK);
}

#[test]
fn rejects_empty_and_oversized_provider_sets() {
    let mut config = test_config();
    for provider in &mut config.providers {
        provider.enabled = false;
    }
    assert!(matches!(
        config.validate(),
        Err(Error::NoProvidersConfigured)
    ));

    let mut config = test_config();
    let mut third = config.providers[0].clone();
    third.provider_id = "spare".to_string();
    config.providers.push(third);
    assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
}

#[test]
fn disabled_provider_is_skipped_in_priority() {
    let mut config = test_config();
    config.providers[0].enabled = false;
    assert_eq!(config.primary().provider_id, FALLBACK);
    assert!(config.fallback().is_none());
}
