use std::time::Duration;

use feedrouter::config::ValidationConfig;
use feedrouter::events::tick::RejectionReason;
use feedrouter::router::validator::{cross_source_delta, validate};
use feedrouter::types::asset::AssetClass;
use feedrouter::types::price::Price;

use crate::common::{at_secs, price_tick, FALLBACK, PRIMARY};

fn config() -> ValidationConfig {
    ValidationConfig::default()
}

#[test]
fn rejects_non_positive_price() {
    let tick = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 0.0, at_secs(0), at_secs(0));
    assert_eq!(
        validate(&tick, None, &config()),
        Err(RejectionReason::InvalidPrice)
    );

    let tick = price_tick(PRIMARY, "BTC", AssetClass::Crypto, -42.0, at_secs(0), at_secs(0));
    assert_eq!(
        validate(&tick, None, &config()),
        Err(RejectionReason::InvalidPrice)
    );
}

#[test]
fn rejects_decimal_placement_bug() {
    // A provider emitting price * 10^3 must not pass the step check.
    let prior = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 50.0, at_secs(0), at_secs(0));
    let tick = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 50_000.0, at_secs(1), at_secs(1));
    assert_eq!(
        validate(&tick, Some(&prior), &config()),
        Err(RejectionReason::InvalidPrice)
    );
}

#[test]
fn accepts_move_within_step_limit() {
    let prior = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 100.0, at_secs(0), at_secs(0));
    let tick = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 119.0, at_secs(1), at_secs(1));
    assert_eq!(validate(&tick, Some(&prior), &config()), Ok(()));
}

#[test]
fn rejects_stale_crypto_tick() {
    // Crypto staleness threshold is 60s; this tick is 61s old at ingestion.
    let tick = price_tick(
        PRIMARY,
        "BTC",
        AssetClass::Crypto,
        50_000.0,
        at_secs(0),
        at_secs(61),
    );
    assert_eq!(validate(&tick, None, &config()), Err(RejectionReason::Stale));
}

#[test]
fn tolerates_delayed_stock_feed() {
    // The same 15-minute delay that would kill a crypto tick is fine for a
    // delayed stock feed.
    let tick = price_tick(
        FALLBACK,
        "AAPL",
        AssetClass::Stock,
        190.0,
        at_secs(0),
        at_secs(15 * 60),
    );
    assert_eq!(validate(&tick, None, &config()), Ok(()));
}

#[test]
fn rejects_source_clock_ahead_of_skew_tolerance() {
    let tick = price_tick(
        PRIMARY,
        "BTC",
        AssetClass::Crypto,
        50_000.0,
        at_secs(10),
        at_secs(0),
    );
    assert_eq!(
        validate(&tick, None, &config()),
        Err(RejectionReason::SchemaError)
    );
}

#[test]
fn accepts_source_clock_within_skew_tolerance() {
    let tick = price_tick(
        PRIMARY,
        "BTC",
        AssetClass::Crypto,
        50_000.0,
        at_secs(3),
        at_secs(0),
    );
    assert_eq!(validate(&tick, None, &config()), Ok(()));
}

#[test]
fn cross_source_delta_flags_disagreement() {
    let routed = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 100.0, at_secs(0), at_secs(0));
    let candidate = price_tick(FALLBACK, "BTC", AssetClass::Crypto, 107.0, at_secs(1), at_secs(1));

    let delta = cross_source_delta(&routed, &candidate, 0.05).expect("should flag 7% delta");
    assert!((delta - 0.07).abs() < 1e-9);
}

#[test]
fn cross_source_delta_ignores_small_disagreement() {
    let routed = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 100.0, at_secs(0), at_secs(0));
    let candidate = price_tick(FALLBACK, "BTC", AssetClass::Crypto, 103.0, at_secs(1), at_secs(1));
    assert_eq!(cross_source_delta(&routed, &candidate, 0.05), None);
}

#[test]
fn cross_source_delta_ignores_same_provider() {
    let routed = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 100.0, at_secs(0), at_secs(0));
    let candidate = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 150.0, at_secs(1), at_secs(1));
    assert_eq!(cross_source_delta(&routed, &candidate, 0.05), None);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any move within the step limit against a positive prior passes
        /// the range check.
        #[test]
        fn accepts_bounded_moves(base in 0.01f64..1_000_000.0, step in -0.19f64..0.19) {
            let prior = price_tick(PRIMARY, "BTC", AssetClass::Crypto, base, at_secs(0), at_secs(0));
            let tick = price_tick(
                PRIMARY,
                "BTC",
                AssetClass::Crypto,
                base * (1.0 + step),
                at_secs(1),
                at_secs(1),
            );
            prop_assert_eq!(validate(&tick, Some(&prior), &config()), Ok(()));
        }

        /// Price multiplied by 1000 is always rejected, whatever the base.
        #[test]
        fn rejects_thousandfold_jump(base in 0.01f64..1_000_000.0) {
            let prior = price_tick(PRIMARY, "BTC", AssetClass::Crypto, base, at_secs(0), at_secs(0));
            let tick = price_tick(
                PRIMARY,
                "BTC",
                AssetClass::Crypto,
                base * 1000.0,
                at_secs(1),
                at_secs(1),
            );
            prop_assert_eq!(
                validate(&tick, Some(&prior), &config()),
                Err(RejectionReason::InvalidPrice)
            );
        }
    }

    #[test]
    fn zero_price_always_invalid() {
        let tick = price_tick(PRIMARY, "BTC", AssetClass::Crypto, 0.0, at_secs(0), at_secs(0));
        assert_eq!(
            validate(&tick, None, &config()),
            Err(RejectionReason::InvalidPrice)
        );
        assert!(!Price::zero().is_positive());
    }
}
