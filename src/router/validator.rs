use crate::config::ValidationConfig;
use crate::events::tick::{PriceTick, RejectionReason};
use crate::types::timestamp::Timestamp;

/// Validate an incoming tick against the last accepted tick for its symbol.
///
/// Checks run in order and short-circuit on the first failure: price range,
/// source-clock sanity, staleness. Pure function; the caller owns logging
/// and health bookkeeping for rejections.
pub fn validate(
    tick: &PriceTick,
    prior: Option<&PriceTick>,
    config: &ValidationConfig,
) -> Result<(), RejectionReason> {
    // Range: non-positive prices and single-step moves beyond the limit are
    // upstream decimal-placement bugs, not market moves.
    if !tick.price.is_positive() {
        return Err(RejectionReason::InvalidPrice);
    }
    if let Some(prior) = prior {
        if tick.price.relative_delta(prior.price) > config.max_step {
            return Err(RejectionReason::InvalidPrice);
        }
    }

    // A source timestamp ahead of local time beyond the skew tolerance means
    // the payload cannot be trusted.
    if tick.source_timestamp.as_millis()
        > tick.received_timestamp.as_millis() + config.clock_skew_tolerance.as_millis() as u64
    {
        return Err(RejectionReason::SchemaError);
    }

    // Staleness, per asset class.
    if tick.age() > config.staleness.for_class(tick.asset_class) {
        return Err(RejectionReason::Stale);
    }

    Ok(())
}

/// Cross-source disagreement between the currently-routed tick and a
/// candidate from a different provider. Returns the delta as a fraction when
/// it exceeds `threshold`; the caller flags it without rejecting the tick.
pub fn cross_source_delta(
    routed: &PriceTick,
    candidate: &PriceTick,
    threshold: f64,
) -> Option<f64> {
    if routed.provider_id == candidate.provider_id {
        return None;
    }
    let delta = candidate.price.relative_delta(routed.price);
    (delta > threshold).then_some(delta)
}

/// Whether a previously routed tick is recent enough to compare against.
pub fn is_fresh(tick: &PriceTick, now: Timestamp, config: &ValidationConfig) -> bool {
    now - tick.received_timestamp <= config.staleness.for_class(tick.asset_class)
}
