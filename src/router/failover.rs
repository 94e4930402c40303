use std::time::Duration;

use crate::events::route::{RouteDecision, RouteState, RouteTransitionEvent};
use crate::router::health::HealthState;
use crate::types::timestamp::Timestamp;

/// Per-symbol failover state machine.
///
/// Decides which provider is authoritative. A DEGRADED primary keeps the
/// route (its ticks are still forwarded, flagged by the route state only
/// when on fallback); failover happens only on UNAVAILABLE. Failing back
/// requires the primary to hold HEALTHY for the stabilization delay so a
/// flapping source cannot bounce the route.
pub struct FailoverStateMachine {
    primary: String,
    fallback: Option<String>,
    decision: RouteDecision,
    /// Start of the primary's current uninterrupted HEALTHY run.
    primary_healthy_since: Option<Timestamp>,
}

impl FailoverStateMachine {
    /// With no health data yet the machine starts optimistically on the
    /// primary; the first sweep corrects it if the primary is silent.
    pub fn new(symbol: &str, primary: &str, fallback: Option<&str>, now: Timestamp) -> Self {
        FailoverStateMachine {
            primary: primary.to_string(),
            fallback: fallback.map(|f| f.to_string()),
            decision: RouteDecision {
                symbol: symbol.to_string(),
                active_provider: Some(primary.to_string()),
                state: RouteState::PrimaryActive,
                reason: "initial optimistic default".to_string(),
                effective_since: now,
            },
            primary_healthy_since: None,
        }
    }

    pub fn decision(&self) -> &RouteDecision {
        &self.decision
    }

    pub fn is_active(&self, provider_id: &str) -> bool {
        self.decision.active_provider.as_deref() == Some(provider_id)
    }

    /// Re-run the transition rules against current health. Returns the
    /// transition event if the route changed. Called on every observation
    /// and on every sweep; transitions are monotonic in `now`.
    pub fn reevaluate(
        &mut self,
        primary_health: HealthState,
        fallback_health: Option<HealthState>,
        now: Timestamp,
        stabilization_delay: Duration,
    ) -> Option<RouteTransitionEvent> {
        // Track the primary's uninterrupted healthy run for failback.
        if primary_health == HealthState::Healthy {
            self.primary_healthy_since.get_or_insert(now);
        } else {
            self.primary_healthy_since = None;
        }

        let fallback_health = fallback_health.unwrap_or(HealthState::Unavailable);

        match self.decision.state {
            RouteState::PrimaryActive => {
                if primary_health == HealthState::Unavailable {
                    if self.fallback.is_some() && fallback_health != HealthState::Unavailable {
                        return Some(self.transition(
                            RouteState::FallbackActive,
                            self.fallback.clone(),
                            "primary unavailable, failing over",
                            now,
                        ));
                    }
                    return Some(self.transition(
                        RouteState::BothUnavailable,
                        None,
                        "primary unavailable and no usable fallback",
                        now,
                    ));
                }
            }
            RouteState::FallbackActive => {
                let primary_stable = self
                    .primary_healthy_since
                    .is_some_and(|since| now - since >= stabilization_delay);
                if primary_stable {
                    return Some(self.transition(
                        RouteState::PrimaryActive,
                        Some(self.primary.clone()),
                        "primary healthy and stable, failing back",
                        now,
                    ));
                }
                if fallback_health == HealthState::Unavailable {
                    if primary_health == HealthState::Unavailable {
                        return Some(self.transition(
                            RouteState::BothUnavailable,
                            None,
                            "fallback unavailable while primary still down",
                            now,
                        ));
                    }
                    // Primary not yet stabilized but the fallback is gone;
                    // a degraded primary beats no data at all.
                    return Some(self.transition(
                        RouteState::PrimaryActive,
                        Some(self.primary.clone()),
                        "fallback unavailable, returning to primary",
                        now,
                    ));
                }
            }
            RouteState::BothUnavailable => {
                // Primary preferred on simultaneous recovery.
                if primary_health == HealthState::Healthy {
                    return Some(self.transition(
                        RouteState::PrimaryActive,
                        Some(self.primary.clone()),
                        "primary recovered",
                        now,
                    ));
                }
                if fallback_health == HealthState::Healthy {
                    return Some(self.transition(
                        RouteState::FallbackActive,
                        self.fallback.clone(),
                        "fallback recovered",
                        now,
                    ));
                }
            }
        }
        None
    }

    /// Forced switch to the given provider on an emergency cross-source
    /// discrepancy (policy knob, off by default). No-op if that provider is
    /// already active or not configured.
    pub fn force_switch_to(
        &mut self,
        provider_id: &str,
        reason: &str,
        now: Timestamp,
    ) -> Option<RouteTransitionEvent> {
        if self.is_active(provider_id) {
            return None;
        }
        if provider_id == self.primary {
            Some(self.transition(
                RouteState::PrimaryActive,
                Some(self.primary.clone()),
                reason,
                now,
            ))
        } else if self.fallback.as_deref() == Some(provider_id) {
            Some(self.transition(
                RouteState::FallbackActive,
                self.fallback.clone(),
                reason,
                now,
            ))
        } else {
            None
        }
    }

    fn transition(
        &mut self,
        to_state: RouteState,
        active_provider: Option<String>,
        reason: &str,
        now: Timestamp,
    ) -> RouteTransitionEvent {
        let event = RouteTransitionEvent {
            symbol: self.decision.symbol.clone(),
            from_state: self.decision.state,
            to_state,
            reason: reason.to_string(),
            timestamp: now,
        };
        self.decision.state = to_state;
        self.decision.active_provider = active_provider;
        self.decision.reason = reason.to_string();
        self.decision.effective_since = now;
        event
    }
}
