use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::types::timestamp::Timestamp;

const LATENCY_EMA_ALPHA: f64 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unavailable,
}

/// What the monitor is told about a provider for one symbol.
#[derive(Clone, Copy, Debug)]
pub enum Observation {
    TickReceived { latency_ms: u64 },
    TickRejected,
    ConnectionLost,
    ConnectionRestored,
}

/// Health thresholds for one provider. `healthy_window` comes from the
/// provider config (poll feeds scale it with their interval); the rest from
/// the shared health config.
#[derive(Clone, Copy, Debug)]
pub struct HealthPolicy {
    pub healthy_window: Duration,
    pub unavailable_window: Duration,
    pub max_consecutive_failures: u32,
}

/// Rolling health for one (provider, symbol) pair.
///
/// The state is a pure function of tick age and the failure streak, so it is
/// recomputed on every observation and on the periodic sweep; silence alone
/// degrades a provider. Recovery to HEALTHY takes one fresh tick, while
/// degradation takes a full window: fast recovery, slow degradation, so a
/// transient blip does not flap the route.
#[derive(Clone, Debug)]
pub struct ProviderHealth {
    pub last_tick_time: Option<Timestamp>,
    /// When this entry was created; silence is measured from here until the
    /// first tick arrives.
    pub tracked_since: Timestamp,
    pub consecutive_failures: u32,
    pub state: HealthState,
    pub latency_estimate_ms: u64,
}

impl ProviderHealth {
    pub fn new(now: Timestamp) -> Self {
        ProviderHealth {
            last_tick_time: None,
            tracked_since: now,
            consecutive_failures: 0,
            state: HealthState::Healthy,
            latency_estimate_ms: 0,
        }
    }

    pub fn observe(&mut self, observation: Observation, now: Timestamp, policy: &HealthPolicy) {
        match observation {
            Observation::TickReceived { latency_ms } => {
                self.last_tick_time = Some(now);
                self.consecutive_failures = 0;
                self.latency_estimate_ms = if self.latency_estimate_ms == 0 {
                    latency_ms
                } else {
                    (LATENCY_EMA_ALPHA * latency_ms as f64
                        + (1.0 - LATENCY_EMA_ALPHA) * self.latency_estimate_ms as f64)
                        as u64
                };
            }
            Observation::TickRejected | Observation::ConnectionLost => {
                self.consecutive_failures += 1;
            }
            Observation::ConnectionRestored => {
                // Failures stop counting, but HEALTHY still needs a tick.
                self.consecutive_failures = 0;
            }
        }
        self.state = self.assess(now, policy);
    }

    /// Recompute the state without mutating; used by the sweep and by the
    /// failover machine when reading the other provider's health.
    pub fn assess(&self, now: Timestamp, policy: &HealthPolicy) -> HealthState {
        let anchor = self.last_tick_time.unwrap_or(self.tracked_since);
        let age = now - anchor;

        // A long rejection/connection-failure streak is as bad as silence.
        if age > policy.unavailable_window
            || self.consecutive_failures >= policy.max_consecutive_failures * 2
        {
            HealthState::Unavailable
        } else if age < policy.healthy_window && self.consecutive_failures == 0 {
            HealthState::Healthy
        } else {
            HealthState::Degraded
        }
    }

    pub fn evaluate(&mut self, now: Timestamp, policy: &HealthPolicy) -> HealthState {
        self.state = self.assess(now, policy);
        self.state
    }
}

/// Per-symbol health table across providers; owned by the symbol's router
/// state and only touched under its lock.
#[derive(Clone, Debug, Default)]
pub struct ProviderHealthBook {
    entries: HashMap<String, ProviderHealth>,
}

impl ProviderHealthBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry for a provider if absent, anchoring its silence
    /// clock at `now`.
    pub fn ensure(&mut self, provider_id: &str, now: Timestamp) {
        self.entries
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderHealth::new(now));
    }

    pub fn observe(
        &mut self,
        provider_id: &str,
        observation: Observation,
        now: Timestamp,
        policy: &HealthPolicy,
    ) -> HealthState {
        let entry = self
            .entries
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderHealth::new(now));
        entry.observe(observation, now, policy);
        entry.state
    }

    pub fn get(&self, provider_id: &str) -> Option<&ProviderHealth> {
        self.entries.get(provider_id)
    }

    /// Current state for a provider; a provider never observed for this
    /// symbol is UNAVAILABLE.
    pub fn state_of(&self, provider_id: &str, now: Timestamp, policy: &HealthPolicy) -> HealthState {
        self.entries
            .get(provider_id)
            .map(|h| h.assess(now, policy))
            .unwrap_or(HealthState::Unavailable)
    }

    /// Re-assess every entry; run by the periodic sweep so health decays
    /// even when no ticks arrive.
    pub fn evaluate_all(&mut self, now: Timestamp, policies: &HashMap<String, HealthPolicy>) {
        for (provider_id, health) in self.entries.iter_mut() {
            if let Some(policy) = policies.get(provider_id) {
                health.evaluate(now, policy);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProviderHealth)> {
        self.entries.iter()
    }
}
