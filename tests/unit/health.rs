use std::time::Duration;

use feedrouter::router::health::{
    HealthPolicy, HealthState, Observation, ProviderHealth, ProviderHealthBook,
};

use crate::common::{at_secs, FALLBACK, PRIMARY};

fn policy() -> HealthPolicy {
    HealthPolicy {
        healthy_window: Duration::from_secs(30),
        unavailable_window: Duration::from_secs(60),
        max_consecutive_failures: 3,
    }
}

#[test]
fn fresh_tick_is_healthy() {
    let mut health = ProviderHealth::new(at_secs(0));
    health.observe(
        Observation::TickReceived { latency_ms: 20 },
        at_secs(1),
        &policy(),
    );
    assert_eq!(health.state, HealthState::Healthy);
    assert_eq!(health.consecutive_failures, 0);
}

#[test]
fn silence_degrades_then_removes() {
    let mut health = ProviderHealth::new(at_secs(0));
    health.observe(
        Observation::TickReceived { latency_ms: 20 },
        at_secs(0),
        &policy(),
    );

    // Inside the healthy window.
    assert_eq!(health.assess(at_secs(29), &policy()), HealthState::Healthy);
    // Past the healthy window but not yet gone.
    assert_eq!(health.assess(at_secs(45), &policy()), HealthState::Degraded);
    // Past the unavailable window.
    assert_eq!(
        health.assess(at_secs(61), &policy()),
        HealthState::Unavailable
    );
}

#[test]
fn never_ticked_entry_decays_from_creation() {
    // Silence from a provider that never produced a tick for the symbol
    // still counts, anchored at entry creation.
    let health = ProviderHealth::new(at_secs(0));
    assert_eq!(health.assess(at_secs(10), &policy()), HealthState::Healthy);
    assert_eq!(
        health.assess(at_secs(61), &policy()),
        HealthState::Unavailable
    );
}

#[test]
fn connection_failures_degrade() {
    let mut health = ProviderHealth::new(at_secs(0));
    health.observe(
        Observation::TickReceived { latency_ms: 20 },
        at_secs(0),
        &policy(),
    );
    for _ in 0..3 {
        health.observe(Observation::ConnectionLost, at_secs(1), &policy());
    }
    assert_eq!(health.state, HealthState::Degraded);
    assert_eq!(health.consecutive_failures, 3);
}

#[test]
fn sustained_failure_streak_is_unavailable() {
    let mut health = ProviderHealth::new(at_secs(0));
    health.observe(
        Observation::TickReceived { latency_ms: 20 },
        at_secs(0),
        &policy(),
    );
    for _ in 0..6 {
        health.observe(Observation::TickRejected, at_secs(1), &policy());
    }
    assert_eq!(health.state, HealthState::Unavailable);
}

#[test]
fn one_fresh_tick_recovers() {
    let mut health = ProviderHealth::new(at_secs(0));
    for _ in 0..6 {
        health.observe(Observation::ConnectionLost, at_secs(1), &policy());
    }
    assert_eq!(health.state, HealthState::Unavailable);

    // Recovery is immediate on a fresh tick, no grace period.
    health.observe(
        Observation::TickReceived { latency_ms: 15 },
        at_secs(2),
        &policy(),
    );
    assert_eq!(health.state, HealthState::Healthy);
}

#[test]
fn connection_restore_alone_is_not_healthy() {
    let mut health = ProviderHealth::new(at_secs(0));
    health.observe(
        Observation::TickReceived { latency_ms: 20 },
        at_secs(0),
        &policy(),
    );
    for _ in 0..4 {
        health.observe(Observation::ConnectionLost, at_secs(40), &policy());
    }

    // The reconnect clears the failure streak, but with the last tick 40s
    // old the provider is still degraded until data actually flows.
    health.observe(Observation::ConnectionRestored, at_secs(40), &policy());
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.state, HealthState::Degraded);
}

#[test]
fn latency_estimate_smooths() {
    let mut health = ProviderHealth::new(at_secs(0));
    health.observe(
        Observation::TickReceived { latency_ms: 100 },
        at_secs(0),
        &policy(),
    );
    assert_eq!(health.latency_estimate_ms, 100);

    health.observe(
        Observation::TickReceived { latency_ms: 200 },
        at_secs(1),
        &policy(),
    );
    // EMA with alpha 0.2: 0.2 * 200 + 0.8 * 100 = 120.
    assert_eq!(health.latency_estimate_ms, 120);
}

#[test]
fn book_tracks_providers_independently() {
    let mut book = ProviderHealthBook::new();
    book.ensure(PRIMARY, at_secs(0));
    book.ensure(FALLBACK, at_secs(0));

    book.observe(
        PRIMARY,
        Observation::TickReceived { latency_ms: 10 },
        at_secs(50),
        &policy(),
    );

    assert_eq!(
        book.state_of(PRIMARY, at_secs(55), &policy()),
        HealthState::Healthy
    );
    // The fallback never ticked; 55s of silence from creation.
    assert_eq!(
        book.state_of(FALLBACK, at_secs(55), &policy()),
        HealthState::Degraded
    );
}

#[test]
fn unknown_provider_is_unavailable() {
    let book = ProviderHealthBook::new();
    assert_eq!(
        book.state_of("nobody", at_secs(0), &policy()),
        HealthState::Unavailable
    );
}
