use serde::{Deserialize, Serialize};

use crate::events::tick::RoutedTick;
use crate::types::price::{self, Price};
use crate::types::timestamp::Timestamp;

/// Which source is authoritative for a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteState {
    PrimaryActive,
    FallbackActive,
    BothUnavailable,
}

impl RouteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteState::PrimaryActive => "PRIMARY_ACTIVE",
            RouteState::FallbackActive => "FALLBACK_ACTIVE",
            RouteState::BothUnavailable => "BOTH_UNAVAILABLE",
        }
    }
}

/// Authoritative source selection for a symbol at a point in time. Exactly
/// one decision is live per symbol; only the failover state machine mutates
/// it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteDecision {
    pub symbol: String,
    /// None while BOTH_UNAVAILABLE.
    pub active_provider: Option<String>,
    pub state: RouteState,
    pub reason: String,
    pub effective_since: Timestamp,
}

/// Emitted on every state transition for external observability.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTransitionEvent {
    pub symbol: String,
    pub from_state: RouteState,
    pub to_state: RouteState,
    pub reason: String,
    pub timestamp: Timestamp,
}

/// Cross-source disagreement above the configured threshold. Flagged for
/// monitoring; routing continues on the health-preferred source.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscrepancySignal {
    pub symbol: String,
    pub routed_provider: String,
    pub candidate_provider: String,
    #[serde(with = "price::as_f64")]
    pub routed_price: Price,
    #[serde(with = "price::as_f64")]
    pub candidate_price: Price,
    /// Disagreement as a fraction of the routed price.
    pub delta: f64,
    pub timestamp: Timestamp,
}

/// In-process event bus payload: everything the router tells the world.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RouterEvent {
    Tick(RoutedTick),
    Transition(RouteTransitionEvent),
    Discrepancy(DiscrepancySignal),
}
