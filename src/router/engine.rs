use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::config::loader::AppConfig;
use crate::config::{HealthConfig, ValidationConfig};
use crate::error::Result;
use crate::events::route::{DiscrepancySignal, RouteDecision, RouteState, RouterEvent, RouteTransitionEvent};
use crate::events::tick::{PriceTick, RoutedTick};
use crate::feed::RawTick;
use crate::observability::metrics;
use crate::router::failover::FailoverStateMachine;
use crate::router::health::{HealthPolicy, Observation, ProviderHealthBook};
use crate::router::registry::{OutboundMessage, SubscriptionRegistry};
use crate::router::throttler::BroadcastThrottler;
use crate::router::validator;
use crate::types::asset::AssetClass;
use crate::types::ids::ConnectionId;
use crate::types::timestamp::Timestamp;

const EVENT_BUS_CAPACITY: usize = 1024;

/// Everything the router tracks for one symbol. Health and the route
/// decision are mutated only under this entry's shard lock, so a symbol's
/// state machine is never driven from two tasks at once while unrelated
/// symbols proceed in parallel.
struct SymbolState {
    health: ProviderHealthBook,
    fsm: FailoverStateMachine,
    /// Last validated tick that was routed; the prior for step validation
    /// and the reference for cross-source comparison.
    last_accepted: Option<PriceTick>,
    last_routed_source_ts: Option<Timestamp>,
    last_activity: Timestamp,
}

impl SymbolState {
    fn new(symbol: &str, primary: &str, fallback: Option<&str>, now: Timestamp) -> Self {
        let mut health = ProviderHealthBook::new();
        health.ensure(primary, now);
        if let Some(fallback) = fallback {
            health.ensure(fallback, now);
        }
        SymbolState {
            health,
            fsm: FailoverStateMachine::new(symbol, primary, fallback, now),
            last_accepted: None,
            last_routed_source_ts: None,
            last_activity: now,
        }
    }
}

/// The data source router: consumes raw ticks from provider adapters,
/// validates them, tracks provider health, decides the authoritative source
/// per symbol and hands routed ticks to the throttler for fan-out.
pub struct RouterEngine {
    validation: ValidationConfig,
    health_cfg: HealthConfig,
    policies: HashMap<String, HealthPolicy>,
    primary_id: String,
    fallback_id: Option<String>,
    /// Symbols each provider is configured to serve; used to spread
    /// connection-level events onto per-symbol health.
    provider_symbols: HashMap<String, Vec<String>>,
    symbols: DashMap<String, SymbolState>,
    registry: Arc<SubscriptionRegistry>,
    throttler: Arc<BroadcastThrottler>,
    events: broadcast::Sender<RouterEvent>,
}

impl RouterEngine {
    pub fn new(config: &AppConfig) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let throttler = Arc::new(BroadcastThrottler::new(
            config.throttle.window(),
            registry.clone(),
            events.clone(),
        ));

        let enabled = config.enabled_providers();
        let primary_id = enabled[0].provider_id.clone();
        let fallback_id = enabled.get(1).map(|p| p.provider_id.clone());

        let mut policies = HashMap::new();
        let mut provider_symbols = HashMap::new();
        for provider in &enabled {
            policies.insert(
                provider.provider_id.clone(),
                HealthPolicy {
                    healthy_window: provider.healthy_window,
                    unavailable_window: config.health.unavailable_window,
                    max_consecutive_failures: config.health.max_consecutive_failures,
                },
            );
            provider_symbols.insert(
                provider.provider_id.clone(),
                provider.symbols.iter().map(|m| m.symbol.clone()).collect(),
            );
        }

        RouterEngine {
            validation: config.validation.clone(),
            health_cfg: config.health.clone(),
            policies,
            primary_id,
            fallback_id,
            provider_symbols,
            symbols: DashMap::new(),
            registry,
            throttler,
            events,
        }
    }

    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        self.registry.clone()
    }

    pub fn throttler(&self) -> Arc<BroadcastThrottler> {
        self.throttler.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    fn policy_for(&self, provider_id: &str) -> HealthPolicy {
        self.policies.get(provider_id).copied().unwrap_or(HealthPolicy {
            healthy_window: self.health_cfg.sweep_interval * 15,
            unavailable_window: self.health_cfg.unavailable_window,
            max_consecutive_failures: self.health_cfg.max_consecutive_failures,
        })
    }

    /// Entry point for provider adapters.
    pub fn ingest(&self, raw: RawTick) {
        self.ingest_at(raw, Timestamp::now());
    }

    /// Clocked variant of `ingest`; the explicit `now` keeps the state
    /// machine deterministic under test.
    pub fn ingest_at(&self, raw: RawTick, now: Timestamp) {
        if !self.policies.contains_key(&raw.provider_id) {
            metrics::TICKS_REJECTED.inc();
            tracing::warn!(provider = %raw.provider_id, "tick from unconfigured provider dropped");
            return;
        }

        let symbol = raw.symbol.clone();
        let provider_id = raw.provider_id.clone();
        let _span = crate::observability::tracing::trace_tick_ingest(&provider_id, &symbol).entered();
        let policy = self.policy_for(&provider_id);

        let tick = match raw.normalize() {
            Ok(tick) => tick,
            Err(reason) => {
                metrics::TICKS_REJECTED.inc();
                tracing::debug!(provider = %provider_id, symbol = %symbol, reason = reason.as_str(), "tick rejected");
                if let Some(mut state) = self.symbols.get_mut(&symbol) {
                    state
                        .health
                        .observe(&provider_id, Observation::TickRejected, now, &policy);
                }
                return;
            }
        };

        let mut transitions: Vec<RouteTransitionEvent> = Vec::new();
        let mut discrepancy: Option<DiscrepancySignal> = None;

        let routed = {
            let mut state = self
                .symbols
                .entry(symbol.clone())
                .or_insert_with(|| {
                    SymbolState::new(&symbol, &self.primary_id, self.fallback_id.as_deref(), now)
                });
            let state = state.value_mut();
            state.last_activity = now;

            if let Err(reason) = validator::validate(&tick, state.last_accepted.as_ref(), &self.validation) {
                metrics::TICKS_REJECTED.inc();
                tracing::debug!(
                    provider = %provider_id,
                    symbol = %symbol,
                    reason = reason.as_str(),
                    price = %tick.price,
                    "tick rejected"
                );
                state
                    .health
                    .observe(&provider_id, Observation::TickRejected, now, &policy);
                None
            } else {
                let latency_ms = tick.age().as_millis() as u64;
                metrics::FEED_LATENCY.observe(tick.age().as_secs_f64());
                state.health.observe(
                    &provider_id,
                    Observation::TickReceived { latency_ms },
                    now,
                    &policy,
                );

                // Cross-source comparison against the currently-routed tick:
                // flag, never hard-reject. The emergency knob can force a
                // switch when the disagreeing provider is itself healthy.
                if let Some(routed_tick) = state.last_accepted.as_ref() {
                    if validator::is_fresh(routed_tick, now, &self.validation) {
                        if let Some(delta) = validator::cross_source_delta(
                            routed_tick,
                            &tick,
                            self.validation.cross_source_delta,
                        ) {
                            metrics::DISCREPANCIES_FLAGGED.inc();
                            discrepancy = Some(DiscrepancySignal {
                                symbol: symbol.clone(),
                                routed_provider: routed_tick.provider_id.clone(),
                                candidate_provider: provider_id.clone(),
                                routed_price: routed_tick.price,
                                candidate_price: tick.price,
                                delta,
                                timestamp: now,
                            });

                            if let Some(threshold) = self.validation.emergency_discrepancy {
                                let candidate_healthy = state
                                    .health
                                    .state_of(&provider_id, now, &policy)
                                    == crate::router::health::HealthState::Healthy;
                                if delta > threshold && candidate_healthy {
                                    if let Some(event) = state.fsm.force_switch_to(
                                        &provider_id,
                                        "emergency cross-source discrepancy",
                                        now,
                                    ) {
                                        transitions.push(event);
                                    }
                                }
                            }
                        }
                    }
                }

                // Fast-path transition on this observation; the sweep covers
                // silence.
                let primary_state =
                    state
                        .health
                        .state_of(&self.primary_id, now, &self.policy_for(&self.primary_id));
                let fallback_state = self.fallback_id.as_ref().map(|id| {
                    state.health.state_of(id, now, &self.policy_for(id))
                });
                if let Some(event) = state.fsm.reevaluate(
                    primary_state,
                    fallback_state,
                    now,
                    self.health_cfg.stabilization_delay,
                ) {
                    transitions.push(event);
                }

                if state.fsm.is_active(&provider_id) {
                    // Inactive-source ticks are dropped, and the routed stream
                    // never goes backwards in source time, so a switch cannot
                    // replay or reorder what subscribers already saw.
                    let monotonic = state
                        .last_routed_source_ts
                        .is_none_or(|ts| tick.source_timestamp >= ts);
                    if monotonic {
                        state.last_routed_source_ts = Some(tick.source_timestamp);
                        let routed = RoutedTick::from_tick(&tick, state.fsm.decision().state);
                        state.last_accepted = Some(tick);
                        metrics::TICKS_ROUTED.inc();
                        Some(routed)
                    } else {
                        metrics::TICKS_OUT_OF_ORDER.inc();
                        None
                    }
                } else {
                    metrics::TICKS_DROPPED_INACTIVE.inc();
                    None
                }
            }
        };

        // Entry lock released; now talk to the outside world.
        if let Some(signal) = discrepancy {
            tracing::warn!(
                symbol = %signal.symbol,
                routed = %signal.routed_provider,
                candidate = %signal.candidate_provider,
                delta = signal.delta,
                "cross-source price discrepancy"
            );
            let _ = self.events.send(RouterEvent::Discrepancy(signal));
        }
        for event in transitions {
            self.emit_transition(event);
        }
        if let Some(tick) = routed {
            self.throttler.publish(tick);
        }
    }

    /// Connection-level signal from an adapter, spread across the symbols
    /// that provider serves.
    pub fn on_connection_event(&self, provider_id: &str, connected: bool) {
        self.on_connection_event_at(provider_id, connected, Timestamp::now());
    }

    pub fn on_connection_event_at(&self, provider_id: &str, connected: bool, now: Timestamp) {
        let observation = if connected {
            Observation::ConnectionRestored
        } else {
            Observation::ConnectionLost
        };
        let policy = self.policy_for(provider_id);

        if connected {
            tracing::info!(provider = %provider_id, "provider connected");
        } else {
            tracing::warn!(provider = %provider_id, "provider connection lost");
        }

        let Some(symbols) = self.provider_symbols.get(provider_id) else {
            return;
        };
        for symbol in symbols {
            if let Some(mut state) = self.symbols.get_mut(symbol) {
                state.health.observe(provider_id, observation, now, &policy);
            }
        }
    }

    /// Periodic health sweep: decay health with no new observations, drive
    /// transitions caused by silence, and drop idle symbol state.
    pub fn sweep(&self) {
        self.sweep_at(Timestamp::now());
    }

    pub fn sweep_at(&self, now: Timestamp) {
        let mut transitions: Vec<RouteTransitionEvent> = Vec::new();

        for mut entry in self.symbols.iter_mut() {
            let state = entry.value_mut();
            state.health.evaluate_all(now, &self.policies);

            let primary_state =
                state
                    .health
                    .state_of(&self.primary_id, now, &self.policy_for(&self.primary_id));
            let fallback_state = self
                .fallback_id
                .as_ref()
                .map(|id| state.health.state_of(id, now, &self.policy_for(id)));
            if let Some(event) = state.fsm.reevaluate(
                primary_state,
                fallback_state,
                now,
                self.health_cfg.stabilization_delay,
            ) {
                transitions.push(event);
            }
        }

        self.symbols
            .retain(|_, state| now - state.last_activity < self.health_cfg.retention);
        metrics::TRACKED_SYMBOLS.set(self.symbols.len() as i64);

        for event in transitions {
            self.emit_transition(event);
        }
    }

    /// Sweep loop; runs until shutdown is signalled.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.health_cfg.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("health sweeper stopped");
                        return;
                    }
                }
            }
        }
    }

    fn emit_transition(&self, event: RouteTransitionEvent) {
        match event.to_state {
            RouteState::BothUnavailable => {
                metrics::ROUTE_OUTAGES.inc();
                tracing::error!(
                    symbol = %event.symbol,
                    from = event.from_state.as_str(),
                    reason = %event.reason,
                    "all sources unavailable"
                );
            }
            RouteState::FallbackActive => {
                metrics::ROUTE_FAILOVERS.inc();
                tracing::warn!(
                    symbol = %event.symbol,
                    from = event.from_state.as_str(),
                    reason = %event.reason,
                    "failed over to fallback"
                );
            }
            RouteState::PrimaryActive => {
                metrics::ROUTE_FAILBACKS.inc();
                tracing::info!(
                    symbol = %event.symbol,
                    from = event.from_state.as_str(),
                    reason = %event.reason,
                    "primary route active"
                );
            }
        }
        let _ = self.events.send(RouterEvent::Transition(event));
    }

    // Subscription surface, consumed by the transport layer.

    pub fn register_connection(
        &self,
        id: ConnectionId,
        sender: tokio::sync::mpsc::UnboundedSender<OutboundMessage>,
    ) {
        self.registry.register(id, sender);
    }

    /// Subscribe and immediately push a snapshot of the last routed prices
    /// for the joined symbols.
    pub fn subscribe(
        &self,
        id: ConnectionId,
        asset_class: AssetClass,
        symbols: &[String],
    ) -> Result<Vec<String>> {
        let joined = self.registry.subscribe(id, asset_class, symbols)?;
        let ticks: Vec<RoutedTick> = symbols
            .iter()
            .filter_map(|symbol| self.last_routed(symbol))
            .collect();
        if !ticks.is_empty() {
            let _ = self.registry.send_to(id, OutboundMessage::Snapshot { ticks });
        }
        Ok(joined)
    }

    pub fn unsubscribe(&self, id: ConnectionId, symbols: &[String]) -> Result<()> {
        self.registry.unsubscribe(id, symbols)
    }

    /// Subscribe to every symbol of an asset class, with snapshot.
    pub fn subscribe_class(&self, id: ConnectionId, asset_class: AssetClass) -> Result<()> {
        self.registry.subscribe_class(id, asset_class)?;
        let ticks: Vec<RoutedTick> = self
            .symbols
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .last_accepted
                    .as_ref()
                    .filter(|t| t.asset_class == asset_class)
                    .map(|t| RoutedTick::from_tick(t, entry.value().fsm.decision().state))
            })
            .collect();
        if !ticks.is_empty() {
            let _ = self.registry.send_to(id, OutboundMessage::Snapshot { ticks });
        }
        Ok(())
    }

    pub fn unsubscribe_class(&self, id: ConnectionId, asset_class: AssetClass) -> Result<()> {
        self.registry.unsubscribe_class(id, asset_class)
    }

    pub fn remove_connection(&self, id: ConnectionId) {
        self.registry.remove_connection(id);
    }

    // Read-only views.

    pub fn route_decision(&self, symbol: &str) -> Option<RouteDecision> {
        self.symbols
            .get(symbol)
            .map(|state| state.fsm.decision().clone())
    }

    pub fn last_routed(&self, symbol: &str) -> Option<RoutedTick> {
        self.symbols.get(symbol).and_then(|state| {
            state
                .last_accepted
                .as_ref()
                .map(|t| RoutedTick::from_tick(t, state.fsm.decision().state))
        })
    }

    /// Per-provider health roll-up for the health endpoint.
    pub fn health_summary(&self) -> serde_json::Value {
        use crate::router::health::HealthState;

        let now = Timestamp::now();
        let mut per_provider: HashMap<String, (usize, usize, usize)> = HashMap::new();
        for entry in self.symbols.iter() {
            for (provider_id, health) in entry.value().health.iter() {
                let counts = per_provider.entry(provider_id.clone()).or_default();
                match health.assess(now, &self.policy_for(provider_id)) {
                    HealthState::Healthy => counts.0 += 1,
                    HealthState::Degraded => counts.1 += 1,
                    HealthState::Unavailable => counts.2 += 1,
                }
            }
        }

        serde_json::json!({
            "status": "ok",
            "generatedAt": now.to_rfc3339(),
            "trackedSymbols": self.symbols.len(),
            "connections": self.registry.connection_count(),
            "providers": per_provider
                .into_iter()
                .map(|(provider, (healthy, degraded, unavailable))| {
                    serde_json::json!({
                        "providerId": provider,
                        "healthySymbols": healthy,
                        "degradedSymbols": degraded,
                        "unavailableSymbols": unavailable,
                    })
                })
                .collect::<Vec<_>>(),
        })
    }
}
