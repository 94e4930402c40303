use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

use crate::events::route::RouterEvent;
use crate::events::tick::RoutedTick;
use crate::observability::metrics;
use crate::router::registry::{OutboundMessage, SubscriptionRegistry};

/// Rate-limits fan-out per symbol by last-write-wins coalescing: within one
/// window only the newest tick per symbol survives. Freshness beats
/// completeness for a live price feed, so intermediate ticks are dropped,
/// not queued.
pub struct BroadcastThrottler {
    window: Duration,
    pending: DashMap<String, RoutedTick>,
    registry: Arc<SubscriptionRegistry>,
    events: broadcast::Sender<RouterEvent>,
}

impl BroadcastThrottler {
    pub fn new(
        window: Duration,
        registry: Arc<SubscriptionRegistry>,
        events: broadcast::Sender<RouterEvent>,
    ) -> Self {
        BroadcastThrottler {
            window,
            pending: DashMap::new(),
            registry,
            events,
        }
    }

    /// Called by the router on every routed tick. Never blocks.
    pub fn publish(&self, tick: RoutedTick) {
        self.pending.insert(tick.symbol.clone(), tick);
    }

    /// Deliver the coalesced tick per symbol to every matching subscriber.
    /// Returns the number of symbols flushed. Exposed so tests can drive
    /// windows deterministically.
    pub fn flush_once(&self) -> usize {
        let symbols: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut flushed = 0;
        for symbol in symbols {
            if let Some((_, tick)) = self.pending.remove(&symbol) {
                self.deliver(tick);
                flushed += 1;
            }
        }
        flushed
    }

    fn deliver(&self, tick: RoutedTick) {
        let _span = crate::observability::tracing::trace_broadcast(&tick.symbol).entered();
        let _ = self.events.send(RouterEvent::Tick(tick.clone()));

        for (connection_id, sender) in self
            .registry
            .subscribers_for(&tick.symbol, tick.asset_class)
        {
            let message = OutboundMessage::Tick { tick: tick.clone() };
            // One dead subscriber must not stall the rest; the registry
            // reaps it when the transport notices the disconnect.
            if sender.send(message).is_err() {
                metrics::BROADCAST_ERRORS.inc();
                tracing::debug!(connection = %connection_id, symbol = %tick.symbol, "subscriber queue closed");
            } else {
                metrics::BROADCASTS_SENT.inc();
            }
        }
    }

    /// Window-flush loop; runs until shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.window);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("broadcast throttler stopped");
                        return;
                    }
                }
            }
        }
    }
}
