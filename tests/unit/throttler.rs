use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use feedrouter::events::route::RouteState;
use feedrouter::events::tick::RoutedTick;
use feedrouter::router::registry::{OutboundMessage, SubscriptionRegistry};
use feedrouter::router::throttler::BroadcastThrottler;
use feedrouter::types::asset::AssetClass;
use feedrouter::types::ids::ConnectionId;
use feedrouter::types::price::Price;
use feedrouter::types::timestamp::Timestamp;

use crate::common::{at_secs, PRIMARY};

fn routed(symbol: &str, price: f64, at: Timestamp) -> RoutedTick {
    RoutedTick {
        symbol: symbol.to_string(),
        asset_class: AssetClass::Crypto,
        price: Price::from_f64(price),
        change_percent: None,
        volume: None,
        timestamp: at,
        source_state: RouteState::PrimaryActive,
        provider_id: PRIMARY.to_string(),
    }
}

fn setup() -> (
    Arc<SubscriptionRegistry>,
    Arc<BroadcastThrottler>,
    broadcast::Receiver<feedrouter::events::route::RouterEvent>,
) {
    let registry = Arc::new(SubscriptionRegistry::new());
    let (events, events_rx) = broadcast::channel(64);
    let throttler = Arc::new(BroadcastThrottler::new(
        Duration::from_millis(50),
        registry.clone(),
        events,
    ));
    (registry, throttler, events_rx)
}

fn subscriber(
    registry: &SubscriptionRegistry,
    symbols: &[&str],
) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundMessage>) {
    let id = ConnectionId::new();
    let (tx, rx) = mpsc::unbounded_channel();
    registry.register(id, tx);
    let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
    registry.subscribe(id, AssetClass::Crypto, &symbols).unwrap();
    (id, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

#[tokio::test]
async fn coalesces_burst_to_latest_tick() {
    let (registry, throttler, _events) = setup();
    let (_id, mut rx) = subscriber(&registry, &["BTC"]);

    // A hundred ticks inside one window: only the newest survives.
    for i in 0..100u64 {
        throttler.publish(routed("BTC", 50_000.0 + i as f64, at_secs(i)));
    }
    let flushed = throttler.flush_once();
    assert_eq!(flushed, 1);

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        OutboundMessage::Tick { tick } => {
            assert_eq!(tick.price, Price::from_f64(50_099.0));
            assert_eq!(tick.timestamp, at_secs(99));
        }
        other => panic!("expected tick, got {:?}", other),
    }

    // Nothing pending after the flush.
    assert_eq!(throttler.flush_once(), 0);
}

#[tokio::test]
async fn symbols_coalesce_independently() {
    let (registry, throttler, _events) = setup();
    let (_id, mut rx) = subscriber(&registry, &["BTC", "ETH"]);

    throttler.publish(routed("BTC", 50_000.0, at_secs(0)));
    throttler.publish(routed("ETH", 3_000.0, at_secs(0)));
    throttler.publish(routed("BTC", 50_010.0, at_secs(1)));

    assert_eq!(throttler.flush_once(), 2);
    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn dead_subscriber_does_not_block_others() {
    let (registry, throttler, _events) = setup();
    let (_dead_id, dead_rx) = subscriber(&registry, &["BTC"]);
    let (_live_id, mut live_rx) = subscriber(&registry, &["BTC"]);

    // Simulate an abnormal disconnect: the receiver is gone but the registry
    // has not been told yet.
    drop(dead_rx);

    throttler.publish(routed("BTC", 50_000.0, at_secs(0)));
    throttler.flush_once();

    let messages = drain(&mut live_rx);
    assert_eq!(messages.len(), 1, "live subscriber must still be served");
}

#[tokio::test]
async fn unsubscribed_symbols_are_not_delivered() {
    let (registry, throttler, _events) = setup();
    let (_id, mut rx) = subscriber(&registry, &["ETH"]);

    throttler.publish(routed("BTC", 50_000.0, at_secs(0)));
    throttler.flush_once();

    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn flush_publishes_on_event_bus() {
    let (registry, throttler, mut events) = setup();
    let (_id, _rx) = subscriber(&registry, &["BTC"]);

    throttler.publish(routed("BTC", 50_000.0, at_secs(0)));
    throttler.flush_once();

    match events.try_recv() {
        Ok(feedrouter::events::route::RouterEvent::Tick(tick)) => {
            assert_eq!(tick.symbol, "BTC");
        }
        other => panic!("expected tick event, got {:?}", other),
    }
}
