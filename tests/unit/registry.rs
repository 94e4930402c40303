use tokio::sync::mpsc;

use feedrouter::error::Error;
use feedrouter::router::registry::{OutboundMessage, SubscriptionRegistry};
use feedrouter::types::asset::AssetClass;
use feedrouter::types::ids::ConnectionId;

fn registered(
    registry: &SubscriptionRegistry,
) -> (
    ConnectionId,
    mpsc::UnboundedReceiver<OutboundMessage>,
) {
    let id = ConnectionId::new();
    let (tx, rx) = mpsc::unbounded_channel();
    registry.register(id, tx);
    (id, rx)
}

#[tokio::test]
async fn subscribe_is_idempotent() {
    let registry = SubscriptionRegistry::new();
    let (id, _rx) = registered(&registry);

    registry
        .subscribe(id, AssetClass::Crypto, &["BTC".to_string()])
        .unwrap();
    registry
        .subscribe(id, AssetClass::Crypto, &["BTC".to_string()])
        .unwrap();

    assert_eq!(registry.symbol_subscribers("BTC").len(), 1);
    assert_eq!(registry.symbols_of(id).unwrap().len(), 1);
}

#[tokio::test]
async fn empty_symbol_list_is_rejected() {
    let registry = SubscriptionRegistry::new();
    let (id, _rx) = registered(&registry);

    let result = registry.subscribe(id, AssetClass::Crypto, &[]);
    assert!(matches!(result, Err(Error::NoSymbols)));
    // No group membership came out of the failed call.
    assert!(registry.symbol_subscribers("BTC").is_empty());
    assert!(registry.symbols_of(id).unwrap().is_empty());
}

#[tokio::test]
async fn unknown_connection_is_rejected() {
    let registry = SubscriptionRegistry::new();
    let result = registry.subscribe(ConnectionId::new(), AssetClass::Crypto, &["BTC".to_string()]);
    assert!(matches!(result, Err(Error::UnknownConnection(_))));
}

#[tokio::test]
async fn unsubscribe_removes_membership() {
    let registry = SubscriptionRegistry::new();
    let (id, _rx) = registered(&registry);

    registry
        .subscribe(
            id,
            AssetClass::Crypto,
            &["BTC".to_string(), "ETH".to_string()],
        )
        .unwrap();
    registry.unsubscribe(id, &["BTC".to_string()]).unwrap();

    assert!(registry.symbol_subscribers("BTC").is_empty());
    assert_eq!(registry.symbol_subscribers("ETH").len(), 1);

    // Unsubscribing from a symbol never joined is a no-op.
    registry.unsubscribe(id, &["DOGE".to_string()]).unwrap();
}

#[tokio::test]
async fn remove_connection_clears_all_state() {
    let registry = SubscriptionRegistry::new();
    let (id, _rx) = registered(&registry);

    registry
        .subscribe(
            id,
            AssetClass::Crypto,
            &["BTC".to_string(), "ETH".to_string()],
        )
        .unwrap();
    registry.subscribe_class(id, AssetClass::Stock).unwrap();

    registry.remove_connection(id);

    assert_eq!(registry.connection_count(), 0);
    assert!(registry.symbol_subscribers("BTC").is_empty());
    assert!(registry.symbol_subscribers("ETH").is_empty());
    assert!(registry
        .subscribers_for("AAPL", AssetClass::Stock)
        .is_empty());

    // Removing twice must not panic or resurrect anything.
    registry.remove_connection(id);
    assert_eq!(registry.connection_count(), 0);
}

#[tokio::test]
async fn subscribers_union_symbol_and_class_groups() {
    let registry = SubscriptionRegistry::new();
    let (by_symbol, _rx1) = registered(&registry);
    let (by_class, _rx2) = registered(&registry);
    let (both, _rx3) = registered(&registry);

    registry
        .subscribe(by_symbol, AssetClass::Crypto, &["BTC".to_string()])
        .unwrap();
    registry.subscribe_class(by_class, AssetClass::Crypto).unwrap();
    registry
        .subscribe(both, AssetClass::Crypto, &["BTC".to_string()])
        .unwrap();
    registry.subscribe_class(both, AssetClass::Crypto).unwrap();

    // A connection in both groups is targeted once, not twice.
    let targets = registry.subscribers_for("BTC", AssetClass::Crypto);
    assert_eq!(targets.len(), 3);

    // A crypto-class member does not receive stock symbols.
    let stock_targets = registry.subscribers_for("AAPL", AssetClass::Stock);
    assert!(stock_targets.is_empty());
}

#[tokio::test]
async fn send_to_delivers_and_reports_unknown() {
    let registry = SubscriptionRegistry::new();
    let (id, mut rx) = registered(&registry);

    registry.send_to(id, OutboundMessage::Pong).unwrap();
    assert!(matches!(rx.try_recv(), Ok(OutboundMessage::Pong)));

    let result = registry.send_to(ConnectionId::new(), OutboundMessage::Pong);
    assert!(matches!(result, Err(Error::UnknownConnection(_))));
}
