use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, HistogramOpts, IntGauge, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Ingestion metrics
    pub static ref TICKS_INGESTED: Counter = Counter::new(
        "ticks_ingested_total",
        "Total raw ticks read from provider feeds"
    ).unwrap();

    pub static ref TICKS_REJECTED: Counter = Counter::new(
        "ticks_rejected_total",
        "Total ticks rejected by validation"
    ).unwrap();

    pub static ref TICKS_ROUTED: Counter = Counter::new(
        "ticks_routed_total",
        "Total ticks forwarded by the router"
    ).unwrap();

    pub static ref TICKS_DROPPED_INACTIVE: Counter = Counter::new(
        "ticks_dropped_inactive_total",
        "Total ticks dropped because their provider was not the active route"
    ).unwrap();

    pub static ref TICKS_OUT_OF_ORDER: Counter = Counter::new(
        "ticks_out_of_order_total",
        "Total ticks dropped for going backwards in source time"
    ).unwrap();

    pub static ref DISCREPANCIES_FLAGGED: Counter = Counter::new(
        "discrepancies_flagged_total",
        "Total cross-source price discrepancies flagged"
    ).unwrap();

    // Route metrics
    pub static ref ROUTE_FAILOVERS: Counter = Counter::new(
        "route_failovers_total",
        "Total transitions onto the fallback source"
    ).unwrap();

    pub static ref ROUTE_FAILBACKS: Counter = Counter::new(
        "route_failbacks_total",
        "Total transitions back onto the primary source"
    ).unwrap();

    pub static ref ROUTE_OUTAGES: Counter = Counter::new(
        "route_outages_total",
        "Total transitions into BOTH_UNAVAILABLE"
    ).unwrap();

    pub static ref ADAPTERS_GAVE_UP: Counter = Counter::new(
        "adapters_gave_up_total",
        "Provider adapters stopped after exhausting reconnect attempts"
    ).unwrap();

    // Fan-out metrics
    pub static ref BROADCASTS_SENT: Counter = Counter::new(
        "broadcasts_sent_total",
        "Total messages queued to subscriber connections"
    ).unwrap();

    pub static ref BROADCAST_ERRORS: Counter = Counter::new(
        "broadcast_errors_total",
        "Total per-connection delivery failures"
    ).unwrap();

    pub static ref ACTIVE_CONNECTIONS: IntGauge = IntGauge::new(
        "active_connections",
        "Downstream connections currently registered"
    ).unwrap();

    pub static ref TRACKED_SYMBOLS: IntGauge = IntGauge::new(
        "tracked_symbols",
        "Symbols with live router state"
    ).unwrap();

    // Latency metrics
    pub static ref FEED_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "feed_latency_seconds",
            "Source-to-ingestion latency of accepted ticks"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0])
    ).unwrap();
}

pub fn register_metrics() {
    REGISTRY.register(Box::new(TICKS_INGESTED.clone())).unwrap();
    REGISTRY.register(Box::new(TICKS_REJECTED.clone())).unwrap();
    REGISTRY.register(Box::new(TICKS_ROUTED.clone())).unwrap();
    REGISTRY.register(Box::new(TICKS_DROPPED_INACTIVE.clone())).unwrap();
    REGISTRY.register(Box::new(TICKS_OUT_OF_ORDER.clone())).unwrap();
    REGISTRY.register(Box::new(DISCREPANCIES_FLAGGED.clone())).unwrap();
    REGISTRY.register(Box::new(ROUTE_FAILOVERS.clone())).unwrap();
    REGISTRY.register(Box::new(ROUTE_FAILBACKS.clone())).unwrap();
    REGISTRY.register(Box::new(ROUTE_OUTAGES.clone())).unwrap();
    REGISTRY.register(Box::new(ADAPTERS_GAVE_UP.clone())).unwrap();
    REGISTRY.register(Box::new(BROADCASTS_SENT.clone())).unwrap();
    REGISTRY.register(Box::new(BROADCAST_ERRORS.clone())).unwrap();
    REGISTRY.register(Box::new(ACTIVE_CONNECTIONS.clone())).unwrap();
    REGISTRY.register(Box::new(TRACKED_SYMBOLS.clone())).unwrap();
    REGISTRY.register(Box::new(FEED_LATENCY.clone())).unwrap();
}
