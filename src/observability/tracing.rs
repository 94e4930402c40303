use tracing::Span;

pub fn trace_tick_ingest(provider_id: &str, symbol: &str) -> Span {
    tracing::info_span!(
        "tick_ingest",
        provider = provider_id,
        symbol = symbol,
    )
}

pub fn trace_broadcast(symbol: &str) -> Span {
    tracing::info_span!(
        "broadcast",
        symbol = symbol,
    )
}
