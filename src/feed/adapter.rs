use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::config::{BackoffConfig, ConnectionType, ProviderConfig};
use crate::feed::connectors::{build_connector, FeedConnector};
use crate::observability::metrics;
use crate::router::engine::RouterEngine;

/// Owns one upstream connection: connect, read ticks into the router,
/// reconnect with exponential backoff on any failure.
pub struct ProviderAdapter {
    connector: Box<dyn FeedConnector>,
    engine: Arc<RouterEngine>,
    backoff: BackoffConfig,
    read_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl ProviderAdapter {
    pub fn from_config(
        config: &ProviderConfig,
        engine: Arc<RouterEngine>,
        backoff: BackoffConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        // A hung read is indistinguishable from silence, so bound it by the
        // point at which the health monitor would call the source gone.
        let read_timeout = match &config.connection {
            ConnectionType::WebSocket { .. } => config.healthy_window * 2 + backoff.io_timeout,
            ConnectionType::RestPolling { interval, .. } => *interval * 2 + backoff.io_timeout,
        };
        ProviderAdapter {
            connector: build_connector(config, backoff.io_timeout),
            engine,
            backoff,
            read_timeout,
            shutdown,
        }
    }

    /// Wire an adapter around any connector; used for custom sources.
    pub fn new(
        connector: Box<dyn FeedConnector>,
        engine: Arc<RouterEngine>,
        backoff: BackoffConfig,
        read_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        ProviderAdapter {
            connector,
            engine,
            backoff,
            read_timeout,
            shutdown,
        }
    }

    pub async fn run(self) {
        let ProviderAdapter {
            mut connector,
            engine,
            backoff,
            read_timeout,
            mut shutdown,
        } = self;
        let provider = connector.provider_id().to_string();
        let mut failed_attempts: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match timeout(backoff.io_timeout, connector.connect()).await {
                Ok(Ok(())) => {
                    failed_attempts = 0;
                    engine.on_connection_event(&provider, true);

                    // Read until the connection errors or shutdown is signalled.
                    loop {
                        tokio::select! {
                            changed = shutdown.changed() => {
                                // A dropped sender also means the process is
                                // going away.
                                if changed.is_err() || *shutdown.borrow() {
                                    engine.on_connection_event(&provider, false);
                                    return;
                                }
                            }
                            result = timeout(read_timeout, connector.next_tick()) => {
                                match result {
                                    Ok(Ok(raw)) => {
                                        metrics::TICKS_INGESTED.inc();
                                        engine.ingest(raw);
                                    }
                                    Ok(Err(e)) => {
                                        tracing::warn!(provider = %provider, error = %e, "feed read failed");
                                        break;
                                    }
                                    Err(_) => {
                                        tracing::warn!(
                                            provider = %provider,
                                            timeout = ?read_timeout,
                                            "feed read timed out"
                                        );
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    engine.on_connection_event(&provider, false);
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider = %provider, error = %e, "feed connect failed");
                    engine.on_connection_event(&provider, false);
                }
                Err(_) => {
                    tracing::warn!(
                        provider = %provider,
                        timeout = ?backoff.io_timeout,
                        "feed connect timed out"
                    );
                    engine.on_connection_event(&provider, false);
                }
            }

            failed_attempts += 1;
            if failed_attempts >= backoff.max_attempts {
                // Health decays to UNAVAILABLE on its own; restarting the
                // adapter is an operator action.
                metrics::ADAPTERS_GAVE_UP.inc();
                tracing::error!(
                    provider = %provider,
                    attempts = failed_attempts,
                    "max reconnect attempts exceeded, adapter stopped until restart"
                );
                return;
            }

            let delay = backoff.delay_for_attempt(failed_attempts - 1);
            tracing::info!(provider = %provider, ?delay, attempt = failed_attempts, "reconnecting after backoff");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}
