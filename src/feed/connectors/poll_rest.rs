use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::SymbolMapping;
use crate::error::{Error, Result};
use crate::feed::connectors::FeedConnector;
use crate::feed::RawTick;
use crate::types::asset::AssetClass;
use crate::utils::helper::current_timestamp_ms;

/// Slower polling fallback feed. Fetches a quote batch per interval and
/// yields the quotes one at a time.
pub struct PollFeedConnector {
    provider_id: String,
    url: String,
    interval: Duration,
    classes: HashMap<String, AssetClass>,
    symbol_list: String,
    client: Option<reqwest::Client>,
    io_timeout: Duration,
    queue: VecDeque<RawTick>,
    last_poll: Option<Instant>,
}

impl PollFeedConnector {
    pub fn new(
        provider_id: &str,
        url: &str,
        interval: Duration,
        symbols: &[SymbolMapping],
        io_timeout: Duration,
    ) -> Self {
        PollFeedConnector {
            provider_id: provider_id.to_string(),
            url: url.to_string(),
            interval,
            classes: symbols
                .iter()
                .map(|m| (m.symbol.clone(), m.asset_class))
                .collect(),
            symbol_list: symbols
                .iter()
                .map(|m| m.symbol.as_str())
                .collect::<Vec<_>>()
                .join(","),
            client: None,
            io_timeout,
            queue: VecDeque::new(),
            last_poll: None,
        }
    }

    async fn poll_once(&mut self) -> Result<()> {
        let client = self.client.as_ref().ok_or(Error::NotConnected)?;
        let url = format!("{}?symbols={}", self.url, self.symbol_list);

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::HttpError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::HttpError(format!(
                "poll returned {}",
                response.status()
            )));
        }

        let quotes: Vec<PollQuote> = response
            .json()
            .await
            .map_err(|e| Error::DeserializationError(e.to_string()))?;

        let received_at = current_timestamp_ms();
        for quote in quotes {
            let Some(asset_class) = self.classes.get(&quote.symbol).copied() else {
                continue;
            };
            self.queue.push_back(RawTick {
                provider_id: self.provider_id.clone(),
                symbol: quote.symbol,
                asset_class,
                price: quote.price,
                previous_close: quote.previous_close,
                percent_change: quote.change_percent,
                open: quote.open,
                volume: quote.volume,
                timestamp: quote.timestamp.unwrap_or(received_at),
                received_at,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedConnector for PollFeedConnector {
    async fn connect(&mut self) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(self.io_timeout)
            .build()
            .map_err(|e| Error::HttpError(e.to_string()))?;
        self.client = Some(client);
        tracing::info!(provider = %self.provider_id, url = %self.url, "poll feed ready");
        Ok(())
    }

    async fn next_tick(&mut self) -> Result<RawTick> {
        loop {
            if let Some(tick) = self.queue.pop_front() {
                return Ok(tick);
            }

            if let Some(last) = self.last_poll {
                let elapsed = last.elapsed();
                if elapsed < self.interval {
                    tokio::time::sleep(self.interval - elapsed).await;
                }
            }
            self.last_poll = Some(Instant::now());
            self.poll_once().await?;

            if self.queue.is_empty() {
                // A valid but empty batch; try again next interval.
                tracing::debug!(provider = %self.provider_id, "poll returned no quotes");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollQuote {
    symbol: String,
    price: f64,
    previous_close: Option<f64>,
    change_percent: Option<f64>,
    open: Option<f64>,
    volume: Option<f64>,
    /// Ms since epoch; delayed feeds often omit it.
    timestamp: Option<u64>,
}
