use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::net::TcpStream;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, WebSocketStream};

use crate::config::SymbolMapping;
use crate::error::{Error, Result};
use crate::feed::connectors::FeedConnector;
use crate::feed::RawTick;
use crate::types::asset::AssetClass;
use crate::utils::helper::current_timestamp_ms;

/// Low-latency push feed over WebSocket. Connects, sends one subscribe frame
/// for the configured symbols, then yields a tick per upstream message.
pub struct PushFeedConnector {
    provider_id: String,
    ws_url: String,
    classes: HashMap<String, AssetClass>,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl PushFeedConnector {
    pub fn new(provider_id: &str, ws_url: &str, symbols: &[SymbolMapping]) -> Self {
        PushFeedConnector {
            provider_id: provider_id.to_string(),
            ws_url: ws_url.to_string(),
            classes: symbols
                .iter()
                .map(|m| (m.symbol.clone(), m.asset_class))
                .collect(),
            stream: None,
        }
    }
}

#[async_trait]
impl FeedConnector for PushFeedConnector {
    async fn connect(&mut self) -> Result<()> {
        let (mut ws_stream, _) = connect_async(&self.ws_url)
            .await
            .map_err(|e| Error::WebSocketError(format!("connection failed: {}", e)))?;

        let subscribe = serde_json::json!({
            "op": "subscribe",
            "symbols": self.classes.keys().collect::<Vec<_>>(),
        });
        ws_stream
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(|e| Error::WebSocketError(format!("subscribe failed: {}", e)))?;

        self.stream = Some(ws_stream);
        tracing::info!(provider = %self.provider_id, url = %self.ws_url, "push feed connected");
        Ok(())
    }

    async fn next_tick(&mut self) -> Result<RawTick> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: PushTickFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(_) => {
                            // Acks and heartbeats share the channel.
                            tracing::trace!(provider = %self.provider_id, "ignoring non-tick frame");
                            continue;
                        }
                    };

                    let Some(asset_class) = self.classes.get(&frame.symbol).copied() else {
                        tracing::debug!(
                            provider = %self.provider_id,
                            symbol = %frame.symbol,
                            "tick for unsubscribed symbol"
                        );
                        continue;
                    };

                    return Ok(RawTick {
                        provider_id: self.provider_id.clone(),
                        symbol: frame.symbol,
                        asset_class,
                        price: frame
                            .price
                            .parse()
                            .map_err(|_| Error::InvalidFeedPrice)?,
                        previous_close: None,
                        percent_change: frame.change_percent,
                        open: None,
                        volume: frame.volume.as_deref().and_then(|v| v.parse().ok()),
                        timestamp: frame.timestamp,
                        received_at: current_timestamp_ms(),
                    });
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(Error::ConnectionClosed);
                }
                Some(Ok(_)) => continue, // pings, pongs, binary frames
                Some(Err(e)) => {
                    return Err(Error::WebSocketError(e.to_string()));
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

#[derive(Deserialize)]
struct PushTickFrame {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "v")]
    volume: Option<String>,
    #[serde(rename = "cp")]
    change_percent: Option<f64>,
    #[serde(rename = "t")]
    timestamp: u64,
}
