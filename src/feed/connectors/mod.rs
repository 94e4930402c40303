pub mod poll_rest;
pub mod push_ws;

use async_trait::async_trait;

use crate::config::{ConnectionType, ProviderConfig};
use crate::error::Result;
use crate::feed::RawTick;

/// One upstream source of ticks. The vendor wire protocol is the connector's
/// private concern; the router only sees `RawTick`s.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&mut self) -> Result<()>;
    async fn next_tick(&mut self) -> Result<RawTick>;
    fn is_connected(&self) -> bool;
    fn provider_id(&self) -> &str;
}

/// Build the connector described by a provider config entry.
pub fn build_connector(
    config: &ProviderConfig,
    io_timeout: std::time::Duration,
) -> Box<dyn FeedConnector> {
    match &config.connection {
        ConnectionType::WebSocket { url } => Box::new(push_ws::PushFeedConnector::new(
            &config.provider_id,
            url,
            &config.symbols,
        )),
        ConnectionType::RestPolling { url, interval } => Box::new(
            poll_rest::PollFeedConnector::new(&config.provider_id, url, *interval, &config.symbols, io_timeout),
        ),
    }
}
