use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Provider connection errors
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Feed deserialization failed: {0}")]
    DeserializationError(String),

    #[error("Feed connector not connected")]
    NotConnected,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid price in feed payload")]
    InvalidFeedPrice,

    // Subscription errors
    #[error("Subscription request contained no symbols")]
    NoSymbols,

    #[error("Unknown connection: {0}")]
    UnknownConnection(crate::types::ids::ConnectionId),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Router requires at least one enabled provider")]
    NoProvidersConfigured,

    // Task supervision errors
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Stable machine-readable code reported to downstream callers.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoSymbols => "NoSymbols",
            Error::UnknownConnection(_) => "UnknownConnection",
            Error::ConfigError(_) | Error::NoProvidersConfigured => "ConfigError",
            _ => "InternalError",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
