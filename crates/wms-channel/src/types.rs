//! Public types for the wms-channel crate.

use std::path::PathBuf;

use tokio_tungstenite::tungstenite;
use url::Url;

use crate::retry::RetryPolicy;

/// Number of records a channel keeps when no limit is configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Connection state of a [`ChannelClient`](crate::ChannelClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Outbound payload accepted by [`ChannelClient::send`](crate::ChannelClient::send).
///
/// Text goes on the wire as-is; JSON values are serialized first.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    pub(crate) fn into_text(self) -> String {
        match self {
            Payload::Text(text) => text,
            Payload::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Settings shared by every channel opened against one origin.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Origin of the hosting application, e.g. `https://wms.example.com`.
    /// `https` origins connect over `wss`, `http` origins over `ws`.
    pub origin: Url,
    /// Reconnect policy. Defaults to a fixed 5 second delay, forever.
    pub retry: RetryPolicy,
    /// Maximum number of records kept in the message log.
    pub history_limit: usize,
}

impl ChannelConfig {
    /// Create a config with default retry and history settings.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            retry: RetryPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Parse `origin` and create a config with default settings.
    pub fn parse(origin: &str) -> Result<Self, Error> {
        Ok(Self::new(Url::parse(origin)?))
    }
}

/// Errors returned by this crate.
///
/// Transport failures after construction never surface here; they only drive
/// the connection state and the reconnect schedule.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported origin {0}: expected an http or https URL with a host")]
    InvalidOrigin(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session file {}: {source}", path.display())]
    Session {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("transport link closed")]
    LinkClosed,

    #[error("no tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}
