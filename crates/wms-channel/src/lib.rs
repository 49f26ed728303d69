//! Reconnecting real-time channel client for the warehouse application.
//!
//! Each [`ChannelClient`] owns one connection to a named channel
//! (`/ws/<channel>` on the application origin) and keeps it alive:
//! - Refuses to connect until the [`SessionProvider`] has a token
//! - Reconnects after every close or transport error (fixed 5 s delay by
//!   default, optional capped exponential backoff)
//! - Keeps the most recent 100 inbound messages, decoded as JSON with a raw
//!   text fallback
//! - Exposes connection state and the message log as `watch` receivers
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), wms_channel::Error> {
//! use std::sync::Arc;
//! use wms_channel::{ChannelClient, ChannelConfig, ConnectionState, StaticToken};
//!
//! let config = ChannelConfig::parse("https://wms.example.com")?;
//! let client = ChannelClient::new("orders", &config, Arc::new(StaticToken::new("token")))?;
//!
//! let mut state = client.watch_state();
//! let _ = state.wait_for(|s| *s == ConnectionState::Connected).await;
//! client.send(serde_json::json!({"type": "ping"}));
//!
//! let mut messages = client.watch_messages();
//! while messages.changed().await.is_ok() {
//!     if let Some(latest) = messages.borrow().latest() {
//!         println!("{latest:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod connection;
mod history;
mod retry;
mod session;
mod transport;
mod types;

pub use client::{ChannelClient, ChannelFactory};
pub use history::{MessageLog, MessageRecord, RawText};
pub use retry::{DEFAULT_RETRY_DELAY, RetryPolicy};
pub use session::{AuthGrant, SessionProvider, SessionStore, StaticToken, User};
pub use transport::{Connector, Link, LinkSink, LinkStream, WebSocketConnector, endpoint_url};
pub use types::{ChannelConfig, ConnectionState, DEFAULT_HISTORY_LIMIT, Error, Payload};
