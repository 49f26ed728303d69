//! Public entry point: [`ChannelClient`] and [`ChannelFactory`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::connection::{EventLoopState, Shared, run_event_loop};
use crate::history::{MessageLog, MessageRecord};
use crate::session::SessionProvider;
use crate::transport::{Connector, WebSocketConnector, endpoint_url};
use crate::types::{ChannelConfig, ConnectionState, Error, Payload};

/// Live view of one named real-time channel.
///
/// Creating a client spawns a session task on the current tokio runtime and
/// immediately requests a connection. From then on the task keeps the channel
/// connected: after every close it waits for the configured retry delay and
/// reconnects, until [`disconnect`](ChannelClient::disconnect) is called or
/// the client is dropped.
///
/// State is exposed through `watch` receivers so any number of independent
/// consumers can observe it. Transport failures are never returned to the
/// caller; they only show up as state transitions.
pub struct ChannelClient {
    shared: Arc<Shared>,
    outbound_tx: mpsc::UnboundedSender<String>,
    task: Option<JoinHandle<()>>,
}

impl ChannelClient {
    /// Open `channel` over WebSocket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        channel: impl Into<String>,
        config: &ChannelConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, Error> {
        Self::with_connector(channel, config, session, Arc::new(WebSocketConnector))
    }

    /// Open `channel` through a custom transport.
    pub fn with_connector(
        channel: impl Into<String>,
        config: &ChannelConfig,
        session: Arc<dyn SessionProvider>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, Error> {
        let channel = channel.into();
        let url = endpoint_url(&config.origin, &channel)?;
        let runtime = tokio::runtime::Handle::try_current()?;

        let shared = Arc::new(Shared::new(channel, config.history_limit));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let task = runtime.spawn(run_event_loop(EventLoopState {
            shared: Arc::clone(&shared),
            connector,
            session,
            url,
            retry: config.retry,
            outbound_rx,
        }));

        Ok(Self {
            shared,
            outbound_tx,
            task: Some(task),
        })
    }

    pub fn channel(&self) -> &str {
        &self.shared.channel
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Snapshot of the message log, oldest first.
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.shared.log.borrow().to_vec()
    }

    pub fn watch_messages(&self) -> watch::Receiver<MessageLog> {
        self.shared.log.subscribe()
    }

    /// Becomes `true` when a [`Backoff`](crate::RetryPolicy::Backoff) policy
    /// ran out of attempts. The client then stays disconnected until
    /// [`connect`](ChannelClient::connect) is called. Never set under the
    /// default fixed policy.
    pub fn watch_exhausted(&self) -> watch::Receiver<bool> {
        self.shared.exhausted.subscribe()
    }

    /// Request a connection.
    ///
    /// Runs automatically at construction. Only has an effect while the
    /// client is idle: waiting for a session token, or parked after its retry
    /// policy gave up. A connection or scheduled retry already in progress is
    /// left alone, and a disconnected client stays disconnected.
    pub fn connect(&self) {
        if self.shared.cancel.is_cancelled() {
            tracing::debug!(channel = %self.shared.channel, "connect() after disconnect ignored");
            return;
        }
        self.shared.wake.notify_waiters();
    }

    /// Send a frame if the channel is connected; otherwise drop it.
    ///
    /// Nothing is queued: a frame sent while disconnected, or one still
    /// pending when the link goes down, is discarded.
    pub fn send(&self, payload: impl Into<Payload>) {
        if !self.state().is_connected() {
            tracing::trace!(channel = %self.shared.channel, "Dropping send while not connected");
            return;
        }
        let _ = self.outbound_tx.send(payload.into().into_text());
    }

    /// Tear the channel down.
    ///
    /// Cancels any pending retry, closes the live link and marks the client
    /// disconnected before returning. Safe to call repeatedly; also runs on
    /// drop.
    pub fn disconnect(&self) {
        self.shared.cancel.cancel();
        self.shared
            .state
            .send_modify(|state| *state = ConnectionState::Disconnected);
    }

    /// Disconnect and wait for the session task to finish, so frames
    /// accepted before the call are written and the link is closed.
    pub async fn shutdown(mut self) {
        self.disconnect();
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.await {
            tracing::warn!(channel = %self.shared.channel, "Session task failed: {e}");
        }
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("channel", &self.shared.channel)
            .field("state", &self.state())
            .finish()
    }
}

/// Opens channels that share one origin, session and transport.
#[derive(Clone)]
pub struct ChannelFactory {
    config: ChannelConfig,
    session: Arc<dyn SessionProvider>,
    connector: Arc<dyn Connector>,
}

impl ChannelFactory {
    pub fn new(config: ChannelConfig, session: Arc<dyn SessionProvider>) -> Self {
        Self::with_connector(config, session, Arc::new(WebSocketConnector))
    }

    pub fn with_connector(
        config: ChannelConfig,
        session: Arc<dyn SessionProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            config,
            session,
            connector,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Create an independent client for `channel`.
    pub fn open(&self, channel: &str) -> Result<ChannelClient, Error> {
        ChannelClient::with_connector(
            channel,
            &self.config,
            Arc::clone(&self.session),
            Arc::clone(&self.connector),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
