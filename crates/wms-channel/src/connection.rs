//! Connection management: the per-channel session task and its reconnect loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::history::{MessageLog, MessageRecord};
use crate::retry::{RetryPolicy, millis};
use crate::session::SessionProvider;
use crate::transport::{Connector, Link, LinkSink};
use crate::types::ConnectionState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on a graceful close before the link is simply dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// State shared between a client handle and its session task
// ---------------------------------------------------------------------------

pub(crate) struct Shared {
    pub channel: String,
    pub state: watch::Sender<ConnectionState>,
    pub log: watch::Sender<MessageLog>,
    pub exhausted: watch::Sender<bool>,
    pub cancel: CancellationToken,
    pub wake: Notify,
}

impl Shared {
    pub(crate) fn new(channel: String, history_limit: usize) -> Self {
        Self {
            channel,
            state: watch::Sender::new(ConnectionState::Disconnected),
            log: watch::Sender::new(MessageLog::new(history_limit)),
            exhausted: watch::Sender::new(false),
            cancel: CancellationToken::new(),
            wake: Notify::new(),
        }
    }

    /// Publish a state transition unless the client has been disconnected.
    ///
    /// The cancellation check runs under the watch lock, so once
    /// `disconnect()` has cancelled and published `Disconnected`, no later
    /// transition from the session task can be observed.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if self.cancel.is_cancelled() {
                return false;
            }
            applied = true;
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        applied
    }

    fn record(&self, text: String) {
        let record = MessageRecord::decode(text);
        self.log.send_modify(|log| log.push(record));
    }
}

// ---------------------------------------------------------------------------
// Background session task
// ---------------------------------------------------------------------------

pub(crate) struct EventLoopState {
    pub shared: Arc<Shared>,
    pub connector: Arc<dyn Connector>,
    pub session: Arc<dyn SessionProvider>,
    pub url: Url,
    pub retry: RetryPolicy,
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum LinkExit {
    Closed,
    Cancelled,
}

pub(crate) async fn run_event_loop(mut p: EventLoopState) {
    let mut attempt: u32 = 0;

    loop {
        if !wait_for_token(&p).await {
            return;
        }
        if !p.shared.transition(ConnectionState::Connecting) {
            return;
        }
        tracing::debug!(channel = %p.shared.channel, url = %p.url, "Opening channel");

        let opened = tokio::select! {
            biased;
            _ = p.shared.cancel.cancelled() => return,
            opened = p.connector.open(&p.url) => opened,
        };

        match opened {
            Ok(link) => {
                attempt = 0;
                if !p.shared.transition(ConnectionState::Connected) {
                    let Link { mut sink, .. } = link;
                    close_sink(&mut sink).await;
                    return;
                }
                tracing::info!(channel = %p.shared.channel, "Channel connected");
                if pump(&mut p, link).await == LinkExit::Cancelled {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(channel = %p.shared.channel, "Failed to open channel: {e}");
            }
        }

        // --- Reconnection ---
        p.shared.transition(ConnectionState::Disconnected);
        discard_outbound(&mut p);

        attempt = attempt.saturating_add(1);
        let Some(delay) = p.retry.delay_for(attempt) else {
            tracing::error!(
                channel = %p.shared.channel,
                failures = attempt,
                "Giving up on channel after repeated failures",
            );
            if !wait_for_wake(&p).await {
                return;
            }
            attempt = 0;
            continue;
        };
        tracing::debug!(
            channel = %p.shared.channel,
            attempt,
            delay_ms = millis(delay),
            "Scheduling reconnect",
        );
        tokio::select! {
            biased;
            _ = p.shared.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Forward frames in both directions until the link ends or the client is
/// disconnected.
async fn pump(p: &mut EventLoopState, link: Link) -> LinkExit {
    let Link {
        mut sink,
        mut stream,
    } = link;

    loop {
        // Frames accepted while connected are written before a disconnect
        // closes the link.
        tokio::select! {
            biased;
            Some(text) = p.outbound_rx.recv() => {
                if let Err(e) = sink.send(text).await {
                    tracing::warn!(channel = %p.shared.channel, "Failed to send frame: {e}");
                }
            }
            _ = p.shared.cancel.cancelled() => {
                tracing::info!(channel = %p.shared.channel, "Disconnect requested");
                close_sink(&mut sink).await;
                return LinkExit::Cancelled;
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(text)) => p.shared.record(text),
                    Some(Err(e)) => {
                        tracing::warn!(channel = %p.shared.channel, "Channel transport error: {e}");
                        close_sink(&mut sink).await;
                        return LinkExit::Closed;
                    }
                    None => {
                        tracing::info!(channel = %p.shared.channel, "Channel closed");
                        return LinkExit::Closed;
                    }
                }
            }
        }
    }
}

async fn close_sink(sink: &mut LinkSink) {
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Error while closing link: {e}"),
        Err(_) => tracing::debug!("Timed out closing link"),
    }
}

/// Sends accepted while connected but not yet written when the link went
/// down are dropped, never carried over to the next link.
fn discard_outbound(p: &mut EventLoopState) {
    let mut dropped = 0usize;
    while p.outbound_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::debug!(channel = %p.shared.channel, dropped, "Dropped unsent frames");
    }
}

/// Resolve once the session provider has a token. Returns `false` if the
/// client was disconnected while waiting.
async fn wait_for_token(p: &EventLoopState) -> bool {
    loop {
        let notified = p.shared.wake.notified();
        tokio::pin!(notified);
        // Register before checking so a connect() racing the check is not lost.
        notified.as_mut().enable();

        if p.session.token().is_some() {
            return true;
        }
        tracing::debug!(channel = %p.shared.channel, "No session token, waiting for connect()");
        tokio::select! {
            biased;
            _ = p.shared.cancel.cancelled() => return false,
            _ = &mut notified => {}
        }
    }
}

/// Park after the retry policy gave up, until an explicit connect().
async fn wait_for_wake(p: &EventLoopState) -> bool {
    let notified = p.shared.wake.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();
    p.shared.exhausted.send_modify(|e| *e = true);

    let woken = tokio::select! {
        biased;
        _ = p.shared.cancel.cancelled() => false,
        _ = &mut notified => true,
    };
    if woken {
        p.shared.exhausted.send_modify(|e| *e = false);
    }
    woken
}
