use std::time::Duration;

use clap::Args;
use tracing::info;
use wms_channel::{ChannelClient, Payload};

use crate::cmd::signed_in_session;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Args)]
pub struct SendArgs {
    /// Channel name, e.g. `orders`
    pub channel: String,
    /// Frame to send. Sent as JSON when it parses as JSON, as text otherwise
    pub payload: String,
    /// How long to wait for the channel to connect
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

/// Connect, send one frame, then close the channel.
pub async fn run_send(config: &CliConfig, args: SendArgs) -> CliResult<()> {
    let session = signed_in_session(config)?;
    let client = ChannelClient::new(args.channel.as_str(), &config.channel_config()?, session)?;

    let mut state_rx = client.watch_state();
    let timeout = Duration::from_secs(args.timeout_secs);
    let connected = tokio::time::timeout(timeout, async {
        state_rx.wait_for(|s| s.is_connected()).await.is_ok()
    })
    .await
    .unwrap_or(false);
    if !connected {
        client.disconnect();
        return Err(CliError::Timeout(format!(
            "after {}s waiting for channel {} to connect",
            args.timeout_secs, args.channel
        )));
    }

    client.send(parse_payload(args.payload));
    client.shutdown().await;
    info!(channel = %args.channel, "frame sent");
    Ok(())
}

fn parse_payload(raw: String) -> Payload {
    match serde_json::from_str(&raw) {
        Ok(value) => Payload::Json(value),
        Err(_) => Payload::Text(raw),
    }
}
