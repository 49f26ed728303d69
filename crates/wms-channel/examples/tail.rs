//! Follow a channel and print every record to stdout.
//!
//! ```sh
//! WMS_TOKEN=<token> cargo run -p wms-channel --example tail -- <ORIGIN> <CHANNEL>
//! ```
//!
//! `ORIGIN` is the application origin, e.g. `http://localhost:8000`.
//! Records are printed as JSON (pipe to `jq` for formatting).

use std::sync::Arc;

use wms_channel::{ChannelClient, ChannelConfig, StaticToken};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let origin = args.first().ok_or("usage: tail <ORIGIN> <CHANNEL>")?;
    let channel = args.get(1).ok_or("usage: tail <ORIGIN> <CHANNEL>")?;
    let token = std::env::var("WMS_TOKEN").map_err(|_| "WMS_TOKEN is not set")?;

    let config = ChannelConfig::parse(origin)?;
    let client = ChannelClient::new(channel.as_str(), &config, Arc::new(StaticToken::new(token)))?;

    let mut messages = client.watch_messages();
    let mut seen = 0;
    while messages.changed().await.is_ok() {
        let log = messages.borrow_and_update();
        for record in log.since(seen) {
            println!("{}", serde_json::to_string(record)?);
        }
        seen = log.received();
    }
    Ok(())
}
