use clap::Args;
use serde::Serialize;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::info;
use wms_channel::{ChannelClient, MessageRecord};

use crate::cmd::signed_in_session;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

#[derive(Args)]
pub struct WatchArgs {
    /// Channel name, e.g. `orders` or `stock`
    pub channel: String,
    /// Exit after printing this many records
    #[arg(long)]
    pub limit: Option<u64>,
}

/// One line of `watch` output.
#[derive(Serialize)]
struct Line<'a> {
    channel: &'a str,
    received_at: String,
    record: &'a MessageRecord,
}

/// Print every record that arrives on a channel as one JSON line on stdout.
pub async fn run_watch(config: &CliConfig, args: WatchArgs) -> CliResult<()> {
    let session = signed_in_session(config)?;
    if args.limit == Some(0) {
        return Ok(());
    }
    let client = ChannelClient::new(args.channel.as_str(), &config.channel_config()?, session)?;

    let mut state_rx = client.watch_state();
    let mut log_rx = client.watch_messages();
    let mut exhausted_rx = client.watch_exhausted();
    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();

    let mut seen = 0u64;
    let mut printed = 0u64;
    let outcome = loop {
        tokio::select! {
            _ = recv_signal(&mut sigint) => {
                info!("received SIGINT, stopping");
                break Ok(());
            }
            _ = recv_signal(&mut sigterm) => {
                info!("received SIGTERM, stopping");
                break Ok(());
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *state_rx.borrow_and_update();
                info!(channel = %args.channel, ?state, "connection state changed");
            }
            changed = exhausted_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                if *exhausted_rx.borrow_and_update() {
                    break Err(CliError::Exhausted(args.channel.clone()));
                }
            }
            changed = log_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let lines = {
                    let log = log_rx.borrow_and_update();
                    let lines = log
                        .since(seen)
                        .map(|record| format_line(&args.channel, record))
                        .collect::<Result<Vec<_>, _>>();
                    seen = log.received();
                    lines?
                };
                if print_lines(lines, &mut printed, args.limit) {
                    break Ok(());
                }
            }
        }
    };

    client.shutdown().await;
    outcome
}

/// Print `lines`, stopping at `limit`. Returns `true` once the limit is reached.
fn print_lines(lines: Vec<String>, printed: &mut u64, limit: Option<u64>) -> bool {
    for line in lines {
        if limit.is_some_and(|limit| *printed >= limit) {
            return true;
        }
        println!("{line}");
        *printed += 1;
    }
    limit.is_some_and(|limit| *printed >= limit)
}

fn format_line(channel: &str, record: &MessageRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Line {
        channel,
        received_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        record,
    })
}

async fn recv_signal(sig: &mut Option<Signal>) {
    match sig {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> CliConfig {
        CliConfig {
            session_file: dir.join("session.json"),
            ..CliConfig::default()
        }
    }

    fn watch(limit: Option<u64>) -> WatchArgs {
        WatchArgs {
            channel: "orders".into(),
            limit,
        }
    }

    #[tokio::test]
    async fn watch_without_token_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            origin: Some("http://127.0.0.1:9".into()),
            ..config_in(dir.path())
        };

        let err = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            run_watch(&config, watch(None)),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("not signed in"), "got: {err}");
    }

    #[tokio::test]
    async fn zero_limit_returns_without_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        wms_channel::SessionStore::load(&config.session_file)
            .unwrap()
            .set_token("tok")
            .unwrap();

        // No origin configured: reaching the channel would be an error.
        run_watch(&config, watch(Some(0))).await.unwrap();
    }

    #[test]
    fn line_carries_decoded_record() {
        let record = MessageRecord::decode(r#"{"type":"order_update","order_id":42}"#.into());
        let line = format_line("orders", &record).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["channel"], "orders");
        assert_eq!(parsed["record"]["order_id"], 42);
        assert!(parsed["received_at"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn line_marks_raw_records() {
        let line = format_line("stock", &MessageRecord::raw("not json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            parsed["record"],
            serde_json::json!({"type": "raw", "data": "not json"})
        );
    }

    #[test]
    fn print_lines_honours_limit() {
        let mut printed = 0;
        let lines = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(print_lines(lines, &mut printed, Some(2)));
        assert_eq!(printed, 2);

        let mut printed = 0;
        assert!(!print_lines(vec!["a".to_string()], &mut printed, None));
        assert_eq!(printed, 1);
    }
}
