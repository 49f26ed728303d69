mod cmd;
mod config;
mod error;

use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::time::FormatTime;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

#[derive(Parser)]
#[command(name = "wms", version, about = "Watch and drive WMS real-time channels")]
struct Cli {
    /// YAML config file (origin, session file, channel settings)
    #[arg(long, short, global = true, env = "WMS_CONFIG")]
    config: Option<PathBuf>,
    /// Application origin, overrides the config file
    #[arg(long, global = true, env = "WMS_ORIGIN")]
    origin: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every message on a channel as JSON lines
    Watch(cmd::WatchArgs),
    /// Send one frame to a channel
    Send(cmd::SendArgs),
    /// Manage the stored session token
    #[command(subcommand)]
    Session(cmd::SessionCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config::resolve(cli.config.as_deref(), cli.origin).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Watch(args) => cmd::run_watch(&config, args).await,
        Command::Send(args) => cmd::run_send(&config, args).await,
        Command::Session(command) => cmd::run_session(&config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
