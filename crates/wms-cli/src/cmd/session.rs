use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;
use tracing::info;
use wms_channel::{AuthGrant, SessionStore, User};

use crate::cmd::open_session;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Store a token, optionally with the signed-in user's record
    Set {
        #[arg(long, env = "WMS_TOKEN", hide_env_values = true)]
        token: String,
        /// JSON file holding the `user` object from the login response
        #[arg(long)]
        user_file: Option<PathBuf>,
    },
    /// Print the stored session (never the token)
    Show,
    /// Sign out and delete the session file
    Clear,
}

#[derive(Serialize)]
struct SessionSummary {
    authenticated: bool,
    full_name: String,
    user: Option<User>,
    session_file: PathBuf,
}

pub async fn run_session(config: &CliConfig, command: SessionCommand) -> CliResult<()> {
    let store = open_session(config)?;
    match command {
        SessionCommand::Set { token, user_file } => {
            if token.trim().is_empty() {
                return Err(CliError::Config("token must not be empty".into()));
            }
            match user_file {
                Some(path) => {
                    let user = read_user(&path).await?;
                    store.set_auth(AuthGrant {
                        access_token: token,
                        user,
                    })?;
                }
                None => store.set_token(token)?,
            }
            info!(session_file = %config.session_file.display(), "session stored");
        }
        SessionCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&summary(&store, config))?);
        }
        SessionCommand::Clear => {
            store.logout()?;
            info!(session_file = %config.session_file.display(), "signed out");
        }
    }
    Ok(())
}

async fn read_user(path: &std::path::Path) -> CliResult<User> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Config(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Config(format!("parse {}: {e}", path.display())))
}

fn summary(store: &SessionStore, config: &CliConfig) -> SessionSummary {
    SessionSummary {
        authenticated: store.is_authenticated(),
        full_name: store.full_name(),
        user: store.user(),
        session_file: config.session_file.clone(),
    }
}
