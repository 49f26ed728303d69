mod send;
mod session;
mod watch;

pub use send::{SendArgs, run_send};
pub use session::{SessionCommand, run_session};
pub use watch::{WatchArgs, run_watch};

use std::sync::Arc;

use wms_channel::SessionStore;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

fn open_session(config: &CliConfig) -> CliResult<Arc<SessionStore>> {
    Ok(Arc::new(SessionStore::load(&config.session_file)?))
}

/// Open the session and require a stored token.
///
/// A running command never sees a token stored later by another process, so
/// commands that need one fail up front instead of waiting.
fn signed_in_session(config: &CliConfig) -> CliResult<Arc<SessionStore>> {
    let session = open_session(config)?;
    if !session.is_authenticated() {
        return Err(CliError::Config(format!(
            "not signed in: no token in {} (run `wms session set`)",
            config.session_file.display()
        )));
    }
    Ok(session)
}
