use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wms_channel::{ChannelConfig, DEFAULT_HISTORY_LIMIT, RetryPolicy};

use crate::error::{CliError, CliResult};

pub(crate) const DEFAULT_SESSION_FILE: &str = "session.json";
pub(crate) const MAX_HISTORY_LIMIT: usize = 100_000;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Application origin, e.g. `https://wms.example.com`.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    #[serde(default)]
    pub channel: ChannelSettings,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            origin: None,
            session_file: default_session_file(),
            channel: ChannelSettings::default(),
        }
    }
}

fn default_session_file() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_FILE)
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub history_limit: usize,
    pub retry: RetryPolicy,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Load and validate a CLI config from a YAML file.
///
/// A relative `session_file` is resolved against the config file's parent directory.
pub async fn load(path: &Path) -> CliResult<CliConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Config(format!("read {}: {e}", path.display())))?;
    let mut config: CliConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| CliError::Config(format!("parse {}: {e}", path.display())))?;
    if let Some(config_dir) = path.parent() {
        config.resolve_relative_paths(config_dir);
    }
    validate(&config)?;
    Ok(config)
}

/// Config for this invocation: the file at `path` if one was given, defaults
/// otherwise, with `origin` (from `--origin` / `WMS_ORIGIN`) taking precedence.
pub async fn resolve(path: Option<&Path>, origin: Option<String>) -> CliResult<CliConfig> {
    let mut config = match path {
        Some(path) => load(path).await?,
        None => CliConfig::default(),
    };
    if origin.is_some() {
        config.origin = origin;
    }
    Ok(config)
}

fn validate(config: &CliConfig) -> CliResult<()> {
    let limit = config.channel.history_limit;
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(CliError::Config(format!(
            "channel.history_limit must be between 1 and {MAX_HISTORY_LIMIT}, got {limit}"
        )));
    }
    match config.channel.retry {
        RetryPolicy::Backoff {
            initial_ms, max_ms, ..
        } if initial_ms > max_ms => Err(CliError::Config(format!(
            "channel.retry: initial_ms ({initial_ms}) exceeds max_ms ({max_ms})"
        ))),
        _ => Ok(()),
    }
}

impl CliConfig {
    fn resolve_relative_paths(&mut self, config_dir: &Path) {
        if self.session_file.is_relative() {
            self.session_file = config_dir.join(&self.session_file);
        }
    }

    /// Build the channel settings shared by every channel this invocation opens.
    pub fn channel_config(&self) -> CliResult<ChannelConfig> {
        let origin = self.origin.as_deref().ok_or_else(|| {
            CliError::Config("no origin: set `origin` in the config file or pass --origin".into())
        })?;
        let mut config = ChannelConfig::parse(origin)
            .map_err(|e| CliError::Config(format!("origin {origin}: {e}")))?;
        config.retry = self.channel.retry;
        config.history_limit = self.channel.history_limit;
        Ok(config)
    }
}
