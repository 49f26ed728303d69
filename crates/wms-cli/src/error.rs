#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),

    #[error("channel error: {0}")]
    Channel(#[from] wms_channel::Error),

    #[error("timed out {0}")]
    Timeout(String),

    #[error("channel {0} gave up reconnecting")]
    Exhausted(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
