use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("telemetry decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("controller requires a tokio runtime")]
    NoRuntime,
}
