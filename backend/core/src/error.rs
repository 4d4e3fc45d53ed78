use thiserror::Error;

/// Top-level error type for the chat relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    #[error("malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("session closed")]
    SessionClosed,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
