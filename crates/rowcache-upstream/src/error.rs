use thiserror::Error;

use rowcache_core::CoreError;

/// Failures talking to the remote statement engine.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The engine answered with a non-success status.
    #[error("upstream returned HTTP {status} for {path}: {body}")]
    Http {
        status: u16,
        path: String,
        body: String,
    },

    /// Connection, timeout or body read failure.
    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream did not return a statement_id")]
    MissingStatementId,

    /// A body that is not a JSON row array.
    #[error("unexpected upstream payload: {0}")]
    UnexpectedPayload(String),

    #[error("missing required upstream configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<UpstreamError> for CoreError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Config(message) => CoreError::Config(message),
            other => CoreError::Upstream(other.to_string()),
        }
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;
