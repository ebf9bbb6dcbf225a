use thiserror::Error;

/// Error type shared by the rowcache crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Writing CSV output failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A stored or downloaded payload could not be decoded.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// A cache store rejected a read or write.
    #[error("storage error: {0}")]
    StorageError(String),

    /// The remote statement engine rejected or failed a request.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// Wraps a failed cache write with the key space it targeted.
    #[must_use]
    pub fn storage(context: impl std::fmt::Display, err: CoreError) -> Self {
        match err {
            Self::StorageError(message) => Self::StorageError(format!("{context}: {message}")),
            other => Self::StorageError(format!("{context}: {other}")),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_eof() || err.is_syntax() {
            Self::DeserializationError(err.to_string())
        } else {
            Self::SerializationError(err.to_string())
        }
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_syntax_error_maps_to_deserialization() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(
            CoreError::from(err),
            CoreError::DeserializationError(_)
        ));
    }

    #[test]
    fn test_storage_context_is_not_nested() {
        let err = CoreError::storage("view abc page 2", CoreError::StorageError("disk full".into()));
        assert_eq!(err.to_string(), "storage error: view abc page 2: disk full");

        let err = CoreError::storage("view abc meta", CoreError::SerializationError("bad".into()));
        assert_eq!(err.to_string(), "storage error: view abc meta: serialization error: bad");
    }
}
