//! Error types for the chat core.

use std::time::Duration;

use thiserror::Error;

/// Chat core error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Rejected input (empty message content).
    #[error("validation error: {0}")]
    Validation(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A store call failed.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// A record read back from storage could not be decoded.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// HTTP transport error (store backend or chat function).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The chat function answered with a non-success status.
    #[error("responder returned status {status}: {body}")]
    ResponderStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },
    /// The responder failed to produce a reply.
    #[error("responder error: {0}")]
    Responder(String),
    /// The responder did not answer in time.
    #[error("responder timed out after {0:?}")]
    Timeout(Duration),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl ChatError {
    /// Whether the error came from the storage layer.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::InvalidRecord(_) | Self::Sqlite(_) | Self::TokioSqlite(_)
        )
    }

    /// Check if this error is worth another responder attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Http(_) => true,
            Self::ResponderStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ChatError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(
            ChatError::ResponderStatus {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ChatError::ResponderStatus {
                status: 401,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!ChatError::Validation("empty".to_string()).is_retryable());
    }

    #[test]
    fn test_persistence_classification() {
        assert!(ChatError::Persistence("down".to_string()).is_persistence());
        assert!(!ChatError::Responder("down".to_string()).is_persistence());
    }
}
