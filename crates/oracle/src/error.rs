use std::time::Duration;

use thiserror::Error;

/// Oracle failure modes. All but `UnknownProvider` are worth retrying.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to parse oracle response: {0}")]
    Parse(String),

    #[error("Provider error: {message}")]
    Provider {
        message: String,
        status_code: Option<u16>,
    },

    #[error("No endpoint configured for provider: {0}")]
    UnknownProvider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl OracleError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::UnknownProvider(_))
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(OracleError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(OracleError::Parse("x".into()).is_retryable());
        assert!(OracleError::provider("boom").is_retryable());
        assert!(!OracleError::UnknownProvider("acme".into()).is_retryable());
    }
}
