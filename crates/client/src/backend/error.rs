//! Backend client error types.

use std::sync::Arc;

/// Errors from the app backend client.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Invalid request parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Base URL or login path could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The backend redirected a data request to its login page.
    #[error("login required: redirected to {0}")]
    LoginRequired(String),

    /// HTTP error response without a readable contract body.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { BackendError::Timeout } else { BackendError::Network(Arc::new(err)) }
    }
}

impl From<BackendError> for celi_core::Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InvalidInput(msg) => celi_core::Error::InvalidInput(msg),
            BackendError::InvalidUrl(msg) => celi_core::Error::InvalidUrl(msg),
            BackendError::Timeout => celi_core::Error::FetchTimeout("backend request timed out".into()),
            other => celi_core::Error::Network(other.to_string()),
        }
    }
}
