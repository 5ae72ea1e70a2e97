//! Errors surfaced by the proxy to the browser.
//!
//! These only occur for requests the router lets fail: uncached assets and
//! non-GET passthroughs when the origin is unreachable. The browser sees a
//! failed resource load, never a crashed proxy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Structured errors for the proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Request body could not be read or exceeded the limit.
    #[error("INVALID_INPUT: {0}")]
    BadRequest(String),

    /// Request target could not be mapped onto the origin.
    #[error("INVALID_URL: {0}")]
    InvalidTarget(String),

    /// Router failure.
    #[error(transparent)]
    Router(#[from] celi_core::Error),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) | ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::Router(err) => match err {
                celi_core::Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                celi_core::Error::Network(_) | celi_core::Error::FetchTooLarge(_) => StatusCode::BAD_GATEWAY,
                celi_core::Error::InvalidUrl(_) | celi_core::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
