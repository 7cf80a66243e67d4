//! Error types for gateway requests.

use thiserror::Error;

use burble_core::error::BurbleError;

/// Errors from the backend gateway.
///
/// Every variant is recoverable: the caller rolls back the attempted state
/// transition and the visitor may retry manually.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never reached the backend (DNS, connect, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success HTTP status.
    #[error("{operation} returned HTTP {status}")]
    Status { operation: &'static str, status: u16 },

    /// The response body did not match the expected shape.
    #[error("invalid response from {operation}: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

impl From<GatewayError> for BurbleError {
    fn from(err: GatewayError) -> Self {
        BurbleError::Gateway(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}
