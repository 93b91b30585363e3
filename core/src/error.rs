//! Error types for the rental API client.
//!
//! # Design
//! Authorization failures get a dedicated variant because the client has
//! already torn the session down by the time the caller sees them; most
//! callers simply stop. All other non-2xx responses land in `Api` with the
//! backend-supplied message (or a fixed fallback).

use thiserror::Error;

/// Fallback message when a failed response carries no `message` field.
pub const FALLBACK_MESSAGE: &str = "Something went wrong";

/// Message for bodies that cannot be parsed as JSON.
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response format";

/// Message for a declined simulated payment.
pub const PAYMENT_DECLINED_MESSAGE: &str = "Payment failed. Please try again.";

/// Result alias used throughout the crate.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by `RentalClient` parse methods and the blocking façade.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 401 or 403. The stored token has been cleared and
    /// a force-logout event published before this value is returned.
    #[error("session expired (HTTP {status})")]
    SessionExpired { status: u16 },

    /// The server returned a non-2xx status other than 401/403.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The response body could not be parsed into the expected shape.
    #[error("Invalid response format")]
    InvalidResponse(#[source] serde_json::Error),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The HTTP round-trip itself failed (DNS, connect, I/O).
    #[error("transport error: {0}")]
    Transport(String),

    /// The simulated payment gateway declined the charge.
    #[error("Payment failed. Please try again.")]
    PaymentDeclined,

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The token store could not be read or written.
    #[error("token storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// True for the 401/403 teardown case.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SessionExpired { status } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_backend_message() {
        let err = ApiError::Api {
            status: 400,
            message: "Product not found".to_string(),
        };
        assert_eq!(err.to_string(), "Product not found");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn invalid_response_uses_fixed_message() {
        let source = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        assert_eq!(ApiError::InvalidResponse(source).to_string(), "Invalid response format");
    }

    #[test]
    fn only_session_expired_is_auth_failure() {
        assert!(ApiError::SessionExpired { status: 403 }.is_auth_failure());
        assert!(!ApiError::PaymentDeclined.is_auth_failure());
        assert_eq!(ApiError::PaymentDeclined.status(), None);
    }
}
