//! Error types for the ServiceNow REST client.

use serde::Deserialize;
use thiserror::Error;

/// Result type for ServiceNow API operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by [`ServiceNowClient`](super::ServiceNowClient).
///
/// These surface to callers as tool failures, never as process exits;
/// a broken instance must not take the server down.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP request itself failed (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The instance answered with a non-success status.
    #[error("ServiceNow API error (status {status}) for {path}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Request path, without the instance host.
        path: String,
        /// Message extracted from the ServiceNow error envelope, or the raw
        /// body when the envelope is absent.
        message: String,
    },

    /// The OAuth token endpoint rejected the password grant.
    #[error("OAuth token request failed (status {status}): {message}")]
    Token {
        /// HTTP status code from the token endpoint.
        status: u16,
        /// Error description from the token endpoint.
        message: String,
    },

    /// A response parsed as JSON but did not have the expected shape.
    #[error("unexpected response from {path}: {reason}")]
    UnexpectedResponse {
        /// Request path, without the instance host.
        path: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// A URL could not be built from the instance base and request path.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The error envelope ServiceNow wraps failures in.
///
/// ```json
/// {"error": {"message": "...", "detail": "..."}, "status": "failure"}
/// ```
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    detail: Option<String>,
}

impl ClientError {
    /// Builds an [`ClientError::Api`] from a failed response body,
    /// extracting the ServiceNow error envelope when present.
    #[must_use]
    pub fn from_response(status: u16, path: &str, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
            |_| body.to_string(),
            |envelope| match envelope.error.detail {
                Some(detail) if !detail.is_empty() => {
                    format!("{}: {detail}", envelope.error.message)
                }
                _ => envelope.error.message,
            },
        );
        Self::Api {
            status,
            path: path.to_string(),
            message,
        }
    }
}
