//! Error types for servicenow-mcp.
//!
//! # Security Note
//!
//! Error messages are carefully crafted to NEVER include credentials.
//! Variants name the environment variables that are missing or invalid,
//! never the values that were supplied for them.

use thiserror::Error;

/// Errors that can occur while resolving the server configuration.
///
/// All of these are detected eagerly at startup and are fatal: the
/// process logs the message and exits nonzero rather than starting with
/// a partially valid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `SERVICENOW_INSTANCE_URL` is unset or empty.
    #[error("SERVICENOW_INSTANCE_URL environment variable is required")]
    MissingInstanceUrl,

    /// `SERVICENOW_AUTH_TYPE` named a mode this server does not implement.
    #[error("unsupported auth type: {auth_type}")]
    UnsupportedAuthType {
        /// The value that failed to parse (lowercased).
        auth_type: String,
    },

    /// Required credentials for the selected auth type are absent or empty.
    #[error("missing credentials for {auth_type} authentication: {required}")]
    MissingCredentials {
        /// The authentication mode that was selected.
        auth_type: &'static str,
        /// The environment variables that must be set and non-empty.
        required: &'static str,
    },

    /// `SERVICENOW_TIMEOUT` is not a positive integer number of seconds.
    #[error("invalid SERVICENOW_TIMEOUT value: {value} (expected a positive integer number of seconds)")]
    InvalidTimeout {
        /// The value that failed to parse.
        value: String,
    },
}
