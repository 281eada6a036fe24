//! Server configuration resolution.
//!
//! All configuration comes from the process environment (optionally seeded
//! from a `.env` file by the binary). Resolution happens once, before any
//! transport starts; the resulting [`ServerConfig`] is immutable and shared
//! by reference for the lifetime of the process.
//!
//! # Environment Variables
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `SERVICENOW_INSTANCE_URL` | Instance base URL (required) |
//! | `SERVICENOW_AUTH_TYPE` | `basic`, `oauth` or `api_key` (default `basic`) |
//! | `SERVICENOW_USERNAME` / `SERVICENOW_PASSWORD` | Basic and OAuth credentials |
//! | `SERVICENOW_CLIENT_ID` / `SERVICENOW_CLIENT_SECRET` | OAuth client credentials |
//! | `SERVICENOW_TOKEN_URL` | OAuth token endpoint (default `{instance_url}/oauth_token.do`) |
//! | `SERVICENOW_API_KEY` | API key value |
//! | `SERVICENOW_API_KEY_HEADER` | API key header (default `X-ServiceNow-API-Key`) |
//! | `SERVICENOW_DEBUG` | `true` enables debug logging (default `false`) |
//! | `SERVICENOW_TIMEOUT` | HTTP timeout in seconds (default `30`) |
//! | `SCRIPT_EXECUTION_API_RESOURCE_PATH` | Scripted REST path for script execution (optional) |
//!
//! Values that are set but empty are treated as absent.

mod auth;

pub use auth::{
    ApiKeyConfig, AuthConfig, AuthType, BasicAuthConfig, OAuthConfig, DEFAULT_API_KEY_HEADER,
};

use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the instance base URL.
pub const ENV_INSTANCE_URL: &str = "SERVICENOW_INSTANCE_URL";
/// Environment variable selecting the authentication mode.
pub const ENV_AUTH_TYPE: &str = "SERVICENOW_AUTH_TYPE";
/// Environment variable holding the account username.
pub const ENV_USERNAME: &str = "SERVICENOW_USERNAME";
/// Environment variable holding the account password.
pub const ENV_PASSWORD: &str = "SERVICENOW_PASSWORD";
/// Environment variable holding the OAuth client identifier.
pub const ENV_CLIENT_ID: &str = "SERVICENOW_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "SERVICENOW_CLIENT_SECRET";
/// Environment variable overriding the OAuth token endpoint.
pub const ENV_TOKEN_URL: &str = "SERVICENOW_TOKEN_URL";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "SERVICENOW_API_KEY";
/// Environment variable overriding the API key header name.
pub const ENV_API_KEY_HEADER: &str = "SERVICENOW_API_KEY_HEADER";
/// Environment variable enabling debug logging.
pub const ENV_DEBUG: &str = "SERVICENOW_DEBUG";
/// Environment variable setting the HTTP timeout in seconds.
pub const ENV_TIMEOUT: &str = "SERVICENOW_TIMEOUT";
/// Environment variable naming the scripted REST resource path used by
/// script execution.
pub const ENV_SCRIPT_RESOURCE_PATH: &str = "SCRIPT_EXECUTION_API_RESOURCE_PATH";

/// Default HTTP timeout applied when `SERVICENOW_TIMEOUT` is absent.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The fully resolved server configuration.
///
/// Constructed once at startup; read-only afterwards.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Instance base URL with trailing slashes trimmed.
    pub instance_url: String,
    /// The active authentication configuration.
    pub auth: AuthConfig,
    /// Whether debug logging was requested via the environment.
    pub debug: bool,
    /// Timeout applied to every outbound HTTP request.
    pub timeout: Duration,
    /// Scripted REST resource path for the script execution tool, when
    /// configured. Absence only disables that one tool.
    pub script_execution_api_resource_path: Option<String>,
}

impl ServerConfig {
    /// Resolves the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the instance URL is missing, the auth
    /// type is unknown, required credentials are absent, or the timeout is
    /// not a positive integer. All of these are fatal at startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let params: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&params)
    }

    /// Resolves the configuration from a parameter map keyed by environment
    /// variable name.
    ///
    /// Split out from [`Self::from_env`] so tests can exercise resolution
    /// without mutating process-global state.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_map(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let instance_url = params
            .get(ENV_INSTANCE_URL)
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingInstanceUrl)?
            .to_string();

        let auth = AuthConfig::from_params(params, &instance_url)?;

        let debug = params
            .get(ENV_DEBUG)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));

        let timeout = match params.get(ENV_TIMEOUT).filter(|value| !value.is_empty()) {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs >= 1 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        value: value.clone(),
                    })
                }
            },
            None => DEFAULT_TIMEOUT,
        };

        let script_execution_api_resource_path = params
            .get(ENV_SCRIPT_RESOURCE_PATH)
            .filter(|path| !path.is_empty())
            .cloned();

        Ok(Self {
            instance_url,
            auth,
            debug,
            timeout,
            script_execution_api_resource_path,
        })
    }
}
