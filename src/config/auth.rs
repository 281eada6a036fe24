//! Authentication configuration for the ServiceNow instance.
//!
//! Exactly one authentication mode is active per process. The mode and its
//! credentials are resolved once at startup from named parameters (in
//! production, environment variables) and are immutable afterwards.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

use super::{
    ENV_API_KEY, ENV_API_KEY_HEADER, ENV_AUTH_TYPE, ENV_CLIENT_ID, ENV_CLIENT_SECRET,
    ENV_PASSWORD, ENV_TOKEN_URL, ENV_USERNAME,
};

/// Header used for API key authentication unless overridden.
pub const DEFAULT_API_KEY_HEADER: &str = "X-ServiceNow-API-Key";

/// The authentication modes the server supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// HTTP basic authentication with username and password.
    Basic,
    /// OAuth 2.0 password grant against the instance token endpoint.
    OAuth,
    /// Static API key sent in a configurable request header.
    ApiKey,
}

impl AuthType {
    /// Returns the canonical lowercase name used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::OAuth => "oauth",
            Self::ApiKey => "api_key",
        }
    }
}

impl FromStr for AuthType {
    type Err = ConfigError;

    /// Parses a selector value, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "oauth" => Ok(Self::OAuth),
            "api_key" => Ok(Self::ApiKey),
            other => Err(ConfigError::UnsupportedAuthType {
                auth_type: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuthConfig {
    /// ServiceNow account username.
    pub username: String,
    /// ServiceNow account password.
    pub password: String,
}

impl fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Credentials for the OAuth 2.0 password grant.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// OAuth client identifier registered on the instance.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// ServiceNow account username.
    pub username: String,
    /// ServiceNow account password.
    pub password: String,
    /// Token endpoint. Defaults to `{instance_url}/oauth_token.do`.
    pub token_url: String,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"****")
            .field("username", &self.username)
            .field("password", &"****")
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Credentials for static API key authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyConfig {
    /// The API key value.
    pub api_key: String,
    /// Request header the key is sent in.
    pub header_name: String,
}

impl fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyConfig")
            .field("api_key", &"****")
            .field("header_name", &self.header_name)
            .finish()
    }
}

/// The resolved authentication configuration.
///
/// Holding the credentials inside the variant guarantees that exactly one
/// payload exists and that it matches the declared mode; there is no way
/// to construct a mismatched combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthConfig {
    /// HTTP basic authentication.
    Basic(BasicAuthConfig),
    /// OAuth 2.0 password grant.
    OAuth(OAuthConfig),
    /// Static API key header.
    ApiKey(ApiKeyConfig),
}

impl AuthConfig {
    /// Returns the mode this configuration authenticates with.
    #[must_use]
    pub const fn auth_type(&self) -> AuthType {
        match self {
            Self::Basic(_) => AuthType::Basic,
            Self::OAuth(_) => AuthType::OAuth,
            Self::ApiKey(_) => AuthType::ApiKey,
        }
    }

    /// Resolves the authentication configuration from named parameters.
    ///
    /// `params` is keyed by environment variable name (`SERVICENOW_*`);
    /// values that are present but empty count as missing. `instance_url`
    /// is the already validated instance URL, used to derive the default
    /// OAuth token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedAuthType`] if the selector names an
    /// unknown mode, or [`ConfigError::MissingCredentials`] if a required
    /// credential for the selected mode is absent or empty.
    pub fn from_params(
        params: &HashMap<String, String>,
        instance_url: &str,
    ) -> Result<Self, ConfigError> {
        let auth_type = match non_empty(params, ENV_AUTH_TYPE) {
            Some(value) => value.parse::<AuthType>()?,
            None => AuthType::Basic,
        };

        match auth_type {
            AuthType::Basic => {
                let (Some(username), Some(password)) =
                    (non_empty(params, ENV_USERNAME), non_empty(params, ENV_PASSWORD))
                else {
                    return Err(ConfigError::MissingCredentials {
                        auth_type: "basic",
                        required: "SERVICENOW_USERNAME and SERVICENOW_PASSWORD",
                    });
                };
                Ok(Self::Basic(BasicAuthConfig {
                    username: username.to_string(),
                    password: password.to_string(),
                }))
            }
            AuthType::OAuth => {
                let (Some(client_id), Some(client_secret), Some(username), Some(password)) = (
                    non_empty(params, ENV_CLIENT_ID),
                    non_empty(params, ENV_CLIENT_SECRET),
                    non_empty(params, ENV_USERNAME),
                    non_empty(params, ENV_PASSWORD),
                ) else {
                    return Err(ConfigError::MissingCredentials {
                        auth_type: "oauth",
                        required: "SERVICENOW_CLIENT_ID, SERVICENOW_CLIENT_SECRET, \
                                   SERVICENOW_USERNAME and SERVICENOW_PASSWORD",
                    });
                };
                let token_url = non_empty(params, ENV_TOKEN_URL).map_or_else(
                    || format!("{instance_url}/oauth_token.do"),
                    ToString::to_string,
                );
                Ok(Self::OAuth(OAuthConfig {
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                    username: username.to_string(),
                    password: password.to_string(),
                    token_url,
                }))
            }
            AuthType::ApiKey => {
                let Some(api_key) = non_empty(params, ENV_API_KEY) else {
                    return Err(ConfigError::MissingCredentials {
                        auth_type: "api_key",
                        required: "SERVICENOW_API_KEY",
                    });
                };
                let header_name = non_empty(params, ENV_API_KEY_HEADER)
                    .map_or_else(|| DEFAULT_API_KEY_HEADER.to_string(), ToString::to_string);
                Ok(Self::ApiKey(ApiKeyConfig {
                    api_key: api_key.to_string(),
                    header_name,
                }))
            }
        }
    }
}

/// Looks up a parameter, treating empty strings as absent.
fn non_empty<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    const URL: &str = "https://dev00001.service-now.com";

    #[test]
    fn auth_type_parses_case_insensitively() {
        assert_eq!("basic".parse::<AuthType>().unwrap(), AuthType::Basic);
        assert_eq!("OAuth".parse::<AuthType>().unwrap(), AuthType::OAuth);
        assert_eq!("API_KEY".parse::<AuthType>().unwrap(), AuthType::ApiKey);
    }

    #[test]
    fn auth_type_rejects_unknown_selector() {
        let err = "kerberos".parse::<AuthType>().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedAuthType { auth_type } if auth_type == "kerberos"
        ));
    }

    #[test]
    fn defaults_to_basic_auth() {
        let p = params(&[
            ("SERVICENOW_USERNAME", "admin"),
            ("SERVICENOW_PASSWORD", "secret"),
        ]);
        let auth = AuthConfig::from_params(&p, URL).unwrap();
        assert_eq!(auth.auth_type(), AuthType::Basic);
        let AuthConfig::Basic(basic) = auth else {
            panic!("expected basic payload");
        };
        assert_eq!(basic.username, "admin");
        assert_eq!(basic.password, "secret");
    }

    #[test]
    fn basic_auth_requires_both_fields() {
        let p = params(&[
            ("SERVICENOW_AUTH_TYPE", "basic"),
            ("SERVICENOW_USERNAME", "admin"),
        ]);
        let err = AuthConfig::from_params(&p, URL).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingCredentials { auth_type: "basic", .. }
        ));
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let p = params(&[
            ("SERVICENOW_USERNAME", "admin"),
            ("SERVICENOW_PASSWORD", ""),
        ]);
        let err = AuthConfig::from_params(&p, URL).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials { .. }));
    }

    #[test]
    fn oauth_requires_all_four_credentials() {
        let p = params(&[
            ("SERVICENOW_AUTH_TYPE", "oauth"),
            ("SERVICENOW_CLIENT_ID", "cid"),
            ("SERVICENOW_CLIENT_SECRET", "shh"),
            ("SERVICENOW_USERNAME", "admin"),
        ]);
        let err = AuthConfig::from_params(&p, URL).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingCredentials { auth_type: "oauth", .. }
        ));
    }

    #[test]
    fn oauth_token_url_defaults_to_instance_endpoint() {
        let p = params(&[
            ("SERVICENOW_AUTH_TYPE", "oauth"),
            ("SERVICENOW_CLIENT_ID", "cid"),
            ("SERVICENOW_CLIENT_SECRET", "shh"),
            ("SERVICENOW_USERNAME", "admin"),
            ("SERVICENOW_PASSWORD", "secret"),
        ]);
        let auth = AuthConfig::from_params(&p, URL).unwrap();
        let AuthConfig::OAuth(oauth) = auth else {
            panic!("expected oauth payload");
        };
        assert_eq!(
            oauth.token_url,
            "https://dev00001.service-now.com/oauth_token.do"
        );
    }

    #[test]
    fn oauth_token_url_honours_override() {
        let p = params(&[
            ("SERVICENOW_AUTH_TYPE", "oauth"),
            ("SERVICENOW_CLIENT_ID", "cid"),
            ("SERVICENOW_CLIENT_SECRET", "shh"),
            ("SERVICENOW_USERNAME", "admin"),
            ("SERVICENOW_PASSWORD", "secret"),
            ("SERVICENOW_TOKEN_URL", "https://sso.example.com/token"),
        ]);
        let auth = AuthConfig::from_params(&p, URL).unwrap();
        let AuthConfig::OAuth(oauth) = auth else {
            panic!("expected oauth payload");
        };
        assert_eq!(oauth.token_url, "https://sso.example.com/token");
    }

    #[test]
    fn api_key_uses_default_header() {
        let p = params(&[
            ("SERVICENOW_AUTH_TYPE", "api_key"),
            ("SERVICENOW_API_KEY", "abc123"),
        ]);
        let auth = AuthConfig::from_params(&p, URL).unwrap();
        assert_eq!(auth.auth_type(), AuthType::ApiKey);
        let AuthConfig::ApiKey(key) = auth else {
            panic!("expected api key payload");
        };
        assert_eq!(key.api_key, "abc123");
        assert_eq!(key.header_name, DEFAULT_API_KEY_HEADER);
    }

    #[test]
    fn api_key_header_override() {
        let p = params(&[
            ("SERVICENOW_AUTH_TYPE", "api_key"),
            ("SERVICENOW_API_KEY", "abc123"),
            ("SERVICENOW_API_KEY_HEADER", "X-Custom-Key"),
        ]);
        let auth = AuthConfig::from_params(&p, URL).unwrap();
        let AuthConfig::ApiKey(key) = auth else {
            panic!("expected api key payload");
        };
        assert_eq!(key.header_name, "X-Custom-Key");
    }

    #[test]
    fn api_key_missing_is_fatal() {
        let p = params(&[("SERVICENOW_AUTH_TYPE", "api_key")]);
        let err = AuthConfig::from_params(&p, URL).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingCredentials { auth_type: "api_key", .. }
        ));
    }

    #[test]
    fn debug_output_masks_secrets() {
        let basic = BasicAuthConfig {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{basic:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));

        let oauth = OAuthConfig {
            client_id: "cid".to_string(),
            client_secret: "shh".to_string(),
            username: "admin".to_string(),
            password: "hunter2".to_string(),
            token_url: "https://example.com/token".to_string(),
        };
        let rendered = format!("{oauth:?}");
        assert!(!rendered.contains("shh"));
        assert!(!rendered.contains("hunter2"));

        let key = ApiKeyConfig {
            api_key: "abc123".to_string(),
            header_name: DEFAULT_API_KEY_HEADER.to_string(),
        };
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("abc123"));
        assert!(rendered.contains(DEFAULT_API_KEY_HEADER));
    }
}
