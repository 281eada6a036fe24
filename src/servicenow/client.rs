//! HTTP client for the ServiceNow REST API.
//!
//! One client instance is built at startup from the resolved
//! [`ServerConfig`] and shared by every tool invocation. It applies the
//! configured authentication mode to each request, speaks the Table API
//! dialect (`/api/now/table/{table}`), and unwraps the `{"result": ...}`
//! envelope ServiceNow puts around every success body.

use std::time::{Duration, Instant};

use reqwest::{header, Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::config::{AuthConfig, ServerConfig};

use super::error::{ClientError, ClientResult};

/// Fallback token lifetime when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 1800;

/// Tokens are refreshed this many seconds before they would expire.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 30;

/// Cap on accepted `expires_in` values; anything larger would overflow
/// `Instant` arithmetic.
const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 86_400;

/// Query options for Table API list requests.
///
/// Every field maps to one `sysparm_*` query parameter; unset fields are
/// omitted from the request.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Encoded query filter (`sysparm_query`), e.g. `active=true^category=x`.
    pub query: Option<String>,
    /// Maximum number of records (`sysparm_limit`).
    pub limit: Option<u32>,
    /// Number of records to skip (`sysparm_offset`).
    pub offset: Option<u32>,
    /// Comma-separated field list (`sysparm_fields`).
    pub fields: Option<String>,
    /// Return display values instead of raw values (`sysparm_display_value`).
    pub display_value: bool,
    /// Omit reference links from the payload (`sysparm_exclude_reference_link`).
    pub exclude_reference_link: bool,
}

/// A cached OAuth access token.
#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Successful response from the OAuth token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

const fn default_token_lifetime() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

/// Error body from the OAuth token endpoint (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for one ServiceNow instance.
#[derive(Debug)]
pub struct ServiceNowClient {
    http: Client,
    base_url: Url,
    auth: AuthConfig,
    token_cache: Mutex<Option<CachedToken>>,
}

impl ServiceNowClient {
    /// Builds a client from the resolved server configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance URL does not parse or the underlying
    /// HTTP client cannot be constructed.
    pub fn new(config: &ServerConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.instance_url)?;
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url,
            auth: config.auth.clone(),
            token_cache: Mutex::new(None),
        })
    }

    /// Builds an absolute URL for a request path on the instance.
    ///
    /// The path is joined as an absolute path, so the instance host is kept
    /// and any base path is replaced.
    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        if path.starts_with('/') {
            Ok(self.base_url.join(path)?)
        } else {
            Ok(self.base_url.join(&format!("/{path}"))?)
        }
    }

    /// Builds the Table API list URL for `table` with `query` applied.
    fn list_url(&self, table: &str, query: &ListQuery) -> ClientResult<Url> {
        let mut url = self.endpoint(&format!("/api/now/table/{table}"))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(ref filter) = query.query {
                pairs.append_pair("sysparm_query", filter);
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("sysparm_limit", &limit.to_string());
            }
            if let Some(offset) = query.offset {
                pairs.append_pair("sysparm_offset", &offset.to_string());
            }
            if let Some(ref fields) = query.fields {
                pairs.append_pair("sysparm_fields", fields);
            }
            if query.display_value {
                pairs.append_pair("sysparm_display_value", "true");
            }
            if query.exclude_reference_link {
                pairs.append_pair("sysparm_exclude_reference_link", "true");
            }
        }
        Ok(url)
    }

    /// Applies the configured authentication to a request.
    async fn authorize(&self, builder: RequestBuilder) -> ClientResult<RequestBuilder> {
        match &self.auth {
            AuthConfig::Basic(basic) => {
                Ok(builder.basic_auth(&basic.username, Some(&basic.password)))
            }
            AuthConfig::OAuth(_) => {
                let token = self.access_token().await?;
                Ok(builder.bearer_auth(token))
            }
            AuthConfig::ApiKey(key) => Ok(builder.header(&key.header_name, &key.api_key)),
        }
    }

    /// Returns a valid OAuth access token, fetching one if the cache is
    /// empty or the cached token is about to expire.
    async fn access_token(&self) -> ClientResult<String> {
        let AuthConfig::OAuth(oauth) = &self.auth else {
            // authorize() only calls this in the OAuth arm.
            return Err(ClientError::Token {
                status: 0,
                message: "OAuth token requested without OAuth configuration".to_string(),
            });
        };

        let mut cache = self.token_cache.lock().await;
        if let Some(token) = cache.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        debug!(token_url = %oauth.token_url, "requesting OAuth access token");
        let response = self
            .http
            .post(&oauth.token_url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", &oauth.client_id),
                ("client_secret", &oauth.client_secret),
                ("username", &oauth.username),
                ("password", &oauth.password),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TokenErrorResponse>(&body).map_or_else(
                |_| body.clone(),
                |err| err.error_description.unwrap_or(err.error),
            );
            return Err(ClientError::Token {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = token
            .expires_in
            .min(MAX_TOKEN_LIFETIME_SECS)
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        let access_token = token.access_token.clone();
        *cache = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(access_token)
    }

    /// Sends a request and parses the JSON body, mapping non-success
    /// statuses to [`ClientError::Api`].
    async fn execute(&self, builder: RequestBuilder, path: &str) -> ClientResult<Value> {
        let builder = self.authorize(builder).await?;
        let response = builder
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status.as_u16(), path, &body));
        }
        Ok(response.json().await?)
    }

    /// Unwraps the `{"result": ...}` envelope around a success body.
    fn unwrap_result(value: Value, path: &str) -> ClientResult<Value> {
        match value {
            Value::Object(mut map) => {
                map.remove("result")
                    .ok_or_else(|| ClientError::UnexpectedResponse {
                        path: path.to_string(),
                        reason: "missing \"result\" key".to_string(),
                    })
            }
            _ => Err(ClientError::UnexpectedResponse {
                path: path.to_string(),
                reason: "body is not a JSON object".to_string(),
            }),
        }
    }

    /// Lists records from a table.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-success statuses, or a response whose
    /// `result` is not an array.
    pub async fn list_records(&self, table: &str, query: &ListQuery) -> ClientResult<Vec<Value>> {
        let url = self.list_url(table, query)?;
        let path = format!("/api/now/table/{table}");
        debug!(url = %url, "GET table records");

        let body = self.execute(self.http.get(url), &path).await?;
        match Self::unwrap_result(body, &path)? {
            Value::Array(records) => Ok(records),
            _ => Err(ClientError::UnexpectedResponse {
                path,
                reason: "\"result\" is not an array".to_string(),
            }),
        }
    }

    /// Fetches a single record by `sys_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or non-success statuses; a missing record
    /// surfaces as a 404 [`ClientError::Api`].
    pub async fn get_record(
        &self,
        table: &str,
        sys_id: &str,
        display_value: bool,
    ) -> ClientResult<Value> {
        let path = format!("/api/now/table/{table}/{sys_id}");
        let mut url = self.endpoint(&path)?;
        if display_value {
            url.query_pairs_mut()
                .append_pair("sysparm_display_value", "true");
        }
        debug!(url = %url, "GET table record");

        let body = self.execute(self.http.get(url), &path).await?;
        Self::unwrap_result(body, &path)
    }

    /// Creates a record and returns the created row.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or non-success statuses.
    pub async fn create_record(&self, table: &str, fields: &Value) -> ClientResult<Value> {
        let path = format!("/api/now/table/{table}");
        let url = self.endpoint(&path)?;
        debug!(url = %url, "POST table record");

        let body = self.execute(self.http.post(url).json(fields), &path).await?;
        Self::unwrap_result(body, &path)
    }

    /// Applies a partial update to a record and returns the updated row.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or non-success statuses.
    pub async fn update_record(
        &self,
        table: &str,
        sys_id: &str,
        fields: &Value,
    ) -> ClientResult<Value> {
        let path = format!("/api/now/table/{table}/{sys_id}");
        let url = self.endpoint(&path)?;
        debug!(url = %url, "PATCH table record");

        let body = self
            .execute(self.http.patch(url).json(fields), &path)
            .await?;
        Self::unwrap_result(body, &path)
    }

    /// POSTs to an arbitrary instance path (scripted REST resources).
    ///
    /// Returns the `result` payload when the response carries the standard
    /// envelope, otherwise the whole body.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or non-success statuses.
    pub async fn post_path(&self, path: &str, payload: &Value) -> ClientResult<Value> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "POST scripted resource");

        let body = self.execute(self.http.post(url).json(payload), path).await?;
        match body {
            Value::Object(mut map) => match map.remove("result") {
                Some(inner) => Ok(inner),
                None => Ok(Value::Object(map)),
            },
            other => Ok(other),
        }
    }
}
