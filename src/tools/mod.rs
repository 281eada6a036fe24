//! The ServiceNow tool catalog.
//!
//! Each tool is a thin mapping from a typed parameter struct onto one
//! ServiceNow REST call, returning a JSON payload for the MCP client.
//! Tool failures are ordinary values here; the protocol layer renders
//! them as tool results flagged `isError`, never as JSON-RPC errors.

pub mod catalog;
pub mod incident;
pub mod script;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::ServerConfig;
use crate::servicenow::{ClientError, ClientResult, ServiceNowClient};

/// Errors a tool invocation can produce.
///
/// All of these surface to the MCP client as `isError` tool results; none
/// of them terminate the server.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments object did not match the tool's parameter schema.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The requested tool does not exist.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A record referenced by the arguments does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The tool needs configuration this server was started without.
    #[error("{0}")]
    NotConfigured(String),

    /// The ServiceNow API call failed.
    #[error(transparent)]
    Api(#[from] ClientError),
}

/// An entry in the `tools/list` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description shown to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Shared, read-only execution context for tool invocations.
///
/// Owns the ServiceNow client; one instance is built at startup and shared
/// across connections (behind an `Arc` for the SSE transport).
#[derive(Debug)]
pub struct ToolContext {
    client: ServiceNowClient,
    script_resource_path: Option<String>,
}

impl ToolContext {
    /// Builds the context from the resolved configuration.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed from the
    /// configuration.
    pub fn new(config: &ServerConfig) -> ClientResult<Self> {
        Ok(Self {
            client: ServiceNowClient::new(config)?,
            script_resource_path: config.script_execution_api_resource_path.clone(),
        })
    }

    /// Invokes a tool by name with the raw `arguments` value from the
    /// `tools/call` request.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] for unknown names, malformed arguments, and
    /// failed API calls.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        debug!(tool = name, "dispatching tool call");
        match name {
            "list_catalog_items" => {
                catalog::list_catalog_items(&self.client, parse_params(arguments)?).await
            }
            "get_catalog_item" => {
                catalog::get_catalog_item(&self.client, parse_params(arguments)?).await
            }
            "list_catalog_categories" => {
                catalog::list_catalog_categories(&self.client, parse_params(arguments)?).await
            }
            "create_incident" => {
                incident::create_incident(&self.client, parse_params(arguments)?).await
            }
            "update_incident" => {
                incident::update_incident(&self.client, parse_params(arguments)?).await
            }
            "add_comment" => incident::add_comment(&self.client, parse_params(arguments)?).await,
            "resolve_incident" => {
                incident::resolve_incident(&self.client, parse_params(arguments)?).await
            }
            "list_incidents" => {
                incident::list_incidents(&self.client, parse_params(arguments)?).await
            }
            "execute_script_include" => {
                script::execute_script_include(
                    &self.client,
                    self.script_resource_path.as_deref(),
                    parse_params(arguments)?,
                )
                .await
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

/// Deserialises tool arguments into a typed parameter struct.
///
/// A missing `arguments` object arrives as `null` and is treated as `{}`.
fn parse_params<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() {
        Value::Object(Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

/// Looks up a record's `sys_id`, accepting either a raw `sys_id` or a
/// human-facing record number (e.g. `INC0010001`).
pub(crate) async fn resolve_sys_id(
    client: &ServiceNowClient,
    table: &str,
    id: &str,
) -> Result<String, ToolError> {
    // 32 hex chars is a sys_id; anything else is treated as a number.
    let is_sys_id = id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit());
    if is_sys_id {
        return Ok(id.to_string());
    }

    let query = crate::servicenow::ListQuery {
        query: Some(format!("number={id}")),
        limit: Some(1),
        fields: Some("sys_id".to_string()),
        ..Default::default()
    };
    let records = client.list_records(table, &query).await?;
    records
        .first()
        .and_then(|record| record.get("sys_id"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::NotFound(format!("no {table} record found for {id}")))
}

/// Copies the optional string fields that are `Some` into a JSON object.
pub(crate) fn insert_optional(body: &mut Map<String, Value>, fields: &[(&str, &Option<String>)]) {
    for (key, value) in fields {
        if let Some(value) = value {
            body.insert((*key).to_string(), Value::String(value.clone()));
        }
    }
}

/// Returns the definitions of every tool this server exposes, in the order
/// they are listed to clients.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    tools.extend(catalog::definitions());
    tools.extend(incident::definitions());
    tools.extend(script::definitions());
    tools
}

/// Convenience constructor for the `{"success", "message", ...}` payload
/// shape every tool returns.
pub(crate) fn success(message: impl Into<String>) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("success".to_string(), Value::Bool(true));
    payload.insert("message".to_string(), Value::String(message.into()));
    payload
}
