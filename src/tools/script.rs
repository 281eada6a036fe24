//! Script include execution.
//!
//! Runs a named script include through a scripted REST resource that must
//! be installed on the instance and named via
//! `SCRIPT_EXECUTION_API_RESOURCE_PATH`. When that variable is absent the
//! server still starts; only this tool reports itself unavailable.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::servicenow::ServiceNowClient;

use super::{success, ToolDefinition, ToolError};

/// Parameters for `execute_script_include`.
#[derive(Debug, Deserialize)]
pub struct ExecuteScriptIncludeParams {
    /// Name of the script include to execute.
    pub script_include: String,
    /// Named parameters passed to the script include.
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Executes a script include through the configured scripted REST resource.
pub async fn execute_script_include(
    client: &ServiceNowClient,
    resource_path: Option<&str>,
    params: ExecuteScriptIncludeParams,
) -> Result<Value, ToolError> {
    let Some(path) = resource_path else {
        return Err(ToolError::NotConfigured(
            "script execution is unavailable: SCRIPT_EXECUTION_API_RESOURCE_PATH is not set"
                .to_string(),
        ));
    };

    let body = json!({
        "script_include": params.script_include,
        "params": Value::Object(params.params),
    });
    let result = client.post_path(path, &body).await?;

    let mut payload = success(format!(
        "Executed script include {}",
        params.script_include
    ));
    payload.insert("result".to_string(), result);
    Ok(Value::Object(payload))
}

/// Definition for the script execution tool.
pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: "execute_script_include".to_string(),
        description: Some(
            "Execute a script include on the instance through the configured scripted \
             REST resource. Requires SCRIPT_EXECUTION_API_RESOURCE_PATH to be set on \
             the server."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "script_include": {
                    "type": "string",
                    "description": "Name of the script include to execute"
                },
                "params": {
                    "type": "object",
                    "description": "Named parameters passed to the script include"
                }
            },
            "required": ["script_include"]
        }),
    }]
}
