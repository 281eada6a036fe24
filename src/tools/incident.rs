//! Incident management tools.
//!
//! All five tools operate on the `incident` table. Tools that take an
//! `incident_id` accept either a raw `sys_id` or the human-facing
//! incident number (`INC...`); numbers cost one extra lookup query.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::servicenow::{ListQuery, ServiceNowClient};

use super::{insert_optional, resolve_sys_id, success, ToolDefinition, ToolError};

/// Fields returned for incident listings.
const INCIDENT_FIELDS: &str = "sys_id,number,short_description,description,state,priority,\
                               impact,urgency,category,subcategory,assigned_to,assignment_group,\
                               caller_id,sys_created_on,sys_updated_on";

/// State 6 is Resolved in the standard incident lifecycle.
const STATE_RESOLVED: &str = "6";

const fn default_limit() -> u32 {
    10
}

/// Parameters for `create_incident`.
#[derive(Debug, Deserialize)]
pub struct CreateIncidentParams {
    /// Short description of the incident (required).
    pub short_description: String,
    /// Detailed description.
    #[serde(default)]
    pub description: Option<String>,
    /// `sys_id` or username of the caller.
    #[serde(default)]
    pub caller_id: Option<String>,
    /// Incident category.
    #[serde(default)]
    pub category: Option<String>,
    /// Incident subcategory.
    #[serde(default)]
    pub subcategory: Option<String>,
    /// Priority, `1` (critical) to `5` (planning).
    #[serde(default)]
    pub priority: Option<String>,
    /// Impact, `1` (high) to `3` (low).
    #[serde(default)]
    pub impact: Option<String>,
    /// Urgency, `1` (high) to `3` (low).
    #[serde(default)]
    pub urgency: Option<String>,
    /// Assignment group `sys_id` or name.
    #[serde(default)]
    pub assignment_group: Option<String>,
    /// Assignee `sys_id` or username.
    #[serde(default)]
    pub assigned_to: Option<String>,
}

/// Parameters for `update_incident`.
#[derive(Debug, Deserialize)]
pub struct UpdateIncidentParams {
    /// Incident `sys_id` or number.
    pub incident_id: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Numeric state value, e.g. `2` (In Progress) or `6` (Resolved).
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub assignment_group: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub work_notes: Option<String>,
    #[serde(default)]
    pub close_notes: Option<String>,
    #[serde(default)]
    pub close_code: Option<String>,
}

impl UpdateIncidentParams {
    /// Collects the fields to patch, skipping unset ones.
    fn update_fields(&self) -> Map<String, Value> {
        let mut body = Map::new();
        insert_optional(
            &mut body,
            &[
                ("short_description", &self.short_description),
                ("description", &self.description),
                ("state", &self.state),
                ("category", &self.category),
                ("subcategory", &self.subcategory),
                ("priority", &self.priority),
                ("impact", &self.impact),
                ("urgency", &self.urgency),
                ("assignment_group", &self.assignment_group),
                ("assigned_to", &self.assigned_to),
                ("work_notes", &self.work_notes),
                ("close_notes", &self.close_notes),
                ("close_code", &self.close_code),
            ],
        );
        body
    }
}

/// Parameters for `add_comment`.
#[derive(Debug, Deserialize)]
pub struct AddCommentParams {
    /// Incident `sys_id` or number.
    pub incident_id: String,
    /// The comment text.
    pub comment: String,
    /// Record as a private work note instead of a customer-visible comment.
    #[serde(default)]
    pub is_work_note: bool,
}

/// Parameters for `resolve_incident`.
#[derive(Debug, Deserialize)]
pub struct ResolveIncidentParams {
    /// Incident `sys_id` or number.
    pub incident_id: String,
    /// Close code, e.g. `Solved (Permanently)`.
    pub resolution_code: String,
    /// Notes describing the resolution.
    #[serde(default)]
    pub resolution_notes: Option<String>,
}

/// Parameters for `list_incidents`.
#[derive(Debug, Deserialize)]
pub struct ListIncidentsParams {
    /// Maximum number of incidents to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Number of incidents to skip.
    #[serde(default)]
    pub offset: u32,
    /// Filter by numeric state value.
    #[serde(default)]
    pub state: Option<String>,
    /// Filter by assignee.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Filter by category.
    #[serde(default)]
    pub category: Option<String>,
    /// Free-text search over number, short description and description.
    #[serde(default)]
    pub query: Option<String>,
}

/// Builds the `sysparm_query` filter for an incident listing.
fn incident_filter(params: &ListIncidentsParams) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(ref state) = params.state {
        parts.push(format!("state={state}"));
    }
    if let Some(ref assigned_to) = params.assigned_to {
        parts.push(format!("assigned_to={assigned_to}"));
    }
    if let Some(ref category) = params.category {
        parts.push(format!("category={category}"));
    }
    if let Some(ref query) = params.query {
        parts.push(format!(
            "short_descriptionLIKE{query}^ORdescriptionLIKE{query}^ORnumberLIKE{query}"
        ));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("^"))
    }
}

/// Creates a new incident.
pub async fn create_incident(
    client: &ServiceNowClient,
    params: CreateIncidentParams,
) -> Result<Value, ToolError> {
    let mut body = Map::new();
    body.insert(
        "short_description".to_string(),
        Value::String(params.short_description.clone()),
    );
    insert_optional(
        &mut body,
        &[
            ("description", &params.description),
            ("caller_id", &params.caller_id),
            ("category", &params.category),
            ("subcategory", &params.subcategory),
            ("priority", &params.priority),
            ("impact", &params.impact),
            ("urgency", &params.urgency),
            ("assignment_group", &params.assignment_group),
            ("assigned_to", &params.assigned_to),
        ],
    );

    let created = client
        .create_record("incident", &Value::Object(body))
        .await?;
    let number = created
        .get("number")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    let sys_id = created
        .get("sys_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut payload = success(format!("Incident {number} created"));
    payload.insert("incident_id".to_string(), Value::String(sys_id));
    payload.insert("incident_number".to_string(), Value::String(number));
    payload.insert("incident".to_string(), created);
    Ok(Value::Object(payload))
}

/// Applies a partial update to an existing incident.
pub async fn update_incident(
    client: &ServiceNowClient,
    params: UpdateIncidentParams,
) -> Result<Value, ToolError> {
    let fields = params.update_fields();
    if fields.is_empty() {
        return Err(ToolError::InvalidParams(
            "no fields to update were provided".to_string(),
        ));
    }

    let sys_id = resolve_sys_id(client, "incident", &params.incident_id).await?;
    let updated = client
        .update_record("incident", &sys_id, &Value::Object(fields))
        .await?;

    let mut payload = success(format!("Incident {} updated", params.incident_id));
    payload.insert("incident_id".to_string(), Value::String(sys_id));
    payload.insert("incident".to_string(), updated);
    Ok(Value::Object(payload))
}

/// Adds a comment or work note to an incident.
pub async fn add_comment(
    client: &ServiceNowClient,
    params: AddCommentParams,
) -> Result<Value, ToolError> {
    let sys_id = resolve_sys_id(client, "incident", &params.incident_id).await?;
    let field = if params.is_work_note {
        "work_notes"
    } else {
        "comments"
    };
    let body = json!({ field: params.comment });
    client.update_record("incident", &sys_id, &body).await?;

    let kind = if params.is_work_note {
        "work note"
    } else {
        "comment"
    };
    let mut payload = success(format!("Added {kind} to incident {}", params.incident_id));
    payload.insert("incident_id".to_string(), Value::String(sys_id));
    Ok(Value::Object(payload))
}

/// Resolves an incident with a close code and optional notes.
pub async fn resolve_incident(
    client: &ServiceNowClient,
    params: ResolveIncidentParams,
) -> Result<Value, ToolError> {
    let sys_id = resolve_sys_id(client, "incident", &params.incident_id).await?;

    let mut body = Map::new();
    body.insert("state".to_string(), Value::String(STATE_RESOLVED.to_string()));
    body.insert(
        "close_code".to_string(),
        Value::String(params.resolution_code.clone()),
    );
    if let Some(ref notes) = params.resolution_notes {
        body.insert("close_notes".to_string(), Value::String(notes.clone()));
    }

    let updated = client
        .update_record("incident", &sys_id, &Value::Object(body))
        .await?;

    let mut payload = success(format!("Incident {} resolved", params.incident_id));
    payload.insert("incident_id".to_string(), Value::String(sys_id));
    payload.insert("incident".to_string(), updated);
    Ok(Value::Object(payload))
}

/// Lists incidents with optional filters.
pub async fn list_incidents(
    client: &ServiceNowClient,
    params: ListIncidentsParams,
) -> Result<Value, ToolError> {
    let query = ListQuery {
        query: incident_filter(&params),
        limit: Some(params.limit),
        offset: Some(params.offset),
        fields: Some(INCIDENT_FIELDS.to_string()),
        exclude_reference_link: true,
        ..ListQuery::default()
    };
    let incidents = client.list_records("incident", &query).await?;

    let mut payload = success(format!("Retrieved {} incidents", incidents.len()));
    payload.insert("incidents".to_string(), Value::Array(incidents));
    Ok(Value::Object(payload))
}

/// Definitions for the incident tools.
pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "create_incident".to_string(),
            description: Some(
                "Create a new incident. Only short_description is required; category, \
                 priority, impact, urgency and assignment fields are optional."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "short_description": {
                        "type": "string",
                        "description": "Short description of the incident"
                    },
                    "description": {
                        "type": "string",
                        "description": "Detailed description"
                    },
                    "caller_id": {
                        "type": "string",
                        "description": "sys_id or username of the caller"
                    },
                    "category": {
                        "type": "string",
                        "description": "Incident category"
                    },
                    "subcategory": {
                        "type": "string",
                        "description": "Incident subcategory"
                    },
                    "priority": {
                        "type": "string",
                        "description": "Priority, 1 (critical) to 5 (planning)"
                    },
                    "impact": {
                        "type": "string",
                        "description": "Impact, 1 (high) to 3 (low)"
                    },
                    "urgency": {
                        "type": "string",
                        "description": "Urgency, 1 (high) to 3 (low)"
                    },
                    "assignment_group": {
                        "type": "string",
                        "description": "Assignment group sys_id or name"
                    },
                    "assigned_to": {
                        "type": "string",
                        "description": "Assignee sys_id or username"
                    }
                },
                "required": ["short_description"]
            }),
        },
        ToolDefinition {
            name: "update_incident".to_string(),
            description: Some(
                "Update fields on an existing incident. Accepts the incident sys_id or \
                 number (INC...); at least one field to update must be provided."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "incident_id": {
                        "type": "string",
                        "description": "Incident sys_id or number"
                    },
                    "short_description": {"type": "string"},
                    "description": {"type": "string"},
                    "state": {
                        "type": "string",
                        "description": "Numeric state value, e.g. 2 (In Progress), 6 (Resolved)"
                    },
                    "category": {"type": "string"},
                    "subcategory": {"type": "string"},
                    "priority": {"type": "string"},
                    "impact": {"type": "string"},
                    "urgency": {"type": "string"},
                    "assignment_group": {"type": "string"},
                    "assigned_to": {"type": "string"},
                    "work_notes": {"type": "string"},
                    "close_notes": {"type": "string"},
                    "close_code": {"type": "string"}
                },
                "required": ["incident_id"]
            }),
        },
        ToolDefinition {
            name: "add_comment".to_string(),
            description: Some(
                "Add a comment to an incident, either customer-visible or as a private \
                 work note. Accepts the incident sys_id or number."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "incident_id": {
                        "type": "string",
                        "description": "Incident sys_id or number"
                    },
                    "comment": {
                        "type": "string",
                        "description": "The comment text"
                    },
                    "is_work_note": {
                        "type": "boolean",
                        "description": "Record as a private work note (default: false)"
                    }
                },
                "required": ["incident_id", "comment"]
            }),
        },
        ToolDefinition {
            name: "resolve_incident".to_string(),
            description: Some(
                "Resolve an incident with a close code and optional resolution notes. \
                 Accepts the incident sys_id or number."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "incident_id": {
                        "type": "string",
                        "description": "Incident sys_id or number"
                    },
                    "resolution_code": {
                        "type": "string",
                        "description": "Close code, e.g. Solved (Permanently)"
                    },
                    "resolution_notes": {
                        "type": "string",
                        "description": "Notes describing the resolution"
                    }
                },
                "required": ["incident_id", "resolution_code"]
            }),
        },
        ToolDefinition {
            name: "list_incidents".to_string(),
            description: Some(
                "List incidents. Supports filtering by state, assignee and category, \
                 plus free-text search over number and descriptions."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of incidents to return (default: 10)"
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Number of incidents to skip (default: 0)"
                    },
                    "state": {
                        "type": "string",
                        "description": "Filter by numeric state value"
                    },
                    "assigned_to": {
                        "type": "string",
                        "description": "Filter by assignee"
                    },
                    "category": {
                        "type": "string",
                        "description": "Filter by category"
                    },
                    "query": {
                        "type": "string",
                        "description": "Search term matched against number and descriptions"
                    }
                },
                "required": []
            }),
        },
    ]
}
