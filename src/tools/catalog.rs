//! Service catalog tools.
//!
//! Backed by the `sc_cat_item` and `sc_category` tables. List tools only
//! ever return active records.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::servicenow::{ListQuery, ServiceNowClient};

use super::{success, ToolDefinition, ToolError};

/// Fields returned for catalog items.
const ITEM_FIELDS: &str = "sys_id,name,short_description,description,category,price,picture,active,order";

/// Fields returned for catalog categories.
const CATEGORY_FIELDS: &str = "sys_id,title,description,parent,icon,active,order";

const fn default_limit() -> u32 {
    10
}

/// Parameters for `list_catalog_items`.
#[derive(Debug, Deserialize)]
pub struct ListCatalogItemsParams {
    /// Maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Number of items to skip.
    #[serde(default)]
    pub offset: u32,
    /// Restrict to a category `sys_id`.
    #[serde(default)]
    pub category: Option<String>,
    /// Free-text search over name and short description.
    #[serde(default)]
    pub query: Option<String>,
}

/// Parameters for `get_catalog_item`.
#[derive(Debug, Deserialize)]
pub struct GetCatalogItemParams {
    /// `sys_id` of the catalog item.
    pub item_id: String,
}

/// Parameters for `list_catalog_categories`.
#[derive(Debug, Deserialize)]
pub struct ListCatalogCategoriesParams {
    /// Maximum number of categories to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Number of categories to skip.
    #[serde(default)]
    pub offset: u32,
    /// Free-text search over title and description.
    #[serde(default)]
    pub query: Option<String>,
}

/// Builds the `sysparm_query` filter for a catalog item listing.
fn item_filter(params: &ListCatalogItemsParams) -> String {
    let mut parts = vec!["active=true".to_string()];
    if let Some(ref category) = params.category {
        parts.push(format!("category={category}"));
    }
    if let Some(ref query) = params.query {
        parts.push(format!("short_descriptionLIKE{query}^ORnameLIKE{query}"));
    }
    parts.join("^")
}

/// Builds the `sysparm_query` filter for a category listing.
fn category_filter(params: &ListCatalogCategoriesParams) -> String {
    let mut parts = vec!["active=true".to_string()];
    if let Some(ref query) = params.query {
        parts.push(format!("titleLIKE{query}^ORdescriptionLIKE{query}"));
    }
    parts.join("^")
}

/// Lists catalog items, optionally filtered by category or search text.
pub async fn list_catalog_items(
    client: &ServiceNowClient,
    params: ListCatalogItemsParams,
) -> Result<Value, ToolError> {
    let query = ListQuery {
        query: Some(item_filter(&params)),
        limit: Some(params.limit),
        offset: Some(params.offset),
        fields: Some(ITEM_FIELDS.to_string()),
        exclude_reference_link: true,
        ..ListQuery::default()
    };
    let items = client.list_records("sc_cat_item", &query).await?;

    let mut payload = success(format!("Retrieved {} catalog items", items.len()));
    payload.insert("items".to_string(), Value::Array(items));
    Ok(Value::Object(payload))
}

/// Fetches one catalog item with display values resolved.
pub async fn get_catalog_item(
    client: &ServiceNowClient,
    params: GetCatalogItemParams,
) -> Result<Value, ToolError> {
    let item = client
        .get_record("sc_cat_item", &params.item_id, true)
        .await?;

    let name = item
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(&params.item_id);
    let mut payload = success(format!("Retrieved catalog item: {name}"));
    payload.insert("item".to_string(), item);
    Ok(Value::Object(payload))
}

/// Lists catalog categories, optionally filtered by search text.
pub async fn list_catalog_categories(
    client: &ServiceNowClient,
    params: ListCatalogCategoriesParams,
) -> Result<Value, ToolError> {
    let query = ListQuery {
        query: Some(category_filter(&params)),
        limit: Some(params.limit),
        offset: Some(params.offset),
        fields: Some(CATEGORY_FIELDS.to_string()),
        exclude_reference_link: true,
        ..ListQuery::default()
    };
    let categories = client.list_records("sc_category", &query).await?;

    let mut payload = success(format!("Retrieved {} catalog categories", categories.len()));
    payload.insert("categories".to_string(), Value::Array(categories));
    Ok(Value::Object(payload))
}

/// Definitions for the catalog tools.
pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_catalog_items".to_string(),
            description: Some(
                "List service catalog items. Supports filtering by category sys_id and \
                 free-text search over item names and short descriptions; only active \
                 items are returned."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of items to return (default: 10)"
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Number of items to skip (default: 0)"
                    },
                    "category": {
                        "type": "string",
                        "description": "Filter by category sys_id"
                    },
                    "query": {
                        "type": "string",
                        "description": "Search term matched against item name and short description"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "get_catalog_item".to_string(),
            description: Some(
                "Get a specific service catalog item by sys_id, with display values resolved."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "item_id": {
                        "type": "string",
                        "description": "sys_id of the catalog item"
                    }
                },
                "required": ["item_id"]
            }),
        },
        ToolDefinition {
            name: "list_catalog_categories".to_string(),
            description: Some(
                "List service catalog categories. Supports free-text search over titles \
                 and descriptions; only active categories are returned."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of categories to return (default: 10)"
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Number of categories to skip (default: 0)"
                    },
                    "query": {
                        "type": "string",
                        "description": "Search term matched against category title and description"
                    }
                },
                "required": []
            }),
        },
    ]
}
