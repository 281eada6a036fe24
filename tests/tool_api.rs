//! Integration tests for the tool catalog against a mocked ServiceNow API.
//!
//! Each test mounts the Table API (or scripted REST) endpoints a tool is
//! expected to hit and drives the call through `ToolContext::dispatch`, the
//! same entry point the MCP layer uses. Mismatched requests fail the test
//! with a 404 from the mock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use servicenow_mcp::config::{AuthConfig, BasicAuthConfig, ServerConfig};
use servicenow_mcp::mcp::McpConnection;
use servicenow_mcp::tools::{ToolContext, ToolError};

/// A well-formed 32 character sys_id.
const SYS_ID: &str = "9d385017c611228701d22104cc95c371";

fn config(instance_url: &str, script_path: Option<&str>) -> ServerConfig {
    ServerConfig {
        instance_url: instance_url.trim_end_matches('/').to_string(),
        auth: AuthConfig::Basic(BasicAuthConfig {
            username: "admin".to_string(),
            password: "secret".to_string(),
        }),
        debug: false,
        timeout: Duration::from_secs(5),
        script_execution_api_resource_path: script_path.map(ToString::to_string),
    }
}

fn context(server: &MockServer) -> ToolContext {
    ToolContext::new(&config(&server.uri(), None)).unwrap()
}

// =============================================================================
// Catalog Tools
// =============================================================================

#[tokio::test]
async fn test_list_catalog_items_filters_active_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/sc_cat_item"))
        .and(query_param(
            "sysparm_query",
            "active=true^short_descriptionLIKElaptop^ORnameLIKElaptop",
        ))
        .and(query_param("sysparm_limit", "5"))
        .and(query_param("sysparm_exclude_reference_link", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"sys_id": "item1", "name": "Developer Laptop"}]
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch("list_catalog_items", json!({"limit": 5, "query": "laptop"}))
        .await
        .unwrap();

    assert_eq!(payload["success"], true);
    assert_eq!(payload["items"].as_array().unwrap().len(), 1);
    assert_eq!(payload["items"][0]["name"], "Developer Laptop");
}

#[tokio::test]
async fn test_get_catalog_item_requests_display_values() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/sc_cat_item/item1"))
        .and(query_param("sysparm_display_value", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"sys_id": "item1", "name": "Developer Laptop", "price": "$1,100.00"}
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch("get_catalog_item", json!({"item_id": "item1"}))
        .await
        .unwrap();

    assert_eq!(payload["success"], true);
    assert_eq!(payload["item"]["price"], "$1,100.00");
    assert!(payload["message"]
        .as_str()
        .unwrap()
        .contains("Developer Laptop"));
}

#[tokio::test]
async fn test_list_catalog_categories_searches_titles() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/sc_category"))
        .and(query_param(
            "sysparm_query",
            "active=true^titleLIKEhardware^ORdescriptionLIKEhardware",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"sys_id": "cat1", "title": "Hardware"},
                {"sys_id": "cat2", "title": "Hardware Accessories"}
            ]
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch("list_catalog_categories", json!({"query": "hardware"}))
        .await
        .unwrap();

    assert_eq!(payload["categories"].as_array().unwrap().len(), 2);
    assert_eq!(payload["message"], "Retrieved 2 catalog categories");
}

// =============================================================================
// Incident Tools
// =============================================================================

#[tokio::test]
async fn test_create_incident_posts_fields_and_reports_number() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/now/table/incident"))
        .and(body_string_contains("Email outage"))
        .and(body_string_contains("\"priority\":\"1\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "result": {"sys_id": SYS_ID, "number": "INC0010002", "state": "1"}
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch(
            "create_incident",
            json!({"short_description": "Email outage", "priority": "1"}),
        )
        .await
        .unwrap();

    assert_eq!(payload["success"], true);
    assert_eq!(payload["incident_number"], "INC0010002");
    assert_eq!(payload["incident_id"], SYS_ID);
    assert_eq!(payload["incident"]["state"], "1");
}

#[tokio::test]
async fn test_create_incident_requires_short_description() {
    let server = MockServer::start().await;

    let err = context(&server)
        .dispatch("create_incident", json!({"priority": "1"}))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::InvalidParams(_)));
}

#[tokio::test]
async fn test_update_incident_resolves_number_to_sys_id() {
    let server = MockServer::start().await;

    // Number lookup happens first, then the patch against the sys_id.
    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .and(query_param("sysparm_query", "number=INC0010001"))
        .and(query_param("sysparm_fields", "sys_id"))
        .and(query_param("sysparm_limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"sys_id": SYS_ID}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(format!("/api/now/table/incident/{SYS_ID}")))
        .and(body_string_contains("\"priority\":\"2\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"sys_id": SYS_ID, "priority": "2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch(
            "update_incident",
            json!({"incident_id": "INC0010001", "priority": "2"}),
        )
        .await
        .unwrap();

    assert_eq!(payload["success"], true);
    assert_eq!(payload["incident_id"], SYS_ID);
}

#[tokio::test]
async fn test_update_incident_uses_raw_sys_id_without_lookup() {
    let server = MockServer::start().await;

    // Only the patch endpoint exists; a lookup attempt would 404.
    Mock::given(method("PATCH"))
        .and(path(format!("/api/now/table/incident/{SYS_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"sys_id": SYS_ID, "state": "2"}
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch(
            "update_incident",
            json!({"incident_id": SYS_ID, "state": "2"}),
        )
        .await
        .unwrap();

    assert_eq!(payload["incident"]["state"], "2");
}

#[tokio::test]
async fn test_update_incident_rejects_empty_update() {
    let server = MockServer::start().await;

    let err = context(&server)
        .dispatch("update_incident", json!({"incident_id": "INC0010001"}))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::InvalidParams(_)));
    assert!(err.to_string().contains("no fields"));
}

#[tokio::test]
async fn test_unknown_incident_number_reports_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .and(query_param("sysparm_query", "number=INC9999999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&server)
        .await;

    let err = context(&server)
        .dispatch(
            "update_incident",
            json!({"incident_id": "INC9999999", "state": "2"}),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::NotFound(_)));
    assert!(err.to_string().contains("INC9999999"));
}

#[tokio::test]
async fn test_add_comment_writes_customer_visible_field() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!("/api/now/table/incident/{SYS_ID}")))
        .and(body_string_contains("\"comments\":\"Looking into it\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"sys_id": SYS_ID}
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch(
            "add_comment",
            json!({"incident_id": SYS_ID, "comment": "Looking into it"}),
        )
        .await
        .unwrap();

    assert!(payload["message"].as_str().unwrap().contains("comment"));
}

#[tokio::test]
async fn test_add_comment_as_work_note_uses_work_notes_field() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!("/api/now/table/incident/{SYS_ID}")))
        .and(body_string_contains("\"work_notes\":\"Checked the switch\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"sys_id": SYS_ID}
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch(
            "add_comment",
            json!({
                "incident_id": SYS_ID,
                "comment": "Checked the switch",
                "is_work_note": true
            }),
        )
        .await
        .unwrap();

    assert!(payload["message"].as_str().unwrap().contains("work note"));
}

#[tokio::test]
async fn test_resolve_incident_sets_state_and_close_code() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!("/api/now/table/incident/{SYS_ID}")))
        .and(body_string_contains("\"state\":\"6\""))
        .and(body_string_contains("\"close_code\":\"Solved (Permanently)\""))
        .and(body_string_contains("\"close_notes\":\"Replaced the cable\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"sys_id": SYS_ID, "state": "6"}
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch(
            "resolve_incident",
            json!({
                "incident_id": SYS_ID,
                "resolution_code": "Solved (Permanently)",
                "resolution_notes": "Replaced the cable"
            }),
        )
        .await
        .unwrap();

    assert_eq!(payload["success"], true);
    assert_eq!(payload["incident"]["state"], "6");
}

#[tokio::test]
async fn test_list_incidents_combines_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .and(query_param("sysparm_query", "state=2^assigned_to=alice"))
        .and(query_param("sysparm_limit", "20"))
        .and(query_param("sysparm_offset", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"sys_id": SYS_ID, "number": "INC0010001", "state": "2"}]
        })))
        .mount(&server)
        .await;

    let payload = context(&server)
        .dispatch(
            "list_incidents",
            json!({
                "state": "2",
                "assigned_to": "alice",
                "limit": 20,
                "offset": 40
            }),
        )
        .await
        .unwrap();

    assert_eq!(payload["incidents"].as_array().unwrap().len(), 1);
    assert_eq!(payload["message"], "Retrieved 1 incidents");
}

// =============================================================================
// Script Execution
// =============================================================================

#[tokio::test]
async fn test_execute_script_include_posts_to_configured_resource() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/x_custom/script_execution/execute"))
        .and(body_string_contains("\"script_include\":\"DataLookup\""))
        .and(body_string_contains("\"table\":\"incident\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"output": "42 rows"}
        })))
        .mount(&server)
        .await;

    let tools = ToolContext::new(&config(
        &server.uri(),
        Some("/api/x_custom/script_execution/execute"),
    ))
    .unwrap();

    let payload = tools
        .dispatch(
            "execute_script_include",
            json!({
                "script_include": "DataLookup",
                "params": {"table": "incident"}
            }),
        )
        .await
        .unwrap();

    assert_eq!(payload["success"], true);
    assert_eq!(payload["result"]["output"], "42 rows");
}

#[tokio::test]
async fn test_execute_script_include_without_configuration_fails_cleanly() {
    let server = MockServer::start().await;

    let err = context(&server)
        .dispatch("execute_script_include", json!({"script_include": "X"}))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::NotConfigured(_)));
}

// =============================================================================
// Error Paths and Dispatch
// =============================================================================

#[tokio::test]
async fn test_api_failure_surfaces_as_tool_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"message": "Insufficient rights", "detail": "ACL denied"},
            "status": "failure"
        })))
        .mount(&server)
        .await;

    let err = context(&server)
        .dispatch("list_incidents", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::Api(_)));
    let message = err.to_string();
    assert!(message.contains("403"));
    assert!(message.contains("Insufficient rights"));
}

#[tokio::test]
async fn test_unknown_tool_name_is_rejected() {
    let server = MockServer::start().await;

    let err = context(&server)
        .dispatch("restart_instance", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::UnknownTool(name) if name == "restart_instance"));
}

#[tokio::test]
async fn test_tool_call_through_mcp_connection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"sys_id": SYS_ID, "number": "INC0010001"}]
        })))
        .mount(&server)
        .await;

    let mut conn = McpConnection::new(Arc::new(context(&server)));
    conn.process_line(
        r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {"name": "test-client"}}}"#,
    )
    .await
    .unwrap();
    conn.process_line(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
        .await;

    let reply = conn
        .process_line(
            r#"{"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "list_incidents", "arguments": {"limit": 10}}}"#,
        )
        .await
        .unwrap();

    let rendered: Value = serde_json::from_str(&reply.to_wire()).unwrap();
    assert_eq!(rendered["id"], 2);
    assert!(rendered["result"].get("isError").is_none());

    // The tool payload travels as pretty-printed JSON inside text content.
    let text = rendered["result"]["content"][0]["text"].as_str().unwrap();
    let payload: Value = serde_json::from_str(text).unwrap();
    assert_eq!(payload["success"], true);
    assert_eq!(payload["incidents"][0]["number"], "INC0010001");
}
