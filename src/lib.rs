//! servicenow-mcp: MCP server exposing the ServiceNow ITSM REST API as tools
//!
//! This library adapts the ServiceNow REST API to the Model Context
//! Protocol, so an AI agent can manage incidents and browse the service
//! catalog through a uniform tool-calling interface.
//!
//! # Architecture
//!
//! Configuration is resolved once from the environment at startup and
//! shared read-only. Each tool is a thin mapping from a typed parameter
//! object onto one outbound REST call:
//!
//! - **Config**: environment-driven instance URL, auth mode (basic /
//!   OAuth password grant / API key), timeout
//! - **ServiceNow client**: Table API requests with the configured
//!   authentication applied
//! - **Tools**: catalog browsing, incident management, script execution
//! - **Transports**: newline-delimited stdio, or HTTP with an SSE event
//!   stream per session
//!
//! # Modules
//!
//! - [`config`] — Configuration resolution and validation
//! - [`error`] — Startup error types
//! - [`mcp`] — MCP protocol implementation and transports
//! - [`servicenow`] — ServiceNow REST client
//! - [`tools`] — The tool catalog

pub mod config;
pub mod error;
pub mod mcp;
pub mod servicenow;
pub mod tools;
