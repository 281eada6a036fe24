//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP specification for exposing ServiceNow
//! operations as tools to AI assistants. Clients speak JSON-RPC 2.0 over
//! one of two transports.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌─────────────┐     ┌──────────────┐    ┌─────────────┐    │
//! │   │  Transport  │────▶│  Connection  │───▶│   Tools     │    │
//! │   │ (stdio|SSE) │     │  (lifecycle) │    │ (handlers)  │    │
//! │   └─────────────┘     └──────────────┘    └─────────────┘    │
//! │          │                   │                   │           │
//! │          ▼                   ▼                   ▼           │
//! │   ┌──────────────────────────────────────────────────┐       │
//! │   │               JSON-RPC Messages                  │       │
//! │   └──────────────────────────────────────────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stdio transport drives a single [`server::McpConnection`] for the
//! process lifetime; the SSE transport owns one per connected session.
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod sse;
pub mod stdio;

pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, OutgoingMessage, MCP_PROTOCOL_VERSION,
};
pub use server::McpConnection;

/// Returns a future that resolves when the process receives a shutdown
/// signal (SIGINT or SIGTERM).
///
/// Registration happens eagerly so a failure surfaces before the
/// transport starts serving.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be registered.
#[cfg(unix)]
pub(crate) fn shutdown_signal() -> std::io::Result<impl std::future::Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
        }
    })
}

/// Returns a future that resolves when the process receives Ctrl+C.
///
/// # Errors
///
/// Never fails on Windows; the `Result` keeps the signature uniform with
/// the Unix variant.
#[cfg(windows)]
pub(crate) fn shutdown_signal() -> std::io::Result<impl std::future::Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, initiating graceful shutdown"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    })
}
