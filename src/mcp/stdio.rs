//! stdio transport for the MCP server.
//!
//! Implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from the client
//! - stdout: sends messages to the client
//! - stderr: may be used for logging (never MCP messages)
//!
//! The transport serves exactly one connection for the lifetime of the
//! process; EOF on stdin or a shutdown signal ends it.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::mcp::protocol::OutgoingMessage;
use crate::mcp::server::McpConnection;
use crate::tools::ToolContext;

/// A stdio-based MCP transport.
///
/// Handles reading JSON-RPC messages from stdin and writing replies to
/// stdout.
pub struct StdioTransport {
    /// Buffered reader for stdin.
    reader: BufReader<tokio::io::Stdin>,
    /// Handle for stdout.
    writer: tokio::io::Stdout,
}

impl StdioTransport {
    /// Creates a new stdio transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }

    /// Reads the next message line from stdin.
    ///
    /// Returns `None` if stdin is closed (EOF).
    ///
    /// # Errors
    ///
    /// Returns an error if reading from stdin fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            // EOF - stdin closed
            return Ok(None);
        }

        // Remove the trailing newline
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes an outgoing JSON-RPC message to stdout, newline-terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub async fn write_message(&mut self, message: &OutgoingMessage) -> io::Result<()> {
        let json = message.to_wire();

        // MCP spec: messages must not contain embedded newlines
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves one MCP connection over stdin/stdout until EOF or a shutdown
/// signal.
///
/// # Errors
///
/// Returns an error if signal registration or transport I/O fails.
pub async fn run(tools: Arc<ToolContext>) -> io::Result<()> {
    let mut transport = StdioTransport::new();
    let mut connection = McpConnection::new(tools);

    let shutdown = super::shutdown_signal()?;
    tokio::pin!(shutdown);

    info!("stdio transport ready, waiting for client");

    loop {
        tokio::select! {
            () = &mut shutdown => {
                connection.begin_shutdown();
                return Ok(());
            }

            line_result = transport.read_line() => {
                let Some(line) = line_result? else {
                    debug!("stdin closed");
                    connection.begin_shutdown();
                    return Ok(());
                };

                if line.trim().is_empty() {
                    continue;
                }

                if let Some(reply) = connection.process_line(&line).await {
                    transport.write_message(&reply).await?;
                }
            }
        }
    }
}
