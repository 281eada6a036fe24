//! servicenow-mcp: MCP server exposing the ServiceNow ITSM REST API as tools
//!
//! Resolves the instance configuration from the environment, then serves
//! the MCP tool catalog over the selected transport.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use servicenow_mcp::config::ServerConfig;
use servicenow_mcp::mcp::{sse, stdio};
use servicenow_mcp::tools::ToolContext;

/// MCP server exposing the ServiceNow ITSM REST API as agent tools.
///
/// Connects to one ServiceNow instance (configured through SERVICENOW_*
/// environment variables, optionally loaded from a .env file) and serves
/// catalog, incident and script execution tools over MCP.
#[derive(Parser, Debug)]
#[command(name = "servicenow-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transport to serve MCP over
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Bind address for the SSE transport
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    /// Bind port for the SSE transport
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// The transports this server can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout.
    Stdio,
    /// HTTP server with an SSE event stream per session.
    Sse,
}

/// Determines the log level from CLI arguments and the resolved config.
fn get_log_level(verbose: u8, quiet: bool, debug: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => {
            if debug {
                Level::DEBUG
            } else {
                Level::INFO
            }
        }
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr: on the stdio transport stdout belongs to the
/// protocol.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the runtime for the selected transport: a single-threaded loop
/// is enough for stdio, while the SSE server uses the worker pool.
fn build_runtime(transport: Transport) -> io::Result<tokio::runtime::Runtime> {
    match transport {
        Transport::Stdio => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build(),
        Transport::Sse => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build(),
    }
}

/// Entry point for the servicenow-mcp server.
fn main() -> ExitCode {
    // A .env file is a local-development convenience; absence is fine.
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Resolve configuration before logging starts: the log level depends
    // on it, and a broken configuration must stop the process anyway.
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, config.debug);
    init_tracing(log_level);

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "servicenow-mcp {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        instance_url = %config.instance_url,
        auth_type = %config.auth.auth_type(),
        "Starting servicenow-mcp server"
    );

    if config.script_execution_api_resource_path.is_none() {
        warn!(
            "SCRIPT_EXECUTION_API_RESOURCE_PATH not set; \
             the execute_script_include tool will report itself unavailable"
        );
    }

    let tools = match ToolContext::new(&config) {
        Ok(tools) => Arc::new(tools),
        Err(e) => {
            error!(error = %e, "Failed to construct the ServiceNow client");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match build_runtime(args.transport) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.transport {
        Transport::Stdio => runtime.block_on(stdio::run(tools)),
        Transport::Sse => {
            let addr = SocketAddr::new(args.host, args.port);
            runtime.block_on(sse::run(tools, addr))
        }
    };

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
