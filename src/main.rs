//! koog-reviewer: code review agent for the Agent Client Protocol.
//!
//! `koog-reviewer acp` serves the protocol on stdio; `koog-reviewer review
//! <path>` runs the tools once and prints the findings.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use koog_reviewer::acp::{AcpServer, ServerInfo};
use koog_reviewer::config::{self, Config};
use koog_reviewer::tools::{ToolRegistry, READ_FILE, SCAN_CODE};

/// Prompt describing the reviewer persona.
const SYSTEM_PROMPT: &str = "You are a senior code reviewer using the Agent Client Protocol (ACP). \
     You must use the readFile tool to inspect files before answering. \
     When you find issues using the scanCode tool, explain why they are bad practice.";

/// Code review agent for the Agent Client Protocol.
///
/// Runs as an ACP agent on stdin/stdout, or reviews a single file from the
/// command line.
#[derive(Parser, Debug)]
#[command(name = "koog-reviewer")]
#[command(author, version, about, long_about = None, arg_required_else_help = true)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the agent in ACP (Agent Client Protocol) mode.
    Acp,

    /// Read the file at <PATH> and report simple linter findings.
    Review {
        /// File to review
        path: String,
    },
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. Logs go to stderr; stdout is
/// reserved for protocol frames.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Serves the protocol until stdin closes or a signal arrives.
fn run_acp(cfg: Config, tools: ToolRegistry) -> ExitCode {
    let server_info = ServerInfo {
        name: cfg.server.name,
        version: cfg.server.version,
    };
    info!(
        name = %server_info.name,
        version = %server_info.version,
        tools = tools.len(),
        "Starting ACP agent"
    );

    let server = AcpServer::new(tools, server_info);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Agent shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Agent error");
            ExitCode::FAILURE
        }
    }
}

/// Reads and scans one file, printing the report.
fn run_review(path: &str, tools: &ToolRegistry) -> ExitCode {
    let report = tools
        .call(READ_FILE, &json!({ "path": path }))
        .and_then(|content| tools.call(SCAN_CODE, &json!({ "code": content })));
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("System Prompt: \n{SYSTEM_PROMPT}\n");
    println!("Analysis of {path}:\n{report}");
    ExitCode::SUCCESS
}

/// Entry point for koog-reviewer.
fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    let tools = match ToolRegistry::new(cfg.project_root.clone()) {
        Ok(tools) => tools,
        Err(e) => {
            error!(error = %e, "Failed to build tool registry");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::Acp => run_acp(cfg, tools),
        Command::Review { path } => run_review(&path, &tools),
    }
}
