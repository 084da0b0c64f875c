// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Claude Usage CLI - rate-limit usage for a Claude account from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Show current usage
//! claude-usage
//!
//! # JSON output
//! claude-usage --format json --pretty
//!
//! # Sign in with a dedicated, app-owned credential
//! claude-usage login
//!
//! # Which credential would be used, and when it expires
//! claude-usage status
//!
//! # Refresh every 2 minutes
//! claude-usage watch --interval 120
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use claude_usage_core::UsageError;
use claude_usage_fetch::LoginError;
use claude_usage_store::{Config, LogLevel};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, login, logout, status, usage, watch};
use output::JsonFormatter;

// ============================================================================
// CLI Definition
// ============================================================================

/// Claude Usage CLI - rate-limit usage monitoring.
#[derive(Parser)]
#[command(name = "claude-usage")]
#[command(about = "Claude rate-limit usage from the command line")]
#[command(long_about = r#"
Shows how much of your Claude plan's rate limits you have used.

Credentials are read from the Claude Code CLI's keychain entry or
credentials file. Those are never modified: if the token has expired,
run `claude auth login` or sign in here with `claude-usage login`, which
stores a separate credential this tool refreshes on its own.

Examples:
  claude-usage                   # Current usage
  claude-usage --format json     # JSON output
  claude-usage login             # Sign in
  claude-usage status            # Credential source and expiry
  claude-usage watch             # Refresh periodically
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch current usage (default if no command specified).
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),

    /// Sign in and store an app-owned credential.
    Login(login::LoginArgs),

    /// Remove the app-owned credential and the widget snapshot.
    Logout,

    /// Show which credential would be used and when it expires.
    #[command(visible_alias = "s")]
    Status,

    /// Re-fetch usage periodically.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Signing in again would fix the error.
    LoginRequired = 2,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    pub fn for_error(err: &anyhow::Error) -> Self {
        if needs_login(err) {
            Self::LoginRequired
        } else {
            Self::Error
        }
    }
}

/// Returns true if any cause in the chain can be fixed by signing in.
fn needs_login(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<UsageError>()
            .is_some_and(UsageError::supports_login_recovery)
            || cause
                .downcast_ref::<LoginError>()
                .is_some_and(LoginError::supports_login_recovery)
    })
}

// ============================================================================
// Logging Setup
// ============================================================================

fn log_filter(verbose: bool, level: LogLevel) -> String {
    if verbose {
        "claude_usage=debug,info".to_string()
    } else if level == LogLevel::Warn {
        "claude_usage=warn".to_string()
    } else {
        format!("claude_usage={level}")
    }
}

fn setup_logging(verbose: bool, quiet: bool, level: LogLevel) {
    if quiet {
        return;
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::new(log_filter(verbose, level)))
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load();
    let level = config.as_ref().map_or(LogLevel::default(), |c| c.log_level);
    setup_logging(cli.verbose, cli.quiet, level);

    let result = match config {
        Ok(config) => dispatch(&cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        let code = ExitCode::for_error(&e);
        report_error(&cli, &e, code);
        std::process::exit(code as i32);
    }

    Ok(())
}

async fn dispatch(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Some(Commands::Usage(args)) => usage::run(args, cli, config).await,
        Some(Commands::Login(args)) => login::run(args, cli, config).await,
        Some(Commands::Logout) => logout::run(cli, config).await,
        Some(Commands::Status) => status::run(cli, config).await,
        Some(Commands::Watch(args)) => watch::run(args, cli, config).await,
        Some(Commands::Config(args)) => config::run(args, cli, config).await,
        None => usage::run(&usage::UsageArgs::default(), cli, config).await,
    }
}

fn report_error(cli: &Cli, err: &anyhow::Error, code: ExitCode) {
    if cli.format == OutputFormat::Json {
        let body = serde_json::json!({
            "error": err.to_string(),
            "loginRequired": code == ExitCode::LoginRequired,
        });
        if let Ok(json) = JsonFormatter::new(cli.pretty).format(&body) {
            println!("{json}");
        }
        return;
    }

    if cli.quiet {
        return;
    }
    eprintln!("Error: {err}");
    if code == ExitCode::LoginRequired {
        eprintln!("Run `claude-usage login` to sign in.");
    }
}
