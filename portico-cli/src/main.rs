// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Portico CLI - chat with the portal AI form runner from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Ask a question (credentials from PORTICO_USERNAME / PORTICO_PASSWORD)
//! portico chat "Summarize the Q3 report" --form-id 42
//!
//! # Attach a file
//! portico chat "What is in this sheet?" --file data.xlsx
//!
//! # Prompt from stdin, JSON output
//! echo "Hello" | portico chat --format json --pretty
//!
//! # Check credentials and portal access
//! portico login --verbose
//!
//! # Write a starter config file
//! portico config init --base-url https://ai.example.com --form-id 42
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use portico_fetch::FetchError;
use portico_store::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{chat, config, login};
use output::{JsonFormatter, TextFormatter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Portico CLI - chat with the portal AI form runner.
#[derive(Parser)]
#[command(name = "portico")]
#[command(about = "Chat with the portal AI form runner")]
#[command(long_about = r#"
Portico logs into the portal with your account, keeps the session alive,
and runs prompts through the portal's AI form endpoints.

Credentials come from --username/--password or the PORTICO_USERNAME and
PORTICO_PASSWORD environment variables.

Examples:
  portico chat "Hello" --form-id 42   # Send a prompt
  portico login                       # Check credentials and access
  portico config show                 # Show configuration
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Config file to use instead of the default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

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
    /// Send a prompt and print the reply.
    #[command(visible_alias = "c")]
    Chat(chat::ChatArgs),

    /// Log in and check portal access.
    #[command(visible_alias = "l")]
    Login(login::LoginArgs),

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
    /// Login rejected or no portal access.
    Auth = 2,
    /// Every completion endpoint failed.
    AllCandidatesFailed = 3,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    pub fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<FetchError>() {
            Some(e) if e.is_authentication() => Self::Auth,
            Some(FetchError::AiService { .. }) => Self::AllCandidatesFailed,
            _ => Self::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, level: LogLevel) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("portico=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("portico={level}")))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = commands::load_config(&cli)
        .await
        .map(|c| c.general.log_level)
        .unwrap_or_default();
    setup_logging(cli.verbose, cli.quiet, level);

    let result = match &cli.command {
        Commands::Chat(args) => chat::run(args, &cli).await,
        Commands::Login(args) => login::run(args, &cli).await,
        Commands::Config(args) => config::run(args, &cli).await,
    };

    let code = match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            let code = ExitCode::for_error(&e);
            if !cli.quiet {
                report_error(&cli, &e, code);
            }
            code
        }
    };

    std::process::exit(code as i32);
}

fn report_error(cli: &Cli, error: &anyhow::Error, code: ExitCode) {
    let message = format!("{error:#}");
    match cli.format {
        OutputFormat::Json => match JsonFormatter::new(cli.pretty).format_error(&message, code as i32) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error: {message}"),
        },
        OutputFormat::Text => {
            eprintln!("{}", TextFormatter::new(!cli.no_color).format_error(&message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        let auth = anyhow::Error::new(FetchError::AuthenticationFailed("bad".into()));
        assert_eq!(ExitCode::for_error(&auth), ExitCode::Auth);

        let exhausted = anyhow::Error::new(FetchError::AiService {
            attempts: 4,
            last_cause: "HTTP 500".into(),
        });
        assert_eq!(ExitCode::for_error(&exhausted), ExitCode::AllCandidatesFailed);

        let timeout = anyhow::Error::new(FetchError::Timeout(Duration::from_secs(1)));
        assert_eq!(ExitCode::for_error(&timeout), ExitCode::Error);

        assert_eq!(ExitCode::for_error(&anyhow::anyhow!("boom")), ExitCode::Error);
    }

    #[test]
    fn test_exit_code_survives_context() {
        use anyhow::Context;
        let result: Result<(), FetchError> = Err(FetchError::AuthenticationFailed("bad".into()));
        let err = result.context("login failed").unwrap_err();
        assert_eq!(ExitCode::for_error(&err), ExitCode::Auth);
    }

    #[test]
    fn test_cli_parses_chat() {
        let cli = Cli::try_parse_from([
            "portico", "chat", "hello", "--form-id", "42", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.message.as_deref(), Some("hello"));
                assert_eq!(args.form_id.as_deref(), Some("42"));
            }
            _ => panic!("expected chat"),
        }
    }
}
