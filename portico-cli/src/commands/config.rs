//! Config command - manage configuration.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use portico_store::{Config, default_config_dir};
use tracing::info;

use super::load_config;
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Write a config file with default values.
    Init {
        /// Portal base URL to record.
        #[arg(long)]
        base_url: Option<String>,

        /// Default form id to record.
        #[arg(long)]
        form_id: Option<String>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Reset to defaults, keeping the portal URL and form id.
    Reset,
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_path)
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Init {
            base_url,
            form_id,
            force,
        } => init_config(base_url.clone(), form_id.clone(), *force, cli).await,
        ConfigAction::Reset => reset_config(cli).await,
    }
}

async fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;

    match cli.format {
        OutputFormat::Text => {
            let unset = "(not set)";
            println!("Portico Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Portal URL:        {}", config.portal.base_url.as_deref().unwrap_or(unset));
            println!("Form id:           {}", config.portal.form_id.as_deref().unwrap_or(unset));
            println!(
                "API key:           {}",
                if config.portal.api_key.is_some() { "(set)" } else { unset }
            );
            println!("Session TTL:       {}s", config.portal.session_ttl_secs);
            println!("Candidate tries:   {}", config.portal.candidate_attempts);
            println!();
            println!("Retry attempts:    {}", config.retry.max_attempts);
            println!(
                "Retry backoff:     {}ms × {} (max {}ms, jitter {}ms)",
                config.retry.base_delay_ms,
                config.retry.multiplier,
                config.retry.max_delay_ms,
                config.retry.jitter_ms
            );
            println!(
                "Breaker:           {} failures, {}s cool-down",
                config.breaker.failure_threshold, config.breaker.cooldown_secs
            );
            println!(
                "Timeouts:          {}s per request, {}s per completion",
                config.http.timeout_secs, config.http.completion_deadline_secs
            );
            println!("Log level:         {}", config.general.log_level);
        }
        OutputFormat::Json => {
            let mut shown = config;
            if shown.portal.api_key.is_some() {
                shown.portal.api_key = Some("<redacted>".to_string());
            }
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&shown)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let config_file = config_path(cli);

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:  {}", config_dir.display());
            println!("Config file: {}", config_file.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": config_file.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_config(
    base_url: Option<String>,
    form_id: Option<String>,
    force: bool,
    cli: &Cli,
) -> Result<()> {
    let path = config_path(cli);
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }

    let mut config = Config::default();
    config.portal.base_url = base_url;
    config.portal.form_id = form_id;
    config.save_to(&path).await?;

    info!(path = %path.display(), "Config initialized");
    println!("Wrote {}", path.display());
    Ok(())
}

async fn reset_config(cli: &Cli) -> Result<()> {
    let path = config_path(cli);
    let current = load_config(cli).await?;

    let mut config = Config::default();
    config.portal.base_url = current.portal.base_url;
    config.portal.form_id = current.portal.form_id;
    config.save_to(&path).await?;

    info!(path = %path.display(), "Config reset");
    println!("Configuration reset to defaults");
    Ok(())
}
