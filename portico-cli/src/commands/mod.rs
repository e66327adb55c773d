//! CLI command implementations.

pub mod chat;
pub mod config;
pub mod login;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use portico_core::CredentialIdentity;
use portico_fetch::FetchContext;
use portico_providers::PortalChat;
use portico_store::Config;

use crate::Cli;

/// Environment variable holding the login name.
pub const USERNAME_ENV: &str = "PORTICO_USERNAME";
/// Environment variable holding the password.
pub const PASSWORD_ENV: &str = "PORTICO_PASSWORD";
/// Environment variable overriding the portal base URL.
pub const BASE_URL_ENV: &str = "PORTICO_BASE_URL";

/// Credential flags shared by commands that log in.
#[derive(Args, Debug, Default, Clone)]
pub struct CredentialArgs {
    /// Login name (falls back to $PORTICO_USERNAME).
    #[arg(long)]
    pub username: Option<String>,

    /// Password (falls back to $PORTICO_PASSWORD).
    #[arg(long)]
    pub password: Option<String>,

    /// Portal base URL (falls back to $PORTICO_BASE_URL, then the config file).
    #[arg(long)]
    pub base_url: Option<String>,
}

fn flag_or_env(flag: Option<&String>, env: &str) -> Option<String> {
    flag.cloned()
        .or_else(|| std::env::var(env).ok())
        .filter(|v| !v.trim().is_empty())
}

impl CredentialArgs {
    /// Resolves flags, environment and config into an identity.
    pub fn resolve(&self, config: &Config) -> Result<CredentialIdentity> {
        let username = flag_or_env(self.username.as_ref(), USERNAME_ENV)
            .with_context(|| format!("no username: pass --username or set {USERNAME_ENV}"))?;
        let password = flag_or_env(self.password.as_ref(), PASSWORD_ENV)
            .with_context(|| format!("no password: pass --password or set {PASSWORD_ENV}"))?;
        let base_url = flag_or_env(self.base_url.as_ref(), BASE_URL_ENV)
            .or_else(|| config.portal.base_url.clone())
            .with_context(|| {
                format!("no portal URL: pass --base-url, set {BASE_URL_ENV} or portal.base_url")
            })?;

        Ok(CredentialIdentity::new(username, password, base_url)?)
    }
}

/// Loads the config file named on the command line, or the default one.
pub async fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path).await,
        None => Config::load().await,
    };
    config.context("failed to load configuration")
}

/// Builds the chat service, restricted to the identity's portal host.
pub fn build_chat(config: &Config, identity: &CredentialIdentity) -> Result<PortalChat> {
    let profile = config.portal_profile();
    let host = profile.endpoints(&identity.base_url)?.host().to_string();

    let ctx = FetchContext::builder()
        .settings(config.fetch_settings())
        .allowed_domains(vec![host])
        .build()?;
    Ok(PortalChat::new(Arc::new(ctx), profile))
}
