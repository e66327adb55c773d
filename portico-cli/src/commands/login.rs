//! Login command - check credentials and portal access.

use anyhow::Result;
use clap::Args;
use portico_fetch::FetchError;
use portico_providers::portal::verify_access;

use super::{CredentialArgs, build_chat, load_config};
use crate::output::{BreakerOutput, JsonFormatter, LoginOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the login command.
#[derive(Args, Debug)]
pub struct LoginArgs {
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Runs the login command.
///
/// With `--verbose` the breaker table is printed as well.
pub async fn run(args: &LoginArgs, cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;
    let identity = args.credentials.resolve(&config)?;
    let chat = build_chat(&config, &identity)?;
    let ctx = chat.context();

    let session = chat.sessions().login(ctx, &identity).await?;
    let endpoints = chat.sessions().profile().endpoints(&identity.base_url)?;
    let access = verify_access(ctx, &endpoints, &session).await;

    let mut output = LoginOutput::new(&identity, &session, access);
    if cli.verbose {
        output.breakers = Some(
            ctx.engine
                .breakers()
                .snapshot()
                .into_iter()
                .map(|(key, state)| BreakerOutput::new(key, state))
                .collect(),
        );
    }

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_login(&output));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&output)?);
        }
    }

    if !access {
        return Err(FetchError::AuthenticationFailed(
            "logged in, but the session does not grant portal access".to_string(),
        )
        .into());
    }
    Ok(())
}
