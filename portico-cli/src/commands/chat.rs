//! Chat command - send one prompt to the portal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use portico_core::Attachment;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{CredentialArgs, build_chat, load_config};
use crate::output::{ChatOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Prompt text. Read from stdin when omitted.
    pub message: Option<String>,

    /// Form to run (falls back to portal.form_id in the config file).
    #[arg(long)]
    pub form_id: Option<String>,

    /// File to attach.
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Guesses a MIME type from the file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" | "log" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

async fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    debug!(file = %file_name, bytes = bytes.len(), "Attaching file");
    Ok(Attachment::new(file_name, mime_for(path), bytes))
}

async fn read_message(args: &ChatArgs) -> Result<String> {
    if let Some(message) = &args.message {
        return Ok(message.clone());
    }
    let mut buffer = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buffer)
        .await
        .context("cannot read prompt from stdin")?;
    Ok(buffer)
}

/// Runs the chat command.
pub async fn run(args: &ChatArgs, cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;
    let identity = args.credentials.resolve(&config)?;
    let Some(form_id) = args.form_id.clone().or_else(|| config.portal.form_id.clone()) else {
        bail!("no form id: pass --form-id or set portal.form_id");
    };

    let message = read_message(args).await?;
    let attachment = match &args.file {
        Some(path) => Some(read_attachment(path).await?),
        None => None,
    };

    let chat = build_chat(&config, &identity)?;
    let reply = chat
        .send_chat(&message, &identity, &form_id, attachment.as_ref())
        .await?;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_chat(&reply.model_label, &reply.reply));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&ChatOutput::from(reply))?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("report.PDF")), "application/pdf");
        assert_eq!(mime_for(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_for(Path::new("blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_read_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        tokio::fs::write(&path, "a,b\n").await.unwrap();

        let attachment = read_attachment(&path).await.unwrap();
        assert_eq!(attachment.file_name, "data.csv");
        assert_eq!(attachment.mime_type, "text/csv");
        assert_eq!(attachment.bytes, b"a,b\n");
    }

    #[tokio::test]
    async fn test_read_missing_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_attachment(&dir.path().join("nope.pdf")).await.unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
