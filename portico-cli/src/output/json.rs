//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use portico_core::{ChatReply, CredentialIdentity, Session};
use portico_fetch::{CircuitBreakerState, CircuitState};
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a chat reply.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutput {
    pub reply: String,
    pub model_label: String,
}

impl From<ChatReply> for ChatOutput {
    fn from(reply: ChatReply) -> Self {
        Self {
            reply: reply.reply,
            model_label: reply.model_label,
        }
    }
}

/// JSON output for a login check.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutput {
    pub user: String,
    pub base_url: String,
    /// Truncated session key; never the full digest.
    pub session_key: String,
    pub created_at: DateTime<Utc>,
    /// Cookie names only.
    pub cookies: Vec<String>,
    pub access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakers: Option<Vec<BreakerOutput>>,
}

impl LoginOutput {
    /// Summarizes a session.
    pub fn new(identity: &CredentialIdentity, session: &Session, access: bool) -> Self {
        Self {
            user: session.user_id.clone(),
            base_url: identity.base_url.clone(),
            session_key: identity.session_key().short().to_string(),
            created_at: session.created_at,
            cookies: session
                .cookie_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            access,
            breakers: None,
        }
    }
}

/// One breaker.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerOutput {
    pub key: String,
    pub state: CircuitState,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_time: Option<DateTime<Utc>>,
}

impl BreakerOutput {
    /// Converts a registry snapshot entry.
    pub fn new(key: String, state: CircuitBreakerState) -> Self {
        Self {
            key,
            state: state.state,
            failure_count: state.failure_count,
            last_failure_time: state.last_failure_time,
        }
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats an error for scripting consumers.
    pub fn format_error(&self, error: &str, exit_code: i32) -> Result<String> {
        self.format(&serde_json::json!({
            "error": error,
            "exitCode": exit_code,
        }))
    }
}
