//! Credential identity types.
//!
//! A [`CredentialIdentity`] is what the user types into the settings form.
//! Sessions are cached under the [`SessionKey`] derived from it, so the raw
//! password never has to be used as a map key or written to a log line.

use std::fmt;

use ring::digest::{Context, SHA256};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of hex characters shown when a key is logged.
const SHORT_KEY_LEN: usize = 12;

// ============================================================================
// Credential Identity
// ============================================================================

/// Login credentials for one portal deployment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialIdentity {
    /// Portal login name.
    pub username: String,
    /// Portal password.
    pub password: String,
    /// Base URL of the deployment, without a trailing slash.
    pub base_url: String,
}

impl CredentialIdentity {
    /// Creates a validated identity.
    ///
    /// The base URL must be absolute (`http` or `https`); a trailing slash is
    /// stripped so that `https://host/` and `https://host` share a session.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let username = username.into().trim().to_string();
        let password = password.into();
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();

        if username.is_empty() {
            return Err(CoreError::InvalidCredentials(
                "username is empty".to_string(),
            ));
        }
        if password.is_empty() {
            return Err(CoreError::InvalidCredentials(
                "password is empty".to_string(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CoreError::InvalidBaseUrl(base_url));
        }

        Ok(Self {
            username,
            password,
            base_url,
        })
    }

    /// Derives the stable cache key for this identity.
    pub fn session_key(&self) -> SessionKey {
        let mut ctx = Context::new(&SHA256);
        ctx.update(self.username.as_bytes());
        ctx.update(&[0]);
        ctx.update(self.password.as_bytes());
        ctx.update(&[0]);
        ctx.update(self.base_url.as_bytes());

        let hex = ctx
            .finish()
            .as_ref()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        SessionKey(hex)
    }
}

impl fmt::Debug for CredentialIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialIdentity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ============================================================================
// Session Key
// ============================================================================

/// Hex-encoded SHA-256 of a credential identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    /// Returns the full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the truncated form used in logs.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_KEY_LEN.min(self.0.len())]
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

// ============================================================================
// Tests
// ============================================================================
