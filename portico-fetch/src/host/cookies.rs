//! Cookie parsing and header assembly.
//!
//! The portal authenticates with a hand-assembled `Cookie` header, so the
//! attributes of a `Set-Cookie` line (path, expiry, flags) are irrelevant:
//! only the name/value pair is kept.

use serde::{Deserialize, Serialize};

/// A name/value cookie pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
}

impl Cookie {
    /// Creates a cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parses the name/value pair out of a `Set-Cookie` header value.
    ///
    /// Returns `None` for lines without a name or with an empty value
    /// (servers clear cookies by setting them to nothing).
    pub fn parse_set_cookie(line: &str) -> Option<Self> {
        let pair = line.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        let value = value.trim().trim_matches('"');

        if name.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self::new(name, value))
    }

    /// Formats the pair as it appears in a `Cookie` header.
    pub fn to_pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Returns true if the name matches any entry of `allow` (ASCII
    /// case-insensitive).
    pub fn name_in(&self, allow: &[&str]) -> bool {
        allow.iter().any(|n| n.eq_ignore_ascii_case(&self.name))
    }
}

/// Build a cookie header string for HTTP requests.
///
/// Later cookies override earlier ones with the same name; the position of
/// the first occurrence is kept.
pub fn cookies_to_header(cookies: &[Cookie]) -> String {
    let mut merged: Vec<&Cookie> = Vec::with_capacity(cookies.len());
    for cookie in cookies {
        match merged.iter_mut().find(|c| c.name == cookie.name) {
            Some(slot) => *slot = cookie,
            None => merged.push(cookie),
        }
    }

    merged
        .iter()
        .map(|c| c.to_pair())
        .collect::<Vec<_>>()
        .join("; ")
}
