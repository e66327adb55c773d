//! Authenticated portal session.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A logged-in portal session.
///
/// The cookie header is the composite `Cookie` value rebuilt from the login
/// exchange; it is sent verbatim on every authenticated request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Composite `Cookie` header value (`name=value; name=value`).
    pub cookie_header: String,
    /// When the login completed.
    pub created_at: DateTime<Utc>,
    /// Last time the session was used successfully.
    pub last_activity: DateTime<Utc>,
    /// Login name the session belongs to.
    pub user_id: String,
}

impl Session {
    /// Creates a fresh session.
    pub fn new(cookie_header: impl Into<String>, user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            cookie_header: cookie_header.into(),
            created_at: now,
            last_activity: now,
            user_id: user_id.into(),
        }
    }

    /// Returns true once `ttl` has passed since the last activity.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity >= ttl
    }

    /// Marks the session as used, pushing its expiry out by a full TTL.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Returns the value of a cookie carried by this session.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookie_pairs()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Names of the cookies carried by this session, in header order.
    pub fn cookie_names(&self) -> Vec<&str> {
        self.cookie_pairs().map(|(n, _)| n).collect()
    }

    /// Merges cookies into the header.
    ///
    /// A cookie whose name is already present replaces the old value in
    /// place; new names are appended in the order given.
    pub fn merge_cookies<'a, I>(&mut self, cookies: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut pairs: Vec<(String, String)> = self
            .cookie_pairs()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();

        for (name, value) in cookies {
            match pairs.iter_mut().find(|(n, _)| n == name) {
                Some(existing) => existing.1 = value.to_string(),
                None => pairs.push((name.to_string(), value.to_string())),
            }
        }

        self.cookie_header = pairs
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
    }

    fn cookie_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookie_header
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.split_once('='))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookies", &self.cookie_names())
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .field("user_id", &self.user_id)
            .finish()
    }
}
