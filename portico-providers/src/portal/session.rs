//! Process-wide session cache.
//!
//! Sessions are keyed by [`SessionKey`] and expire after an idle TTL. Each
//! key also owns an async lock that serializes logins for that identity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use portico_core::{Session, SessionKey};
use portico_fetch::KeyedStore;
use tokio::sync::Mutex;
use tracing::debug;

/// Cached sessions plus per-identity login locks.
#[derive(Debug)]
pub struct SessionCache {
    sessions: KeyedStore<Session>,
    flights: KeyedStore<Arc<Mutex<()>>>,
    ttl: chrono::Duration,
}

impl SessionCache {
    /// Creates an empty cache.
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            sessions: KeyedStore::new(),
            flights: KeyedStore::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Returns the session for `key` unless it has expired.
    ///
    /// Expired entries are dropped on the way out, along with an idle login
    /// lock.
    pub fn get(&self, key: &SessionKey, now: DateTime<Utc>) -> Option<Session> {
        let ttl = self.ttl;
        let session = self.sessions.update(key.as_str(), |slot| {
            if slot.as_ref().is_some_and(|s| s.is_expired(now, ttl)) {
                debug!(key = %key, "Session expired");
                *slot = None;
            }
            slot.clone()
        });
        if session.is_none() {
            self.release_flight(key);
        }
        session
    }

    /// Stores a session.
    pub fn insert(&self, key: &SessionKey, session: Session) {
        self.sessions.set(key.as_str(), session);
    }

    /// Removes a session. Returns true if one was cached.
    pub fn remove(&self, key: &SessionKey) -> bool {
        let removed = self.sessions.delete(key.as_str()).is_some();
        self.release_flight(key);
        removed
    }

    /// Marks a cached session as used. Returns false if none is cached.
    pub fn touch(&self, key: &SessionKey, now: DateTime<Utc>) -> bool {
        self.sessions.update(key.as_str(), |slot| match slot {
            Some(session) => {
                session.touch(now);
                true
            }
            None => false,
        })
    }

    /// Returns the login lock for `key`.
    pub fn flight(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        self.flights.update(key.as_str(), |slot| {
            Arc::clone(slot.get_or_insert_with(|| Arc::new(Mutex::new(()))))
        })
    }

    /// Drops the login lock for `key` unless a login is holding or waiting
    /// on it.
    fn release_flight(&self, key: &SessionKey) {
        self.flights.update(key.as_str(), |slot| {
            if slot.as_ref().is_some_and(|f| Arc::strong_count(f) == 1) {
                *slot = None;
            }
        });
    }

    /// Number of cached sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
