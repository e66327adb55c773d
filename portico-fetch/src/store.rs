//! Process-wide keyed state.
//!
//! Session caches and breaker tables are shared by every in-flight request.
//! [`KeyedStore`] keeps them behind one mutex and exposes read-modify-write
//! through [`KeyedStore::update`], so two requests racing on the same key
//! never lose each other's writes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A string-keyed map guarded for concurrent use.
#[derive(Debug)]
pub struct KeyedStore<V> {
    entries: Mutex<HashMap<String, V>>,
}

impl<V> KeyedStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    // A panic while holding the lock leaves the map itself intact.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces the value for `key`.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.lock().insert(key.into(), value);
    }

    /// Removes and returns the value for `key`.
    pub fn delete(&self, key: &str) -> Option<V> {
        self.lock().remove(key)
    }

    /// Atomically reads and modifies the slot for `key`.
    ///
    /// The closure sees `None` for a missing key; leaving `None` in the slot
    /// deletes the entry.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut Option<V>) -> R) -> R {
        let mut map = self.lock();
        let mut slot = map.remove(key);
        let out = f(&mut slot);
        if let Some(value) = slot {
            map.insert(key.to_string(), value);
        }
        out
    }

    /// Drops every entry the predicate rejects.
    pub fn retain(&self, mut keep: impl FnMut(&str, &V) -> bool) {
        self.lock().retain(|k, v| keep(k, v));
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<V: Clone> KeyedStore<V> {
    /// Returns a copy of the value for `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Returns a copy of every entry, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, V)> {
        let mut entries: Vec<_> = self
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl<V> Default for KeyedStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
