//! The keyspace: one [`Database`] per logical database index, holding a
//! mutex-guarded map of keys to typed values plus expiry and watch metadata.

pub mod sorted_set;
pub mod stream;
pub mod value;

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::util::{error::ServerError, now_ms};
use value::Value;

pub struct Entry {
    pub value: Value,
    pub expire_at_ms: Option<u64>,
}

impl Entry {
    pub fn new(value: Value) -> Self {
        Self { value, expire_at_ms: None }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.expire_at_ms, Some(t) if t <= now)
    }
}

/// One logical database (`SELECT 0..N`). The entry map and the per-key
/// version counters share a single lock: every mutating command holds it
/// for its whole synchronous body, which is what makes each command an
/// indivisible unit without needing a separate per-database actor task.
pub struct Database {
    inner: Mutex<DatabaseInner>,
}

#[derive(Default)]
struct DatabaseInner {
    data: HashMap<Bytes, Entry>,
    /// Bumped whenever a key is created, mutated, or deleted — including
    /// recreation after deletion — so `WATCH` can detect "same value,
    /// different history" as well as plain value changes.
    versions: HashMap<Bytes, u64>,
}

impl Default for Database {
    fn default() -> Self {
        Self { inner: Mutex::new(DatabaseInner::default()) }
    }
}

pub struct Guard<'a> {
    inner: parking_lot::MutexGuard<'a, DatabaseInner>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> Guard<'_> {
        Guard { inner: self.inner.lock() }
    }
}

impl<'a> Guard<'a> {
    fn purge_if_expired(&mut self, key: &[u8]) {
        let now = now_ms();
        let expired = self.inner.data.get(key).map(|e| e.is_expired(now)).unwrap_or(false);
        if expired {
            self.inner.data.remove(key);
            self.bump_version(key);
        }
    }

    fn bump_version(&mut self, key: &[u8]) {
        let v = self.inner.versions.entry(Bytes::copy_from_slice(key)).or_insert(0);
        *v = v.wrapping_add(1);
    }

    pub fn version_of(&self, key: &[u8]) -> u64 {
        self.inner.versions.get(key).copied().unwrap_or(0)
    }

    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.purge_if_expired(key);
        self.inner.data.contains_key(key)
    }

    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        self.purge_if_expired(key);
        self.inner.data.get(key).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.purge_if_expired(key);
        self.inner.data.get_mut(key).map(|e| &mut e.value)
    }

    pub fn get_entry_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.purge_if_expired(key);
        self.inner.data.get_mut(key)
    }

    /// Fetches the value at `key`, creating it from `default` if absent (and
    /// not already holding an expired value). Used by every "create on
    /// demand" mutator (`LPUSH`, `SADD`, `HSET`, ...).
    pub fn get_or_create(&mut self, key: &Bytes, default: impl FnOnce() -> Value) -> Result<&mut Value, ServerError> {
        self.purge_if_expired(key);
        if !self.inner.data.contains_key(key.as_ref()) {
            self.inner.data.insert(key.clone(), Entry::new(default()));
        }
        self.bump_version(key);
        Ok(&mut self.inner.data.get_mut(key.as_ref()).unwrap().value)
    }

    pub fn set(&mut self, key: Bytes, value: Value) {
        self.bump_version(&key);
        self.inner.data.insert(key, Entry::new(value));
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Value> {
        self.purge_if_expired(key);
        let removed = self.inner.data.remove(key).map(|e| e.value);
        if removed.is_some() {
            self.bump_version(key);
        }
        removed
    }

    /// Removes the key if the closure says its container is now empty —
    /// the common "last element popped deletes the key" rule for lists,
    /// hashes, sets, and sorted sets.
    pub fn remove_if_empty(&mut self, key: &[u8]) {
        if matches!(self.inner.data.get(key), Some(e) if e.value.is_empty_container()) {
            self.inner.data.remove(key);
            self.bump_version(key);
        }
    }

    pub fn set_expiry(&mut self, key: &[u8], at_ms: Option<u64>) -> bool {
        self.purge_if_expired(key);
        match self.inner.data.get_mut(key) {
            Some(e) => {
                e.expire_at_ms = at_ms;
                self.bump_version(key);
                true
            }
            None => false,
        }
    }

    pub fn ttl_ms(&mut self, key: &[u8]) -> Option<Option<u64>> {
        self.purge_if_expired(key);
        self.inner.data.get(key).map(|e| e.expire_at_ms)
    }

    pub fn keys(&mut self) -> Vec<Bytes> {
        let now = now_ms();
        let expired: Vec<Bytes> = self
            .inner
            .data
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            self.inner.data.remove(k);
            self.bump_version(k);
        }
        self.inner.data.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn flush(&mut self) {
        let keys: Vec<Bytes> = self.inner.data.keys().cloned().collect();
        self.inner.data.clear();
        for k in keys {
            self.bump_version(&k);
        }
    }

    /// Exchanges the entire keyspace (and version counters) of two
    /// databases, for `SWAPDB`.
    pub fn swap_with(&mut self, other: &mut Guard<'_>) {
        std::mem::swap(&mut self.inner.data, &mut other.inner.data);
        std::mem::swap(&mut self.inner.versions, &mut other.inner.versions);
    }

    pub fn rename(&mut self, from: &[u8], to: Bytes) -> Result<(), ServerError> {
        self.purge_if_expired(from);
        let entry = self.inner.data.remove(from).ok_or_else(ServerError::no_such_key)?;
        self.bump_version(from);
        self.inner.data.insert(to.clone(), entry);
        self.bump_version(&to);
        Ok(())
    }
}

pub mod select {
    /// The default and maximum number of logical databases, matching the
    /// conventional Redis/Valkey default of 16.
    pub const DEFAULT_DB_COUNT: usize = 16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_bumps_on_recreate_after_delete() {
        let db = Database::new();
        let mut g = db.lock();
        g.set(Bytes::from_static(b"k"), Value::Str(Bytes::from_static(b"1")));
        let v1 = g.version_of(b"k");
        g.remove(b"k");
        g.set(Bytes::from_static(b"k"), Value::Str(Bytes::from_static(b"1")));
        let v2 = g.version_of(b"k");
        assert_ne!(v1, v2);
    }

    #[test]
    fn expired_key_reads_as_absent() {
        let db = Database::new();
        let mut g = db.lock();
        g.set(Bytes::from_static(b"k"), Value::Str(Bytes::from_static(b"1")));
        g.set_expiry(b"k", Some(1));
        assert!(g.get(b"k").is_none());
        assert!(!g.exists(b"k"));
    }

    #[test]
    fn remove_if_empty_drops_exhausted_list() {
        let db = Database::new();
        let mut g = db.lock();
        g.set(Bytes::from_static(b"k"), Value::List(Default::default()));
        g.remove_if_empty(b"k");
        assert!(!g.exists(b"k"));
    }
}
