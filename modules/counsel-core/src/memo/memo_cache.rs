use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::Clock;

/// Upper bound on a configured TTL (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
struct MemoEntry<V> {
    stored_at: DateTime<Utc>,
    value: V,
}

/// In-memory TTL map keyed by request hash.
///
/// An entry is live while `now - stored_at < ttl`. Lookups ignore stale
/// entries; inserts prune them. The lock is never held across an await.
pub struct MemoCache<V> {
    entries: Mutex<HashMap<String, MemoEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> MemoCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// TTL given in whole seconds, as it appears in config.
    pub fn with_ttl_secs(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self::new(Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64), clock)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        self.lock()
            .get(key)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.value.clone())
    }

    /// Current time on the cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Store `value` stamped with the current time, replacing any previous
    /// entry, and drop every expired entry.
    pub fn insert(&self, key: String, value: V) {
        self.insert_at(key, value, self.clock.now());
    }

    /// Like [`insert`](Self::insert) but stamped with `stored_at`, usually the
    /// moment the value started being computed.
    pub fn insert_at(&self, key: String, value: V, stored_at: DateTime<Utc>) {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        let pruned = before - entries.len();
        if pruned > 0 {
            debug!(pruned, "Pruned expired memo entries");
        }
        entries.insert(key, MemoEntry { stored_at, value });
    }

    /// Delete expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        before - entries.len()
    }

    /// Entries currently held, stale ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn is_live(&self, entry: &MemoEntry<V>, now: DateTime<Utc>) -> bool {
        now - entry.stored_at < self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
