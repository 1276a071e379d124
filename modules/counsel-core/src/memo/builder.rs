use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

use super::MemoCache;
use crate::hashing::canonical_hash;

/// A value plus whether it came from the memo cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memoized<T> {
    pub value: T,
    pub cached: bool,
}

/// Deduplicates calls by hashing `key` (canonical JSON, SHA-256).
pub struct MemoBuilder<'a, K, V> {
    function_name: &'a str,
    key: K,
    cache: &'a MemoCache<V>,
}

impl<'a, K: Serialize, V: Clone> MemoBuilder<'a, K, V> {
    pub fn new(function_name: &'a str, key: K, cache: &'a MemoCache<V>) -> Self {
        Self {
            function_name,
            key,
            cache,
        }
    }

    /// Get the live cached value or compute via the provided closure.
    /// The entry's age counts from when `f` started.
    /// Errors from `f` are returned and not cached. A key that cannot be
    /// serialized bypasses the cache.
    pub async fn get_or<F, Fut, E>(self, f: F) -> Result<Memoized<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let input_hash = match canonical_hash(&self.key) {
            Ok(hash) => format!("{}:{}", self.function_name, hash),
            Err(e) => {
                warn!(function = self.function_name, error = %e, "Unhashable memo key, computing uncached");
                return f().await.map(|value| Memoized {
                    value,
                    cached: false,
                });
            }
        };

        if let Some(value) = self.cache.get(&input_hash) {
            debug!(function = self.function_name, "Memo hit");
            return Ok(Memoized {
                value,
                cached: true,
            });
        }

        let started = self.cache.now();
        let value = f().await?;
        self.cache.insert_at(input_hash, value.clone(), started);

        Ok(Memoized {
            value,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::ManualClock;
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn second_call_is_cached_until_expiry() {
        let clock = Arc::new(ManualClock::default());
        let cache = MemoCache::with_ttl_secs(120, clock.clone());

        let first = MemoBuilder::new("advise", "alex", &cache)
            .get_or(|| async { Ok::<_, std::convert::Infallible>(1) })
            .await
            .unwrap();
        assert!(!first.cached);

        let second = MemoBuilder::new("advise", "alex", &cache)
            .get_or(|| async { Ok::<_, std::convert::Infallible>(2) })
            .await
            .unwrap();
        assert_eq!(second, Memoized { value: 1, cached: true });

        clock.advance(Duration::seconds(121));
        let third = MemoBuilder::new("advise", "alex", &cache)
            .get_or(|| async { Ok::<_, std::convert::Infallible>(3) })
            .await
            .unwrap();
        assert_eq!(third, Memoized { value: 3, cached: false });
    }

    #[tokio::test]
    async fn entry_age_counts_from_start_of_computation() {
        let clock = Arc::new(ManualClock::default());
        let cache = MemoCache::with_ttl_secs(120, clock.clone());

        let slow_clock = clock.clone();
        MemoBuilder::new("advise", "alex", &cache)
            .get_or(|| async move {
                slow_clock.advance(Duration::seconds(100));
                Ok::<_, std::convert::Infallible>(1)
            })
            .await
            .unwrap();

        clock.advance(Duration::seconds(19));
        assert_eq!(cache.len(), 1);
        let live = MemoBuilder::new("advise", "alex", &cache)
            .get_or(|| async { Ok::<_, std::convert::Infallible>(2) })
            .await
            .unwrap();
        assert!(live.cached);

        clock.advance(Duration::seconds(1));
        let expired = MemoBuilder::new("advise", "alex", &cache)
            .get_or(|| async { Ok::<_, std::convert::Infallible>(3) })
            .await
            .unwrap();
        assert_eq!(expired, Memoized { value: 3, cached: false });
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = MemoCache::with_ttl_secs(60, Arc::new(ManualClock::default()));

        let failed = MemoBuilder::new("f", 1, &cache)
            .get_or(|| async { Err::<u8, _>("boom") })
            .await;
        assert_eq!(failed, Err("boom"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn function_name_scopes_keys() {
        let cache = MemoCache::with_ttl_secs(60, Arc::new(ManualClock::default()));
        MemoBuilder::new("a", 1, &cache)
            .get_or(|| async { Ok::<_, ()>(10) })
            .await
            .unwrap();
        let other = MemoBuilder::new("b", 1, &cache)
            .get_or(|| async { Ok::<_, ()>(20) })
            .await
            .unwrap();
        assert_eq!(other.value, 20);
        assert!(!other.cached);
    }
}
