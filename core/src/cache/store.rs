use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use serde_json::Value;

use crate::config::CacheConfig;

/// A cached executor result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub hit_count: u64,
    expires: Instant,
}

impl CacheEntry {
    fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Utc::now(),
            hit_count: 0,
            expires: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

struct CacheInner {
    // Reads go through peek so the LRU order stays creation order.
    entries: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Bounded, TTL-aware result cache shared by every dispatch of a run.
///
/// `get_or_execute` serializes producers per key: concurrent callers for the
/// same key wait for the first one and then read its stored value.
pub struct ExecutionCache {
    inner: Mutex<CacheInner>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    max_entries: usize,
    default_ttl: Duration,
}

impl ExecutionCache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            key_locks: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self::new(cfg.max_entries, Duration::from_secs(cfg.default_ttl_secs))
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stored value for `key`. Expired entries are removed and count as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock_inner();
        let expired = inner.entries.peek(key).map(CacheEntry::is_expired);

        match expired {
            Some(false) => {
                inner.hits += 1;
                let entry = inner.entries.peek_mut(key)?;
                entry.hit_count += 1;
                Some(entry.value.clone())
            }
            Some(true) => {
                inner.entries.pop(key);
                inner.misses += 1;
                tracing::trace!(key = %key, "cache entry expired");
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store `value` under `key`, evicting expired and then oldest entries when full.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let key = key.into();
        let mut inner = self.lock_inner();

        if !inner.entries.contains(&key) && inner.entries.len() >= self.max_entries {
            let removed = evict_expired(&mut inner.entries);
            inner.evictions += removed as u64;

            while inner.entries.len() >= self.max_entries {
                match inner.entries.pop_lru() {
                    Some((oldest, _)) => {
                        inner.evictions += 1;
                        tracing::trace!(key = %oldest, "cache entry evicted");
                    }
                    None => break,
                }
            }
        }

        inner.entries.put(key, CacheEntry::new(value, ttl));
    }

    /// Return the cached value or run `producer` once and cache its output.
    /// The flag is true when the value came from the cache.
    pub async fn get_or_execute<F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> (Value, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        let result = self
            .get_or_try_execute(key, ttl, || async { Ok::<_, Infallible>(producer().await) })
            .await;
        match result {
            Ok(hit) => hit,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`get_or_execute`](Self::get_or_execute). Errors are
    /// returned to the caller and never cached.
    pub async fn get_or_try_execute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<(Value, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let key_lock = self.key_lock(key);
        let guard = key_lock.lock().await;

        let outcome = match self.get(key) {
            Some(value) => Ok((value, true)),
            None => match producer().await {
                Ok(value) => {
                    self.set(key, value.clone(), ttl);
                    Ok((value, false))
                }
                Err(e) => Err(e),
            },
        };

        drop(guard);
        self.release_key_lock(key, &key_lock);
        outcome
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.lock_inner().entries.pop(key).is_some()
    }

    /// Remove every expired entry; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.lock_inner();
        let removed = evict_expired(&mut inner.entries);
        inner.evictions += removed as u64;
        removed
    }

    pub fn clear(&self) {
        self.lock_inner().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock_inner();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_key_lock(&self, key: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map plus ours: nobody else is waiting.
        let idle = locks
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, lock) && Arc::strong_count(lock) <= 2);
        if idle {
            locks.remove(key);
        }
    }
}

impl Default for ExecutionCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

fn evict_expired(entries: &mut LruCache<String, CacheEntry>) -> usize {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| entry.is_expired())
        .map(|(key, _)| key.clone())
        .collect();
    for key in &expired {
        entries.pop(key);
    }
    expired.len()
}
