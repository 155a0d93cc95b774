use crate::api::types::ApiError;
use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Time-boxed response cache keyed by deterministic operation strings.
///
/// An entry older than the configured time-to-live is treated as absent and
/// lazily overwritten by the next fetch; nothing is evicted proactively.
/// Two logically concurrent misses for the same key may each invoke their
/// producer — producers are idempotent reads, so the duplicated work is
/// accepted rather than deduplicated with a single-flight map.
///
/// Memory is bounded by callers issuing `clear_all` on explicit refresh
/// actions, not by the cache itself.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    fetched_at: Instant,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Return the cached payload for `key` when younger than the TTL,
    /// otherwise await `producer`, store its result, and return it.
    /// Producer failures are propagated and never cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, producer: F) -> Result<Value, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ApiError>>,
    {
        if let Some(hit) = self.lookup(key) {
            debug!(key, "response cache hit");
            return Ok(hit);
        }

        let payload = producer().await?;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload: payload.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(payload)
    }

    /// Drop one entry; the next `get_or_fetch` for the key is a miss.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry immediately.
    pub fn clear_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }
}

/// Build a deterministic cache key from an operation name and its arguments
pub fn cache_key(operation: &str, args: &[&str]) -> String {
    let mut key = String::from(operation);
    for arg in args {
        key.push('|');
        key.push_str(arg);
    }
    key
}
