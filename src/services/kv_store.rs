// src/services/kv_store.rs
// DOCUMENTATION: In-memory key-value store with per-entry TTL
// PURPOSE: Ephemeral state (upload leases, cached farm pages)

use crate::services::rate_limit::FormRateLimiter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Key prefix for photo upload leases
pub const LEASE_PREFIX: &str = "photo-lease:";
/// Key prefix for cached farm detail responses
pub const FARM_PREFIX: &str = "farm:";
/// Key prefix for per-farm invalidation counters
pub const GENERATION_PREFIX: &str = "farm-gen:";

/// Entry with expiration
#[derive(Clone, Debug)]
struct Entry {
    data: String,
    expires_at: Instant,
}

impl Entry {
    fn new(data: String, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Thread-safe key-value store with TTL
/// DOCUMENTATION: Values are strings; structured values go through
/// the JSON helpers. Expired entries are invisible to readers and
/// removed by the background cleanup task.
pub struct KvStore {
    store: Arc<RwLock<HashMap<String, Entry>>>,
    default_ttl: Duration,
}

impl KvStore {
    /// Create new store with default TTL
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            default_ttl: Duration::from_secs(ttl_seconds),
        }
    }

    pub fn farm_key(slug: &str) -> String {
        format!("{}{}", FARM_PREFIX, slug)
    }

    pub fn lease_key(lease_id: &uuid::Uuid) -> String {
        format!("{}{}", LEASE_PREFIX, lease_id)
    }

    pub fn farm_generation_key(slug: &str) -> String {
        format!("{}{}", GENERATION_PREFIX, slug)
    }

    /// Get value if present and not expired
    pub async fn get(&self, key: &str) -> Option<String> {
        let store = self.store.read().await;

        match store.get(key) {
            Some(entry) if !entry.is_expired() => {
                log::debug!("KV HIT for key: {}", key);
                Some(entry.data.clone())
            }
            Some(_) => {
                log::debug!("KV EXPIRED for key: {}", key);
                None
            }
            None => {
                log::debug!("KV MISS for key: {}", key);
                None
            }
        }
    }

    /// Set value with custom TTL
    pub async fn set_with_ttl(&self, key: String, value: String, ttl: Duration) {
        let mut store = self.store.write().await;
        log::debug!("KV SET for key: {} (TTL: {}s)", key, ttl.as_secs());
        store.insert(key, Entry::new(value, ttl));
    }

    /// Invalidation counter stored under `gen_key`, 0 when unset
    pub async fn generation(&self, gen_key: &str) -> u64 {
        let store = self.store.read().await;
        store
            .get(gen_key)
            .filter(|e| !e.is_expired())
            .and_then(|e| e.data.parse().ok())
            .unwrap_or(0)
    }

    /// Advance the counter under `gen_key` and return the new value
    /// DOCUMENTATION: The counter lives twice as long as cached values, so
    /// any write that raced the bump still sees a different generation
    pub async fn bump_generation(&self, gen_key: &str) -> u64 {
        let mut store = self.store.write().await;
        let next = store
            .get(gen_key)
            .filter(|e| !e.is_expired())
            .and_then(|e| e.data.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        store.insert(gen_key.to_string(), Entry::new(next.to_string(), self.default_ttl * 2));
        next
    }

    /// Cache `value` with the default TTL unless `gen_key` moved past `expected`
    /// DOCUMENTATION: Check and write happen under one lock, so a reader
    /// that loaded data before an invalidation never stores it afterwards
    pub async fn set_json_if_generation<T: Serialize>(
        &self,
        key: String,
        value: &T,
        gen_key: &str,
        expected: u64,
    ) -> Result<bool, serde_json::Error> {
        let raw = serde_json::to_string(value)?;
        let mut store = self.store.write().await;
        let current = store
            .get(gen_key)
            .filter(|e| !e.is_expired())
            .and_then(|e| e.data.parse::<u64>().ok())
            .unwrap_or(0);
        if current != expected {
            log::debug!("KV SKIP for key: {} (generation {} != {})", key, current, expected);
            return Ok(false);
        }
        store.insert(key, Entry::new(raw, self.default_ttl));
        Ok(true)
    }

    /// Remove and return a live value in one step
    /// DOCUMENTATION: Two concurrent callers can never both receive the value
    pub async fn take(&self, key: &str) -> Option<String> {
        let mut store = self.store.write().await;
        match store.remove(key) {
            Some(entry) if !entry.is_expired() => Some(entry.data),
            _ => None,
        }
    }

    /// Remove a key, returning whether it existed
    pub async fn remove(&self, key: &str) -> bool {
        let mut store = self.store.write().await;
        store.remove(key).is_some()
    }

    /// Remove every key starting with `prefix`
    pub async fn remove_prefix(&self, prefix: &str) -> usize {
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|key, _| !key.starts_with(prefix));
        before - store.len()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Discarding undecodable KV entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn take_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.take(key).await?;
        serde_json::from_str(&raw)
            .map_err(|e| log::warn!("Discarding undecodable KV entry {}: {}", key, e))
            .ok()
    }

    pub async fn set_json_with_ttl<T: Serialize>(
        &self,
        key: String,
        value: &T,
        ttl: Duration,
    ) -> Result<(), serde_json::Error> {
        let raw = serde_json::to_string(value)?;
        self.set_with_ttl(key, raw, ttl).await;
        Ok(())
    }

    /// Clear expired entries
    pub async fn cleanup(&self) {
        let mut store = self.store.write().await;
        let before_count = store.len();
        store.retain(|_, entry| !entry.is_expired());
        let after_count = store.len();

        if before_count > after_count {
            log::info!(
                "KV cleanup: removed {} expired entries ({} remaining)",
                before_count - after_count,
                after_count
            );
        }
    }

    /// Get store statistics
    pub async fn stats(&self) -> KvStats {
        let store = self.store.read().await;
        let total = store.len();
        let expired = store.values().filter(|e| e.is_expired()).count();
        let leases = store
            .iter()
            .filter(|(k, e)| k.starts_with(LEASE_PREFIX) && !e.is_expired())
            .count();

        KvStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total - expired,
            active_leases: leases,
        }
    }

    /// Drop everything, leases included
    pub async fn clear(&self) -> usize {
        let mut store = self.store.write().await;
        let count = store.len();
        store.clear();
        log::info!("KV store cleared: {} entries removed", count);
        count
    }
}

/// Store statistics
#[derive(Debug, Serialize, Deserialize)]
pub struct KvStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    pub active_leases: usize,
}

/// Background task: drop expired entries and idle rate-limit buckets
pub fn start_cleanup_task(kv: Arc<KvStore>, limiter: Arc<FormRateLimiter>, interval_seconds: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));

        loop {
            interval.tick().await;
            kv.cleanup().await;
            limiter.prune();
        }
    });
}

#[cfg(test)]
impl KvStore {
    pub async fn set(&self, key: String, value: String) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get() {
        let kv = KvStore::new(60);
        kv.set("k".to_string(), "v".to_string()).await;
        assert_eq!(kv.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_expiration() {
        let kv = KvStore::new(60);
        kv.set_with_ttl("k".to_string(), "v".to_string(), Duration::from_millis(50))
            .await;
        assert!(kv.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(kv.get("k").await.is_none());
        assert!(kv.take("k").await.is_none());
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let kv = KvStore::new(60);
        kv.set("lease".to_string(), "payload".to_string()).await;

        assert_eq!(kv.take("lease").await, Some("payload".to_string()));
        assert_eq!(kv.take("lease").await, None);
    }

    #[tokio::test]
    async fn test_remove_prefix() {
        let kv = KvStore::new(60);
        kv.set(KvStore::farm_key("a"), "1".into()).await;
        kv.set(KvStore::farm_key("b"), "2".into()).await;
        kv.set("other".into(), "3".into()).await;

        assert_eq!(kv.remove_prefix(FARM_PREFIX).await, 2);
        assert!(kv.get("other").await.is_some());
    }

    #[tokio::test]
    async fn test_json_helpers() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Lease {
            key: String,
        }

        let kv = KvStore::new(60);
        let lease = Lease { key: "farm-photos/x.jpg".into() };
        kv.set_json_with_ttl("l".into(), &lease, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(kv.get_json::<Lease>("l").await, Some(lease));
        kv.set("bad".into(), "{not json".into()).await;
        assert!(kv.get_json::<Lease>("bad").await.is_none());
    }

    #[tokio::test]
    async fn test_generation_guards_stale_writes() {
        let kv = KvStore::new(60);
        let gen_key = KvStore::farm_generation_key("hollow-farm");
        let key = KvStore::farm_key("hollow-farm");

        let seen = kv.generation(&gen_key).await;
        assert_eq!(seen, 0);

        // invalidated while the reader was loading
        assert_eq!(kv.bump_generation(&gen_key).await, 1);
        assert!(!kv.set_json_if_generation(key.clone(), &"stale", &gen_key, seen).await.unwrap());
        assert!(kv.get(&key).await.is_none());

        let seen = kv.generation(&gen_key).await;
        assert!(kv.set_json_if_generation(key.clone(), &"fresh", &gen_key, seen).await.unwrap());
        assert_eq!(kv.get_json::<String>(&key).await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_cleanup_and_stats() {
        let kv = KvStore::new(60);
        let lease_key = KvStore::lease_key(&uuid::Uuid::new_v4());
        kv.set(lease_key, "{}".into()).await;
        kv.set_with_ttl("gone".into(), "x".into(), Duration::from_millis(10))
            .await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = kv.stats().await;
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.active_leases, 1);

        kv.cleanup().await;
        let stats = kv.stats().await;
        assert_eq!(stats.total_entries, 1);
    }
}
