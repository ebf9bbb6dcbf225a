use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use rowcache_core::CoreResult;

/// Key/value store holding cache entries with per-key expiry.
///
/// Every write sets the key's TTL; reads of expired keys behave as misses.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns `None` if absent or expired.
    async fn get(&self, key: &str) -> CoreResult<Option<Bytes>>;

    /// Put a value, replacing any previous one and refreshing its expiry.
    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> CoreResult<()>;

    /// Delete a key. Succeeds even if the key doesn't exist.
    async fn delete(&self, key: &str) -> CoreResult<()>;

    /// Check if a key exists without reading its contents.
    async fn exists(&self, key: &str) -> CoreResult<bool>;
}
