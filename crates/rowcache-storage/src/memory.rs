//! In-memory key/value store backed by moka

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

use rowcache_core::CoreResult;

use crate::kv::KvStore;

#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory store used by the CLI and by tests.
///
/// Bounded by entry count; least recently used entries are evicted when full.
#[derive(Clone)]
pub struct MemoryKvStore {
    entries: Cache<String, Entry>,
}

impl MemoryKvStore {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> CoreResult<Option<Bytes>> {
        Ok(self.entries.get(key).await.map(|entry| entry.data))
    }

    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> CoreResult<()> {
        self.entries
            .insert(key.to_string(), Entry { data: value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.entries.contains_key(key))
    }
}
