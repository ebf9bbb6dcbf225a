//! Best-effort JSON cache for small lookup results (dimension lists and the like).
//!
//! Failures never reach the caller: a failed read is a miss and a failed write is skipped.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use rowcache_core::CoreResult;

use crate::kv::KvStore;

const MIN_TTL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct LookupCache {
    store: Arc<dyn KvStore>,
}

impl LookupCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Lookup cache read failed");
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable lookup entry");
                if let Err(e) = self.store.delete(key).await {
                    warn!(key, error = %e, "Lookup cache delete failed");
                }
                None
            }
        }
    }

    /// Stores `value` for at least one second.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_vec(value) {
            Ok(json) => json,
            Err(e) => {
                debug!(key, error = %e, "Skipping lookup cache write");
                return;
            }
        };

        if let Err(e) = self
            .store
            .set_with_ttl(key, Bytes::from(json), ttl.max(MIN_TTL))
            .await
        {
            warn!(key, error = %e, "Lookup cache write failed");
        }
    }

    /// Returns the cached value, or computes, stores and returns it.
    ///
    /// Only errors from `compute` are propagated.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> CoreResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        let value = compute().await?;
        self.put(key, &value, ttl).await;
        Ok(value)
    }

    pub async fn evict(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "Lookup cache delete failed");
        }
    }
}
