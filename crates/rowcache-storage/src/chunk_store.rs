//! Encoding layer shared by the base and view caches.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use rowcache_core::{CoreResult, Row};

use crate::codec::{decode_rows, encode_rows};
use crate::compression::CompressionConfig;
use crate::kv::KvStore;

/// Reads and writes JSON meta entries and compressed row chunks.
///
/// Undecodable entries are deleted and reported as misses.
#[derive(Clone)]
pub(crate) struct ChunkStore {
    store: Arc<dyn KvStore>,
    compression: CompressionConfig,
    ttl: Duration,
}

impl ChunkStore {
    pub(crate) fn new(store: Arc<dyn KvStore>, compression: CompressionConfig, ttl: Duration) -> Self {
        Self {
            store,
            compression,
            ttl,
        }
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable meta entry");
                self.store.delete(key).await?;
                Ok(None)
            }
        }
    }

    pub(crate) async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> CoreResult<()> {
        let json = serde_json::to_vec(value)?;
        self.store.set_with_ttl(key, Bytes::from(json), self.ttl).await
    }

    pub(crate) async fn read_rows(&self, key: &str) -> CoreResult<Option<Vec<Row>>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        match decode_rows(&raw) {
            Ok(rows) => Ok(Some(rows)),
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable chunk entry");
                self.store.delete(key).await?;
                Ok(None)
            }
        }
    }

    pub(crate) async fn write_rows(&self, key: &str, rows: &[Row]) -> CoreResult<()> {
        let encoded = encode_rows(rows, self.compression)?;
        self.store.set_with_ttl(key, encoded, self.ttl).await
    }

    pub(crate) async fn exists(&self, key: &str) -> CoreResult<bool> {
        self.store.exists(key).await
    }

    pub(crate) async fn delete(&self, key: &str) -> CoreResult<()> {
        self.store.delete(key).await
    }
}
