//! Derived view cache, keyed by (scope, statement, signature).

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use rowcache_core::{CacheConfig, CoreResult, Row, ViewMeta};

use crate::chunk_store::ChunkStore;
use crate::compression::CompressionConfig;
use crate::keys::{view_chunk_key, view_meta_key};
use crate::kv::KvStore;
use crate::signature;

#[derive(Clone)]
pub struct ViewCache {
    entries: ChunkStore,
}

impl ViewCache {
    /// Entries are written with `cache.view_ttl()`.
    pub fn new(store: Arc<dyn KvStore>, config: &CacheConfig) -> Self {
        Self {
            entries: ChunkStore::new(
                store,
                CompressionConfig::new(config.compression_level),
                config.view_ttl(),
            ),
        }
    }

    pub fn compute_signature(statement_id: &str, sort_json: Option<&str>, filter_json: Option<&str>) -> String {
        signature::compute_signature(statement_id, sort_json, filter_json)
    }

    /// Writes view meta, merging over any stored fields that `meta` leaves null.
    pub async fn put_meta(&self, scope: &str, statement_id: &str, sig: &str, meta: &ViewMeta) -> CoreResult<ViewMeta> {
        let key = view_meta_key(scope, statement_id, sig);
        let mut merged: Value = self
            .entries
            .read_json(&key)
            .await?
            .unwrap_or_else(|| Value::Object(Default::default()));

        if let (Value::Object(stored), Value::Object(update)) = (&mut merged, serde_json::to_value(meta)?) {
            for (field, value) in update {
                if !value.is_null() {
                    stored.insert(field, value);
                }
            }
        }

        let merged: ViewMeta = serde_json::from_value(merged)?;
        self.entries.write_json(&key, &merged).await?;
        Ok(merged)
    }

    pub async fn get_meta(&self, scope: &str, statement_id: &str, sig: &str) -> CoreResult<Option<ViewMeta>> {
        self.entries.read_json(&view_meta_key(scope, statement_id, sig)).await
    }

    pub async fn exists(&self, scope: &str, statement_id: &str, sig: &str) -> CoreResult<bool> {
        self.entries.exists(&view_meta_key(scope, statement_id, sig)).await
    }

    pub async fn put_chunk(&self, scope: &str, statement_id: &str, sig: &str, index: usize, rows: &[Row]) -> CoreResult<()> {
        self.entries
            .write_rows(&view_chunk_key(scope, statement_id, sig, index), rows)
            .await
    }

    pub async fn get_chunk(&self, scope: &str, statement_id: &str, sig: &str, index: usize) -> CoreResult<Option<Vec<Row>>> {
        self.entries
            .read_rows(&view_chunk_key(scope, statement_id, sig, index))
            .await
    }

    /// Deletes the view meta and `chunk_count` chunk entries.
    ///
    /// When `chunk_count` is `None` the count recorded in the stored meta is used.
    pub async fn invalidate_view(
        &self,
        scope: &str,
        statement_id: &str,
        sig: &str,
        chunk_count: Option<usize>,
    ) -> CoreResult<usize> {
        let key = view_meta_key(scope, statement_id, sig);
        let chunks = match chunk_count {
            Some(count) => count,
            None => self
                .entries
                .read_json::<ViewMeta>(&key)
                .await?
                .map_or(0, |meta| meta.chunk_count),
        };

        self.entries.delete(&key).await?;
        for index in 0..chunks {
            self.entries
                .delete(&view_chunk_key(scope, statement_id, sig, index))
                .await?;
        }

        debug!(statement_id, sig, chunks, "Invalidated view");
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKvStore;
    use rowcache_core::CellValue;

    fn cache() -> (ViewCache, Arc<MemoryKvStore>) {
        let store = Arc::new(MemoryKvStore::new(1_000));
        (ViewCache::new(store.clone(), &CacheConfig::default()), store)
    }

    #[tokio::test]
    async fn test_exists_tracks_meta() {
        let (cache, _) = cache();
        assert!(!cache.exists("u1", "s1", "sig").await.unwrap());

        cache
            .put_meta("u1", "s1", "sig", &ViewMeta::new("s1", "sig", 500, 3, 1))
            .await
            .unwrap();
        assert!(cache.exists("u1", "s1", "sig").await.unwrap());
        assert!(!cache.exists("u1", "s1", "other").await.unwrap());
    }

    #[tokio::test]
    async fn test_meta_merge_keeps_row_count_when_update_omits_it() {
        let (cache, _) = cache();
        cache
            .put_meta("u1", "s1", "sig", &ViewMeta::new("s1", "sig", 500, 42, 1))
            .await
            .unwrap();

        let mut update = ViewMeta::new("s1", "sig", 500, 0, 1);
        update.row_count = None;
        let merged = cache.put_meta("u1", "s1", "sig", &update).await.unwrap();
        assert_eq!(merged.row_count, Some(42));
    }

    #[tokio::test]
    async fn test_invalidate_view_uses_stored_chunk_count() {
        let (cache, store) = cache();
        for index in 0..2 {
            cache
                .put_chunk("u1", "s1", "sig", index, &[vec![CellValue::Int(index as i64)]])
                .await
                .unwrap();
        }
        cache
            .put_meta("u1", "s1", "sig", &ViewMeta::new("s1", "sig", 1, 2, 2))
            .await
            .unwrap();

        assert_eq!(cache.invalidate_view("u1", "s1", "sig", None).await.unwrap(), 2);
        assert!(!cache.exists("u1", "s1", "sig").await.unwrap());
        assert!(!store.exists(&view_chunk_key("u1", "s1", "sig", 1)).await.unwrap());
    }
}
