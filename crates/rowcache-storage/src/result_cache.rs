//! Base result cache: per-statement meta and fixed-size row pages.

use std::sync::Arc;
use tracing::debug;

use rowcache_core::{CacheConfig, CoreResult, MetaUpdate, Row, StatementMeta};

use crate::chunk_store::ChunkStore;
use crate::compression::CompressionConfig;
use crate::keys::{chunk_key, meta_key};
use crate::kv::KvStore;

#[derive(Clone)]
pub struct ResultCache {
    entries: ChunkStore,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KvStore>, config: &CacheConfig) -> Self {
        Self {
            entries: ChunkStore::new(
                store,
                CompressionConfig::new(config.compression_level),
                config.ttl(),
            ),
        }
    }

    /// Merges `update` into the stored meta and writes it back.
    ///
    /// Concurrent writers race; the last merge wins.
    pub async fn put_meta(&self, scope: &str, statement_id: &str, update: MetaUpdate) -> CoreResult<StatementMeta> {
        let key = meta_key(scope, statement_id);
        let existing: Option<StatementMeta> = self.entries.read_json(&key).await?;
        let merged = update.apply(statement_id, existing);
        self.entries.write_json(&key, &merged).await?;
        Ok(merged)
    }

    pub async fn get_meta(&self, scope: &str, statement_id: &str) -> CoreResult<Option<StatementMeta>> {
        let meta: Option<StatementMeta> = self.entries.read_json(&meta_key(scope, statement_id)).await?;
        Ok(meta.map(|mut m| {
            m.statement_id = statement_id.to_string();
            m
        }))
    }

    pub async fn put_chunk(&self, scope: &str, statement_id: &str, index: usize, rows: &[Row]) -> CoreResult<()> {
        self.entries
            .write_rows(&chunk_key(scope, statement_id, index), rows)
            .await
    }

    pub async fn get_chunk(&self, scope: &str, statement_id: &str, index: usize) -> CoreResult<Option<Vec<Row>>> {
        self.entries.read_rows(&chunk_key(scope, statement_id, index)).await
    }

    /// Removes the meta entry, then the chunk range implied by its row count.
    ///
    /// Without a recorded row count only chunk 0 is removed; later chunks expire by TTL.
    pub async fn invalidate_statement(&self, scope: &str, statement_id: &str) -> CoreResult<usize> {
        let key = meta_key(scope, statement_id);
        let meta: Option<StatementMeta> = self.entries.read_json(&key).await?;
        self.entries.delete(&key).await?;

        let chunks = meta
            .and_then(|m| m.page_count())
            .map_or(1, |count| count as usize);
        for index in 0..chunks {
            self.entries.delete(&chunk_key(scope, statement_id, index)).await?;
        }

        debug!(statement_id, chunks, "Invalidated statement");
        Ok(chunks)
    }
}
