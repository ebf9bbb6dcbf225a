//! Stream listener that re-pages upstream chunks into the base result cache.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use rowcache_core::{CoreError, CoreResult, MetaUpdate, Row};
use rowcache_storage::ResultCache;
use rowcache_upstream::{ChunkEvent, ChunkListener};

use crate::metrics::PAGES_STORED_TOTAL;

#[derive(Default)]
struct Pending {
    rows: Vec<Row>,
    next_page: usize,
}

/// Writes delivered rows as contiguous pages of exactly `page_size` rows.
///
/// Upstream chunk boundaries are ignored: rows left over from one chunk are carried into
/// the next page, and the final short page is written when the stream finishes.
pub(crate) struct PageWriter {
    results: ResultCache,
    scope: String,
    statement_id: String,
    page_size: usize,
    pending: Mutex<Pending>,
}

impl PageWriter {
    pub fn new(results: ResultCache, scope: &str, statement_id: &str, page_size: usize) -> Self {
        Self {
            results,
            scope: scope.to_string(),
            statement_id: statement_id.to_string(),
            page_size: page_size.max(1),
            pending: Mutex::new(Pending::default()),
        }
    }

    async fn write_page(&self, index: usize, rows: &[Row]) -> CoreResult<()> {
        self.results
            .put_chunk(&self.scope, &self.statement_id, index, rows)
            .await
            .map_err(|e| CoreError::storage(format!("statement {} page {index}", self.statement_id), e))?;
        PAGES_STORED_TOTAL.with_label_values(&["base"]).inc();
        debug!(statement_id = %self.statement_id, page = index, rows = rows.len(), "Stored page");
        Ok(())
    }
}

#[async_trait]
impl ChunkListener for PageWriter {
    async fn on_chunk(&self, event: ChunkEvent) -> CoreResult<()> {
        if event.is_meta_only() {
            let mut update = MetaUpdate::default().with_row_count(event.total_rows);
            update.state = event.state;
            if let Err(e) = self
                .results
                .put_meta(&self.scope, &self.statement_id, update)
                .await
            {
                warn!(statement_id = %self.statement_id, error = %e, "Failed to update statement meta");
            }
            return Ok(());
        }

        let mut pending = self.pending.lock().await;
        pending.rows.extend(event.rows);
        while pending.rows.len() >= self.page_size {
            let page: Vec<Row> = pending.rows.drain(..self.page_size).collect();
            let index = pending.next_page;
            self.write_page(index, &page).await?;
            pending.next_page += 1;
        }
        Ok(())
    }

    async fn on_finished(&self) -> CoreResult<()> {
        let mut pending = self.pending.lock().await;
        if pending.rows.is_empty() {
            return Ok(());
        }
        let page = std::mem::take(&mut pending.rows);
        let index = pending.next_page;
        self.write_page(index, &page).await?;
        pending.next_page += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcache_core::{CacheConfig, CellValue, StatementState};
    use rowcache_storage::MemoryKvStore;
    use std::sync::Arc;

    fn rows(range: std::ops::Range<i64>) -> Vec<Row> {
        range.map(|i| vec![CellValue::Int(i)]).collect()
    }

    fn chunk(index: usize, rows: Vec<Row>) -> ChunkEvent {
        ChunkEvent {
            chunk_index: Some(index),
            rows,
            total_rows: Some(10),
            state: Some(StatementState::Succeeded),
        }
    }

    #[tokio::test]
    async fn test_chunks_are_repaged() {
        let cache = ResultCache::new(Arc::new(MemoryKvStore::new(100)), &CacheConfig::default());
        let writer = PageWriter::new(cache.clone(), "u1", "s1", 4);

        writer
            .on_chunk(ChunkEvent {
                chunk_index: None,
                rows: Vec::new(),
                total_rows: Some(10),
                state: Some(StatementState::Succeeded),
            })
            .await
            .unwrap();
        writer.on_chunk(chunk(0, rows(0..3))).await.unwrap();
        writer.on_chunk(chunk(1, rows(3..9))).await.unwrap();
        assert!(cache.get_chunk("u1", "s1", 2).await.unwrap().is_none());

        writer.on_chunk(chunk(2, rows(9..10))).await.unwrap();
        writer.on_finished().await.unwrap();

        assert_eq!(cache.get_chunk("u1", "s1", 0).await.unwrap(), Some(rows(0..4)));
        assert_eq!(cache.get_chunk("u1", "s1", 1).await.unwrap(), Some(rows(4..8)));
        assert_eq!(cache.get_chunk("u1", "s1", 2).await.unwrap(), Some(rows(8..10)));

        let meta = cache.get_meta("u1", "s1").await.unwrap().unwrap();
        assert_eq!(meta.row_count, Some(10));
        assert_eq!(meta.state, StatementState::Succeeded);
    }
}
