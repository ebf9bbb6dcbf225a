//! Materializes a sorted/filtered view of a statement's cached rows.

use std::time::Instant;
use tracing::{debug, info, warn};

use rowcache_core::{CoreError, CoreResult, Row, StatementMeta, ViewConfig, ViewMeta};
use rowcache_query::{matches, ColumnIndex, ParsedModels, RowComparator};
use rowcache_storage::{ResultCache, ViewCache};

use crate::metrics::PAGES_STORED_TOTAL;
use crate::pager::{wait_for_page, BasePages, PageSource, WaitPolicy};

/// Result of a build attempt.
#[derive(Debug)]
pub(crate) enum BuildOutcome {
    Built { meta: ViewMeta, elapsed_secs: f64 },
    /// The scan cap was hit while the base row count was still unknown.
    ScanCapped { pages_scanned: usize },
    /// The base row count is known but some of its pages are not cached yet.
    Incomplete { pages_scanned: usize, expected_pages: usize },
}

pub(crate) struct ViewBuilder<'a> {
    pub results: &'a ResultCache,
    pub views: &'a ViewCache,
    pub config: &'a ViewConfig,
    pub scope: &'a str,
    /// Bounded wait for the first missing page of a base with a known row count.
    pub wait: Option<WaitPolicy>,
}

impl ViewBuilder<'_> {
    pub async fn build(&self, base: &StatementMeta, sig: &str, models: &ParsedModels) -> CoreResult<BuildOutcome> {
        let started = Instant::now();
        let statement_id = base.statement_id.as_str();
        let columns = ColumnIndex::new(&base.columns);
        let source = BasePages {
            cache: self.results,
            scope: self.scope,
            statement_id,
        };

        let mut expected_pages = base.page_count().map(|count| count as usize);
        let mut wait = self.wait;
        let mut matched: Vec<Row> = Vec::new();
        let mut scanned = 0usize;

        loop {
            let scan_limit = expected_pages.unwrap_or(self.config.max_scan_pages);
            while scanned < scan_limit {
                let page = match source.page(scanned).await? {
                    Some(rows) => Some(rows),
                    None => match (expected_pages, wait.take()) {
                        (Some(_), Some(policy)) => wait_for_page(&source, scanned, policy).await?,
                        _ => None,
                    },
                };
                let Some(rows) = page else {
                    break;
                };
                matched.extend(rows.into_iter().filter(|row| matches(row, &models.filter, &columns)));
                scanned += 1;

                if self.config.build_log_every > 0 && scanned % self.config.build_log_every == 0 {
                    debug!(statement_id, sig, pages = scanned, matched = matched.len(), "View scan progress");
                }
            }

            if expected_pages.is_some() || scanned < scan_limit {
                break;
            }

            // Cap reached with an unknown total: the stream may have reported it meanwhile
            let total_pages = self
                .results
                .get_meta(self.scope, statement_id)
                .await?
                .and_then(|m| m.page_count())
                .map(|count| count as usize);
            match total_pages {
                Some(pages) => expected_pages = Some(pages),
                None => {
                    warn!(statement_id, sig, pages = scanned, "View scan cap reached with unknown row count");
                    return Ok(BuildOutcome::ScanCapped { pages_scanned: scanned });
                }
            }
        }

        if let Some(expected) = expected_pages {
            if scanned < expected {
                warn!(statement_id, sig, pages = scanned, expected, "Base pages missing, view not stored");
                return Ok(BuildOutcome::Incomplete {
                    pages_scanned: scanned,
                    expected_pages: expected,
                });
            }
        }

        let comparator = RowComparator::build(&models.sort, &columns);
        if !comparator.is_empty() {
            matched = comparator.sort_rows(matched);
        }

        let page_size = base.page_size.max(1);
        let mut chunk_count = 0usize;
        for (index, page) in matched.chunks(page_size).enumerate() {
            self.views
                .put_chunk(self.scope, statement_id, sig, index, page)
                .await
                .map_err(|e| CoreError::storage(format!("view {sig} page {index}"), e))?;
            PAGES_STORED_TOTAL.with_label_values(&["view"]).inc();
            chunk_count += 1;
        }

        // Meta last: a visible view always has every page
        let meta = ViewMeta::new(statement_id, sig, page_size, matched.len() as u64, chunk_count);
        let meta = self
            .views
            .put_meta(self.scope, statement_id, sig, &meta)
            .await
            .map_err(|e| CoreError::storage(format!("view {sig} meta"), e))?;

        let elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            statement_id,
            sig,
            pages_scanned = scanned,
            rows = matched.len(),
            chunks = chunk_count,
            elapsed_ms = (elapsed_secs * 1000.0) as u64,
            "Built view"
        );
        Ok(BuildOutcome::Built { meta, elapsed_secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use rowcache_core::{CacheConfig, CellValue, MetaUpdate, StatementState};
    use rowcache_query::parse;
    use rowcache_storage::{KvStore, MemoryKvStore};
    use std::sync::Arc;
    use std::time::Duration;

    /// Memory store that refuses writes under view keys.
    struct ReadOnlyViews(MemoryKvStore);

    #[async_trait]
    impl KvStore for ReadOnlyViews {
        async fn get(&self, key: &str) -> CoreResult<Option<Bytes>> {
            self.0.get(key).await
        }

        async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> CoreResult<()> {
            if key.contains(":view:") {
                return Err(CoreError::StorageError("read-only".into()));
            }
            self.0.set_with_ttl(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> CoreResult<()> {
            self.0.delete(key).await
        }

        async fn exists(&self, key: &str) -> CoreResult<bool> {
            self.0.exists(key).await
        }
    }

    #[tokio::test]
    async fn test_view_write_failure_names_the_page() {
        let store: Arc<dyn KvStore> = Arc::new(ReadOnlyViews(MemoryKvStore::new(100)));
        let config = CacheConfig::default();
        let results = ResultCache::new(Arc::clone(&store), &config);
        let views = ViewCache::new(store, &config);

        let columns = vec!["id".to_string()];
        let base = results
            .put_meta(
                "u1",
                "s1",
                MetaUpdate {
                    page_size: Some(2),
                    row_count: Some(3),
                    columns: Some(columns.clone()),
                    schema: None,
                    state: Some(StatementState::Succeeded),
                },
            )
            .await
            .unwrap();
        results.put_chunk("u1", "s1", 0, &[vec![CellValue::Int(1)], vec![CellValue::Int(2)]]).await.unwrap();
        results.put_chunk("u1", "s1", 1, &[vec![CellValue::Int(3)]]).await.unwrap();

        let builder = ViewBuilder {
            results: &results,
            views: &views,
            config: &ViewConfig::default(),
            scope: "u1",
            wait: None,
        };
        let models = parse(Some(r#"[{"colId":"id","sort":"desc"}]"#), None, Some(columns.as_slice()));
        let err = builder.build(&base, "abc", &models).await.unwrap_err();

        assert!(matches!(err, CoreError::StorageError(_)));
        assert_eq!(err.to_string(), "storage error: view abc page 0: read-only");
    }

    #[tokio::test]
    async fn test_missing_page_of_known_total_is_not_stored() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new(100));
        let config = CacheConfig::default();
        let results = ResultCache::new(Arc::clone(&store), &config);
        let views = ViewCache::new(store, &config);

        let columns = vec!["id".to_string()];
        let base = results
            .put_meta(
                "u1",
                "s1",
                MetaUpdate {
                    page_size: Some(2),
                    row_count: Some(5),
                    columns: Some(columns.clone()),
                    schema: None,
                    state: Some(StatementState::Succeeded),
                },
            )
            .await
            .unwrap();
        results.put_chunk("u1", "s1", 0, &[vec![CellValue::Int(1)], vec![CellValue::Int(2)]]).await.unwrap();

        let builder = ViewBuilder {
            results: &results,
            views: &views,
            config: &ViewConfig::default(),
            scope: "u1",
            wait: Some(WaitPolicy {
                max_wait: Duration::from_millis(20),
                poll_interval: Duration::from_millis(5),
            }),
        };
        let models = parse(Some(r#"[{"colId":"id","sort":"desc"}]"#), None, Some(columns.as_slice()));
        let outcome = builder.build(&base, "abc", &models).await.unwrap();

        assert!(matches!(
            outcome,
            BuildOutcome::Incomplete {
                pages_scanned: 1,
                expected_pages: 3
            }
        ));
        assert!(!views.exists("u1", "s1", "abc").await.unwrap());
    }
}
