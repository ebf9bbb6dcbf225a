//! Report orchestration: submission, paging, and on-demand views.

use std::sync::Arc;
use tracing::{debug, info, warn};

use rowcache_core::{
    CoreResult, MetaUpdate, PagerConfig, RowcacheConfig, RowsPage, StatementMeta, StatementState,
    ViewConfig, ViewMeta,
};
use rowcache_query::parse;
use rowcache_storage::{KvStore, LookupCache, ResultCache, ViewCache};
use rowcache_upstream::UpstreamClient;

use crate::metrics::{ServiceStats, StatsSnapshot};
use crate::page_writer::PageWriter;
use crate::pager::{read_slice, BasePages, ViewPages, WaitPolicy};
use crate::view_builder::{BuildOutcome, ViewBuilder};

/// Serves statement results out of the cache for one caller scope.
///
/// Cloning is cheap; [`ReportService::scoped`] yields a service sharing the same caches,
/// upstream client and stats under a different key prefix.
#[derive(Clone)]
pub struct ReportService {
    scope: String,
    page_size: usize,
    pager: PagerConfig,
    view: ViewConfig,
    results: ResultCache,
    views: ViewCache,
    lookups: LookupCache,
    upstream: UpstreamClient,
    stats: Arc<ServiceStats>,
}

impl ReportService {
    pub fn new(store: Arc<dyn KvStore>, upstream: UpstreamClient, config: &RowcacheConfig) -> Self {
        Self {
            scope: config.cache.scope.clone(),
            page_size: config.cache.page_size.max(1),
            pager: config.pager.clone(),
            view: config.view.clone(),
            results: ResultCache::new(Arc::clone(&store), &config.cache),
            views: ViewCache::new(Arc::clone(&store), &config.cache),
            lookups: LookupCache::new(store),
            upstream,
            stats: Arc::new(ServiceStats::default()),
        }
    }

    /// Same service under another cache scope.
    pub fn scoped(&self, scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..self.clone()
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            active_streams: self.upstream.active_streams(),
            ..self.stats.snapshot()
        }
    }

    /// Best-effort JSON cache over the same store, for small lookup results.
    pub fn lookups(&self) -> &LookupCache {
        &self.lookups
    }

    /// True while rows for `statement_id` are still being streamed into the cache.
    pub fn is_streaming(&self, statement_id: &str) -> bool {
        self.upstream.is_streaming(statement_id)
    }

    /// Submits `sql`, records initial meta, and starts streaming rows into the cache.
    ///
    /// Returns once the statement id and schema are known; rows arrive in the background.
    pub async fn submit(&self, sql: &str) -> CoreResult<String> {
        let statement_id = self.upstream.submit(sql).await?;
        let schema = self.upstream.get_schema(&statement_id).await?;

        self.results
            .put_meta(
                &self.scope,
                &statement_id,
                MetaUpdate {
                    page_size: Some(self.page_size),
                    row_count: None,
                    columns: Some(schema.columns),
                    schema: Some(schema.schema),
                    state: Some(StatementState::Pending),
                },
            )
            .await?;

        let writer = PageWriter::new(self.results.clone(), &self.scope, &statement_id, self.page_size);
        self.upstream
            .stream_chunks(&statement_id, self.page_size, Arc::new(writer));

        self.stats.record_submit();
        info!(statement_id = %statement_id, scope = %self.scope, "Statement submitted");
        Ok(statement_id)
    }

    /// Stored meta, or a pending placeholder when none exists.
    pub async fn statement_meta(&self, statement_id: &str) -> CoreResult<StatementMeta> {
        Ok(self
            .results
            .get_meta(&self.scope, statement_id)
            .await?
            .unwrap_or_else(|| StatementMeta::pending(statement_id)))
    }

    /// Rows `[start, end)` of the base result.
    ///
    /// Waits a bounded time for the first page that is not cached yet. An empty page with an
    /// unknown total means the rows are not available yet.
    pub async fn get_rows(&self, statement_id: &str, start: u64, end: u64) -> CoreResult<RowsPage> {
        let Some(meta) = self.results.get_meta(&self.scope, statement_id).await? else {
            return Ok(RowsPage::empty(None));
        };
        self.page_base(&meta, start, end, self.wait_policy(&meta)).await
    }

    /// Rows `[start, end)` after applying the sort/filter payloads.
    ///
    /// The first request for a given sort/filter combination builds the view; later ones read
    /// it from the cache. Payloads that parse to nothing fall back to [`Self::get_rows`].
    pub async fn get_rows_with_models(
        &self,
        statement_id: &str,
        start: u64,
        end: u64,
        sort_json: Option<&str>,
        filter_json: Option<&str>,
    ) -> CoreResult<RowsPage> {
        let Some(meta) = self.results.get_meta(&self.scope, statement_id).await? else {
            return Ok(RowsPage::empty(None));
        };

        let models = parse(sort_json, filter_json, Some(meta.columns.as_slice()));
        if models.is_empty() {
            return self.page_base(&meta, start, end, self.wait_policy(&meta)).await;
        }

        let sig = ViewCache::compute_signature(
            statement_id,
            Some(models.canonical_sort_json.as_str()),
            Some(models.canonical_filter_json.as_str()),
        );

        if let Some(view) = self.views.get_meta(&self.scope, statement_id, &sig).await? {
            self.stats.record_view_hit();
            debug!(statement_id, sig = %sig, "View cache hit");
            return self.page_view(&view, start, end).await;
        }

        let builder = ViewBuilder {
            results: &self.results,
            views: &self.views,
            config: &self.view,
            scope: &self.scope,
            wait: self.wait_policy(&meta),
        };
        match builder.build(&meta, &sig, &models).await? {
            BuildOutcome::Built { meta: view, elapsed_secs } => {
                self.stats.record_view_build(elapsed_secs);
                self.page_view(&view, start, end).await
            }
            BuildOutcome::ScanCapped { pages_scanned } => {
                self.stats.record_view_fallback();
                warn!(statement_id, sig = %sig, pages_scanned, "Serving unsorted, unfiltered rows");
                let meta = self.statement_meta(statement_id).await?;
                self.page_base(&meta, start, end, self.wait_policy(&meta)).await
            }
            BuildOutcome::Incomplete { pages_scanned, expected_pages } => {
                self.stats.record_view_fallback();
                warn!(statement_id, sig = %sig, pages_scanned, expected_pages, "Serving unsorted, unfiltered rows");
                // The builder already spent the wait budget
                self.page_base(&meta, start, end, None).await
            }
        }
    }

    /// Removes the base meta and the pages its row count accounts for.
    pub async fn evict(&self, statement_id: &str) -> CoreResult<usize> {
        let removed = self
            .results
            .invalidate_statement(&self.scope, statement_id)
            .await?;
        info!(statement_id, pages = removed, "Evicted statement");
        Ok(removed)
    }

    /// Rows never arrive for a statement that ended without success.
    fn wait_policy(&self, meta: &StatementMeta) -> Option<WaitPolicy> {
        (!meta.state.is_terminal() || meta.state == StatementState::Succeeded)
            .then(|| WaitPolicy::from_config(&self.pager))
    }

    async fn page_base(
        &self,
        meta: &StatementMeta,
        start: u64,
        end: u64,
        wait: Option<WaitPolicy>,
    ) -> CoreResult<RowsPage> {
        let statement_id = meta.statement_id.as_str();
        let source = BasePages {
            cache: &self.results,
            scope: &self.scope,
            statement_id,
        };

        let page_size = if meta.page_size == 0 { self.page_size } else { meta.page_size };
        let slice = read_slice(&source, start, end, page_size, meta.row_count, wait).await?;
        if slice.timed_out {
            self.stats.record_wait_timeout();
            debug!(statement_id, start, end, rows = slice.rows.len(), "Page wait expired");
        }

        let last_row = match meta.row_count {
            Some(rc) => Some(rc),
            None => self
                .results
                .get_meta(&self.scope, statement_id)
                .await?
                .and_then(|m| m.row_count),
        };
        Ok(RowsPage::new(slice.rows, last_row))
    }

    async fn page_view(&self, view: &ViewMeta, start: u64, end: u64) -> CoreResult<RowsPage> {
        let source = ViewPages {
            cache: &self.views,
            scope: &self.scope,
            statement_id: &view.base_statement_id,
            sig: &view.sig,
        };
        let slice = read_slice(&source, start, end, view.page_size, view.row_count, None).await?;
        Ok(RowsPage::new(slice.rows, view.row_count))
    }
}
