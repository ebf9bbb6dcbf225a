//! Statement lifecycle against the remote engine: submit, schema, and chunk streaming.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use rowcache_core::{ColumnMeta, CoreResult, Row, StatementState};

use crate::api::StatementApi;
use crate::decode::{decode_inline, decode_payload};
use crate::error::{UpstreamError, UpstreamResult};
use crate::supervisor::StreamSupervisor;
use crate::wire::{self, ChunkSource, StatusSnapshot};

/// One delivery to a [`ChunkListener`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkEvent {
    /// `None` for a meta-only update carrying the latest totals and state.
    pub chunk_index: Option<usize>,
    pub rows: Vec<Row>,
    pub total_rows: Option<u64>,
    pub state: Option<StatementState>,
}

impl ChunkEvent {
    pub fn is_meta_only(&self) -> bool {
        self.chunk_index.is_none()
    }
}

/// Receives streaming progress for one statement.
///
/// Calls are sequential. An error from the listener stops the stream.
#[async_trait]
pub trait ChunkListener: Send + Sync {
    async fn on_chunk(&self, event: ChunkEvent) -> CoreResult<()>;

    /// Called once after the last delivery, however the stream ended.
    async fn on_finished(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// Ordered column names plus their schema entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaInfo {
    pub columns: Vec<String>,
    pub schema: Vec<ColumnMeta>,
}

/// Drives statements through the remote engine.
#[derive(Clone)]
pub struct UpstreamClient {
    api: Arc<dyn StatementApi>,
    poll_interval: Duration,
    supervisor: StreamSupervisor,
}

impl UpstreamClient {
    pub fn new(api: Arc<dyn StatementApi>, poll_interval: Duration) -> Self {
        Self {
            api,
            poll_interval,
            supervisor: StreamSupervisor::new(),
        }
    }

    /// Submits `sql` and returns the engine's statement id.
    pub async fn submit(&self, sql: &str) -> UpstreamResult<String> {
        let response = self.api.submit_statement(sql).await?;
        let statement_id = wire::statement_id(&response).ok_or(UpstreamError::MissingStatementId)?;
        debug!(statement_id = %statement_id, "Submitted statement");
        Ok(statement_id)
    }

    /// Column names and metadata ordered by position; empty when no schema is reported yet.
    pub async fn get_schema(&self, statement_id: &str) -> UpstreamResult<SchemaInfo> {
        let status = self.api.fetch_status(statement_id).await?;
        let (columns, schema) = wire::schema(&status);
        Ok(SchemaInfo { columns, schema })
    }

    /// True while a stream task for `statement_id` is running.
    pub fn is_streaming(&self, statement_id: &str) -> bool {
        self.supervisor.is_active(statement_id)
    }

    /// Number of stream tasks still running.
    pub fn active_streams(&self) -> usize {
        self.supervisor.active_count()
    }

    /// Starts polling `statement_id` in the background and pushes progress to `listener`.
    ///
    /// Returns `false` if a stream for this statement is already running.
    pub fn stream_chunks(&self, statement_id: &str, page_size: usize, listener: Arc<dyn ChunkListener>) -> bool {
        let client = self.clone();
        let id = statement_id.to_string();
        self.supervisor.spawn(statement_id, async move {
            if let Err(e) = client.run_stream(&id, page_size, listener.as_ref()).await {
                error!(statement_id = %id, error = %e, "Statement stream aborted");
            }
            if let Err(e) = listener.on_finished().await {
                error!(statement_id = %id, error = %e, "Stream completion handler failed");
            }
        })
    }

    async fn run_stream(&self, statement_id: &str, page_size: usize, listener: &dyn ChunkListener) -> CoreResult<()> {
        let mut reported: Option<(Option<StatementState>, Option<u64>)> = None;

        loop {
            let status = self.api.fetch_status(statement_id).await?;
            if status.is_null() {
                warn!(statement_id, "Empty status response");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let snapshot = wire::status_snapshot(&status);
            let current = (snapshot.state.clone(), snapshot.total_rows);
            if reported.as_ref() != Some(&current) {
                listener
                    .on_chunk(ChunkEvent {
                        chunk_index: None,
                        rows: Vec::new(),
                        total_rows: snapshot.total_rows,
                        state: snapshot.state.clone(),
                    })
                    .await?;
                reported = Some(current);
            }

            match &snapshot.state {
                Some(state) if state.is_terminal() => {
                    info!(statement_id, state = %state, total_rows = ?snapshot.total_rows, "Statement reached terminal state");
                    if *state == StatementState::Succeeded {
                        self.deliver_rows(statement_id, page_size, &status, &snapshot, listener)
                            .await?;
                    }
                    return Ok(());
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    async fn deliver_rows(
        &self,
        statement_id: &str,
        page_size: usize,
        status: &Value,
        snapshot: &StatusSnapshot,
        listener: &dyn ChunkListener,
    ) -> CoreResult<()> {
        let deliver = |chunk_index: usize, rows: Vec<Row>| ChunkEvent {
            chunk_index: Some(chunk_index),
            rows,
            total_rows: snapshot.total_rows,
            state: snapshot.state.clone(),
        };

        let links = wire::external_links(status);
        if !links.is_empty() {
            for link in links {
                let rows = self.download_rows(&link.url, link.chunk_index).await;
                if !rows.is_empty() {
                    listener.on_chunk(deliver(link.chunk_index, rows)).await?;
                }
            }
            return Ok(());
        }

        let chunk_count = snapshot.total_chunks.filter(|c| *c > 0).unwrap_or(1) as usize;
        for chunk_index in 0..chunk_count {
            match self.fetch_chunk_rows(statement_id, chunk_index, page_size).await {
                Ok(rows) if !rows.is_empty() => listener.on_chunk(deliver(chunk_index, rows)).await?,
                Ok(_) => debug!(statement_id, chunk_index, "Empty chunk"),
                Err(e) => warn!(statement_id, chunk_index, error = %e, "Skipping chunk after fetch failure"),
            }
        }
        Ok(())
    }

    /// Rows of one indexed chunk, from the first source in the response that yields any.
    pub async fn fetch_chunk_rows(&self, statement_id: &str, chunk_index: usize, page_size: usize) -> UpstreamResult<Vec<Row>> {
        let response = self.api.fetch_chunk(statement_id, chunk_index, page_size).await?;

        for source in wire::chunk_sources(&response) {
            let rows = match source {
                ChunkSource::Inline(items) => decode_inline(items).unwrap_or_else(|e| {
                    warn!(statement_id, chunk_index, error = %e, "Undecodable inline rows");
                    Vec::new()
                }),
                ChunkSource::Link(url) => self.download_rows(&url, chunk_index).await,
            };
            if !rows.is_empty() {
                debug!(statement_id, chunk_index, rows = rows.len(), "Fetched chunk");
                return Ok(rows);
            }
        }
        Ok(Vec::new())
    }

    /// Downloads and decodes an external link; failures are logged and yield no rows.
    async fn download_rows(&self, url: &str, chunk_index: usize) -> Vec<Row> {
        let payload = match self.api.download_link(url).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(chunk_index, error = %e, "External link download failed");
                return Vec::new();
            }
        };

        match decode_payload(&payload) {
            Ok(rows) => {
                debug!(chunk_index, rows = rows.len(), "Downloaded external link");
                rows
            }
            Err(e) => {
                warn!(chunk_index, error = %e, "Unexpected external link content");
                Vec::new()
            }
        }
    }
}
