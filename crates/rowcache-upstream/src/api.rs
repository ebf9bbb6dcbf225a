use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::UpstreamResult;

/// Raw calls against the remote statement engine.
///
/// Implementations return response bodies untouched; [`crate::UpstreamClient`] interprets them.
#[async_trait]
pub trait StatementApi: Send + Sync {
    /// Submit SQL for asynchronous execution. Returns the submission response.
    async fn submit_statement(&self, sql: &str) -> UpstreamResult<Value>;

    /// Current status, manifest and result block of a statement.
    async fn fetch_status(&self, statement_id: &str) -> UpstreamResult<Value>;

    /// One indexed result chunk.
    async fn fetch_chunk(&self, statement_id: &str, chunk_index: usize, row_limit: usize) -> UpstreamResult<Value>;

    /// Download a pre-signed external link. Returns the raw (possibly gzipped) body.
    async fn download_link(&self, url: &str) -> UpstreamResult<Bytes>;
}
