//! Scripted statement engine for tests
//!
//! Status responses are served in the order they were pushed; the last one repeats
//! once the script runs out. Chunk and link responses are looked up by index and URL.
//!
//! ```rust
//! use rowcache_upstream::mock::{status_body, MockStatementApi};
//!
//! let api = MockStatementApi::new("stmt-1");
//! api.push_status(status_body("RUNNING", None, None, &["id", "amount"]));
//! api.push_status(status_body("SUCCEEDED", Some(2), Some(1), &["id", "amount"]));
//! api.set_chunk(0, serde_json::json!({"data_array": [[1, 10], [2, 20]]}));
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};

use crate::api::StatementApi;
use crate::error::{UpstreamError, UpstreamResult};

/// Kind of call recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOperation {
    Submit,
    Status,
    Chunk,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: MockOperation,
    /// SQL, statement id, `"{id}/{index}"` or URL depending on the operation.
    pub target: String,
}

#[derive(Debug, Clone)]
enum Scripted<T> {
    Ok(T),
    Fail(u16),
}

#[derive(Default)]
struct MockState {
    statement_id: Option<String>,
    statuses: VecDeque<Scripted<Value>>,
    chunks: HashMap<usize, Scripted<Value>>,
    links: HashMap<String, Scripted<Bytes>>,
    calls: Vec<MockCall>,
}

pub struct MockStatementApi {
    state: Mutex<MockState>,
}

impl MockStatementApi {
    /// Engine that answers submissions with `statement_id`.
    pub fn new(statement_id: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MockState {
                statement_id: Some(statement_id.into()),
                ..MockState::default()
            }),
        }
    }

    /// Engine whose submission response carries no statement id.
    pub fn without_statement_id() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn push_status(&self, status: Value) {
        self.state.lock().statuses.push_back(Scripted::Ok(status));
    }

    pub fn push_status_failure(&self, http_status: u16) {
        self.state.lock().statuses.push_back(Scripted::Fail(http_status));
    }

    pub fn set_chunk(&self, chunk_index: usize, response: Value) {
        self.state.lock().chunks.insert(chunk_index, Scripted::Ok(response));
    }

    pub fn fail_chunk(&self, chunk_index: usize, http_status: u16) {
        self.state.lock().chunks.insert(chunk_index, Scripted::Fail(http_status));
    }

    pub fn set_link(&self, url: impl Into<String>, payload: impl Into<Bytes>) {
        self.state
            .lock()
            .links
            .insert(url.into(), Scripted::Ok(payload.into()));
    }

    pub fn fail_link(&self, url: impl Into<String>, http_status: u16) {
        self.state.lock().links.insert(url.into(), Scripted::Fail(http_status));
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: MockOperation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn record(state: &mut MockState, operation: MockOperation, target: String) {
        state.calls.push(MockCall { operation, target });
    }
}

fn http_error(status: u16, path: String) -> UpstreamError {
    UpstreamError::Http {
        status,
        path,
        body: "scripted failure".to_string(),
    }
}

#[async_trait]
impl StatementApi for MockStatementApi {
    async fn submit_statement(&self, sql: &str) -> UpstreamResult<Value> {
        let mut state = self.state.lock();
        Self::record(&mut state, MockOperation::Submit, sql.to_string());
        Ok(match &state.statement_id {
            Some(id) => json!({"statement_id": id, "status": {"state": "PENDING"}}),
            None => json!({"status": {"state": "PENDING"}}),
        })
    }

    async fn fetch_status(&self, statement_id: &str) -> UpstreamResult<Value> {
        let mut state = self.state.lock();
        Self::record(&mut state, MockOperation::Status, statement_id.to_string());

        let scripted = if state.statuses.len() > 1 {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        };
        match scripted {
            Some(Scripted::Ok(status)) => Ok(status),
            Some(Scripted::Fail(code)) => Err(http_error(code, format!("status/{statement_id}"))),
            None => Ok(json!({"statement_id": statement_id, "status": {"state": "PENDING"}})),
        }
    }

    async fn fetch_chunk(&self, statement_id: &str, chunk_index: usize, _row_limit: usize) -> UpstreamResult<Value> {
        let mut state = self.state.lock();
        let target = format!("{statement_id}/{chunk_index}");
        Self::record(&mut state, MockOperation::Chunk, target.clone());

        match state.chunks.get(&chunk_index) {
            Some(Scripted::Ok(response)) => Ok(response.clone()),
            Some(Scripted::Fail(code)) => Err(http_error(*code, target)),
            None => Ok(json!({})),
        }
    }

    async fn download_link(&self, url: &str) -> UpstreamResult<Bytes> {
        let mut state = self.state.lock();
        Self::record(&mut state, MockOperation::Download, url.to_string());

        match state.links.get(url) {
            Some(Scripted::Ok(payload)) => Ok(payload.clone()),
            Some(Scripted::Fail(code)) => Err(http_error(*code, url.to_string())),
            None => Err(http_error(404, url.to_string())),
        }
    }
}

/// A status response with manifest totals and a schema listing `columns` in order.
pub fn status_body(state: &str, total_rows: Option<u64>, total_chunks: Option<u64>, columns: &[&str]) -> Value {
    let columns: Vec<Value> = columns
        .iter()
        .enumerate()
        .map(|(position, name)| json!({"name": name, "position": position, "type_name": "STRING"}))
        .collect();

    let mut manifest = json!({"schema": {"column_count": columns.len(), "columns": columns}});
    if let Some(rows) = total_rows {
        manifest["total_row_count"] = json!(rows);
    }
    if let Some(chunks) = total_chunks {
        manifest["total_chunk_count"] = json!(chunks);
    }

    json!({"status": {"state": state}, "manifest": manifest})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_status_repeats() {
        let api = MockStatementApi::new("s1");
        api.push_status(json!({"status": {"state": "RUNNING"}}));
        api.push_status(json!({"status": {"state": "SUCCEEDED"}}));

        assert_eq!(api.fetch_status("s1").await.unwrap()["status"]["state"], "RUNNING");
        assert_eq!(api.fetch_status("s1").await.unwrap()["status"]["state"], "SUCCEEDED");
        assert_eq!(api.fetch_status("s1").await.unwrap()["status"]["state"], "SUCCEEDED");
        assert_eq!(api.call_count(MockOperation::Status), 3);
    }

    #[tokio::test]
    async fn test_unknown_link_is_not_found() {
        let api = MockStatementApi::new("s1");
        assert!(matches!(
            api.download_link("https://files/missing").await,
            Err(UpstreamError::Http { status: 404, .. })
        ));
    }
}
