// Statement lifecycle tests against the scripted engine.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rowcache_core::{CellValue, CoreError, CoreResult, StatementState};
use rowcache_upstream::mock::{status_body, MockOperation, MockStatementApi};
use rowcache_upstream::{ChunkEvent, ChunkListener, UpstreamClient, UpstreamError};

const POLL: Duration = Duration::from_millis(5);

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<ChunkEvent>>,
    finished: AtomicBool,
    fail_on_rows: bool,
}

#[async_trait]
impl ChunkListener for RecordingListener {
    async fn on_chunk(&self, event: ChunkEvent) -> CoreResult<()> {
        let has_rows = !event.rows.is_empty();
        self.events.lock().push(event);
        if self.fail_on_rows && has_rows {
            return Err(CoreError::StorageError("store unavailable".into()));
        }
        Ok(())
    }

    async fn on_finished(&self) -> CoreResult<()> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl RecordingListener {
    async fn wait_finished(&self) {
        for _ in 0..400 {
            if self.finished.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("stream did not finish");
    }

    fn meta_events(&self) -> Vec<(Option<StatementState>, Option<u64>)> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.is_meta_only())
            .map(|e| (e.state.clone(), e.total_rows))
            .collect()
    }

    fn row_events(&self) -> Vec<(usize, usize)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| e.chunk_index.map(|i| (i, e.rows.len())))
            .collect()
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn test_submit_requires_statement_id() {
    let client = UpstreamClient::new(Arc::new(MockStatementApi::new("stmt-1")), POLL);
    assert_eq!(client.submit("SELECT 1").await.unwrap(), "stmt-1");

    let client = UpstreamClient::new(Arc::new(MockStatementApi::without_statement_id()), POLL);
    assert!(matches!(
        client.submit("SELECT 1").await,
        Err(UpstreamError::MissingStatementId)
    ));
}

#[tokio::test]
async fn test_schema_is_empty_until_reported() {
    let api = Arc::new(MockStatementApi::new("stmt-1"));
    api.push_status(json!({"status": {"state": "PENDING"}}));
    api.push_status(status_body("RUNNING", None, None, &["customer", "amount"]));
    let client = UpstreamClient::new(api, POLL);

    assert!(client.get_schema("stmt-1").await.unwrap().columns.is_empty());
    assert_eq!(
        client.get_schema("stmt-1").await.unwrap().columns,
        vec!["customer", "amount"]
    );
}

#[tokio::test]
async fn test_stream_fetches_indexed_chunks_and_skips_failures() {
    let api = Arc::new(MockStatementApi::new("stmt-1"));
    api.push_status(status_body("PENDING", None, None, &["id"]));
    api.push_status(status_body("RUNNING", None, None, &["id"]));
    api.push_status(status_body("RUNNING", None, None, &["id"]));
    api.push_status(status_body("SUCCEEDED", Some(5), Some(3), &["id"]));
    api.set_chunk(0, json!({"chunk": {"data_array": [[1], [2]]}}));
    api.fail_chunk(1, 500);
    api.set_chunk(2, json!({"data_array": [[5]]}));

    let client = UpstreamClient::new(api.clone(), POLL);
    let listener = Arc::new(RecordingListener::default());
    assert!(client.stream_chunks("stmt-1", 500, listener.clone()));
    listener.wait_finished().await;

    // Repeated RUNNING polls report once
    assert_eq!(
        listener.meta_events(),
        vec![
            (Some(StatementState::Pending), None),
            (Some(StatementState::Running), None),
            (Some(StatementState::Succeeded), Some(5)),
        ]
    );
    assert_eq!(listener.row_events(), vec![(0, 2), (2, 1)]);
    assert_eq!(api.call_count(MockOperation::Chunk), 3);

    let events = listener.events.lock();
    let last = events.last().unwrap();
    assert_eq!(last.rows, vec![vec![CellValue::Int(5)]]);
    assert_eq!(last.total_rows, Some(5));
}

#[tokio::test]
async fn test_stream_downloads_external_links() {
    let api = Arc::new(MockStatementApi::new("stmt-1"));
    let mut done = status_body("SUCCEEDED", Some(4), Some(4), &["customer", "amount"]);
    done["result"] = json!({"external_links": [
        {"chunk_index": 0, "external_link": "https://files/0"},
        {"chunk_index": 1, "external_link": "https://files/1"},
        {"chunk_index": 2, "external_link": "https://files/2"},
        {"chunk_index": 3, "external_link": "https://files/3"},
    ]});
    api.push_status(done);
    api.set_link("https://files/0", gzip(br#"[["Acme", 150]]"#));
    api.set_link("https://files/1", br#"[{"customer": "Globex", "amount": 250}]"#.to_vec());
    api.fail_link("https://files/2", 403);
    api.set_link("https://files/3", b"<html>expired</html>".to_vec());

    let client = UpstreamClient::new(api.clone(), POLL);
    let listener = Arc::new(RecordingListener::default());
    client.stream_chunks("stmt-1", 500, listener.clone());
    listener.wait_finished().await;

    assert_eq!(listener.row_events(), vec![(0, 1), (1, 1)]);
    assert_eq!(api.call_count(MockOperation::Download), 4);
    assert_eq!(api.call_count(MockOperation::Chunk), 0);

    let events = listener.events.lock();
    let globex = events.iter().find(|e| e.chunk_index == Some(1)).unwrap();
    assert_eq!(
        globex.rows,
        vec![vec![CellValue::Text("Globex".into()), CellValue::Int(250)]]
    );
}

#[tokio::test]
async fn test_failed_statement_delivers_no_rows() {
    let api = Arc::new(MockStatementApi::new("stmt-1"));
    api.push_status(status_body("FAILED", None, None, &[]));
    api.set_chunk(0, json!({"data_array": [[1]]}));

    let client = UpstreamClient::new(api.clone(), POLL);
    let listener = Arc::new(RecordingListener::default());
    client.stream_chunks("stmt-1", 500, listener.clone());
    listener.wait_finished().await;

    assert_eq!(listener.meta_events(), vec![(Some(StatementState::Failed), None)]);
    assert!(listener.row_events().is_empty());
    assert_eq!(api.call_count(MockOperation::Chunk), 0);
}

#[tokio::test]
async fn test_poll_failure_aborts_stream() {
    let api = Arc::new(MockStatementApi::new("stmt-1"));
    api.push_status(status_body("RUNNING", None, None, &[]));
    api.push_status_failure(502);

    let client = UpstreamClient::new(api.clone(), POLL);
    let listener = Arc::new(RecordingListener::default());
    client.stream_chunks("stmt-1", 500, listener.clone());
    listener.wait_finished().await;

    assert_eq!(listener.meta_events(), vec![(Some(StatementState::Running), None)]);
    assert!(listener.row_events().is_empty());
    assert_eq!(api.call_count(MockOperation::Status), 2);
}

#[tokio::test]
async fn test_listener_error_stops_delivery() {
    let api = Arc::new(MockStatementApi::new("stmt-1"));
    api.push_status(status_body("SUCCEEDED", Some(2), Some(2), &["id"]));
    api.set_chunk(0, json!({"data_array": [[1]]}));
    api.set_chunk(1, json!({"data_array": [[2]]}));

    let client = UpstreamClient::new(api.clone(), POLL);
    let listener = Arc::new(RecordingListener {
        fail_on_rows: true,
        ..RecordingListener::default()
    });
    client.stream_chunks("stmt-1", 500, listener.clone());
    listener.wait_finished().await;

    assert_eq!(listener.row_events(), vec![(0, 1)]);
    assert_eq!(api.call_count(MockOperation::Chunk), 1);
}

#[tokio::test]
async fn test_second_stream_for_running_statement_is_ignored() {
    let api = Arc::new(MockStatementApi::new("stmt-1"));
    api.push_status(status_body("RUNNING", None, None, &[]));

    let client = UpstreamClient::new(api, Duration::from_millis(20));
    let first = Arc::new(RecordingListener::default());
    let second = Arc::new(RecordingListener::default());

    assert!(client.stream_chunks("stmt-1", 500, first));
    assert!(!client.stream_chunks("stmt-1", 500, second.clone()));
    assert!(client.is_streaming("stmt-1"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(second.events.lock().is_empty());
}
