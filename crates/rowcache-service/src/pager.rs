//! Offset pager over fixed-size cached pages.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use rowcache_core::{CoreResult, PagerConfig, Row};
use rowcache_storage::{ResultCache, ViewCache};

/// A 0-indexed sequence of pages. A missing page ends the sequence.
#[async_trait]
pub(crate) trait PageSource: Send + Sync {
    async fn page(&self, index: usize) -> CoreResult<Option<Vec<Row>>>;
}

pub(crate) struct BasePages<'a> {
    pub cache: &'a ResultCache,
    pub scope: &'a str,
    pub statement_id: &'a str,
}

#[async_trait]
impl PageSource for BasePages<'_> {
    async fn page(&self, index: usize) -> CoreResult<Option<Vec<Row>>> {
        self.cache.get_chunk(self.scope, self.statement_id, index).await
    }
}

pub(crate) struct ViewPages<'a> {
    pub cache: &'a ViewCache,
    pub scope: &'a str,
    pub statement_id: &'a str,
    pub sig: &'a str,
}

#[async_trait]
impl PageSource for ViewPages<'_> {
    async fn page(&self, index: usize) -> CoreResult<Option<Vec<Row>>> {
        self.cache
            .get_chunk(self.scope, self.statement_id, self.sig, index)
            .await
    }
}

/// The rows of `[start, end)` that could be collected.
#[derive(Debug, Default)]
pub(crate) struct Slice {
    pub rows: Vec<Row>,
    /// The bounded wait for a missing page expired.
    pub timed_out: bool,
}

/// How long to wait for the first page of a range that is not cached yet.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WaitPolicy {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub fn from_config(config: &PagerConfig) -> Self {
        Self {
            max_wait: config.max_wait(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Reads the rows `[start, end)` from `source`.
///
/// Pages are read in order until one is missing. With a `wait` policy the first missing page
/// is polled for until it appears or the deadline passes; later misses end the read at once.
pub(crate) async fn read_slice(
    source: &dyn PageSource,
    start: u64,
    end: u64,
    page_size: usize,
    row_count: Option<u64>,
    wait: Option<WaitPolicy>,
) -> CoreResult<Slice> {
    let end = row_count.map_or(end, |rc| end.min(rc));
    if end <= start || page_size == 0 {
        return Ok(Slice::default());
    }

    let page_size = page_size as u64;
    let first = start / page_size;
    let last = (end - 1) / page_size;

    let mut buffer: Vec<Row> = Vec::new();
    let mut wait = wait;
    let mut timed_out = false;
    for index in first..=last {
        let index = index as usize;
        let page = match source.page(index).await? {
            Some(rows) => Some(rows),
            None => match wait.take() {
                Some(policy) => {
                    let found = wait_for_page(source, index, policy).await?;
                    timed_out = found.is_none();
                    found
                }
                None => None,
            },
        };
        match page {
            Some(rows) => buffer.extend(rows),
            None => break,
        }
    }

    let offset = (start - first * page_size) as usize;
    let rows = buffer
        .into_iter()
        .skip(offset)
        .take((end - start) as usize)
        .collect();
    Ok(Slice { rows, timed_out })
}

/// Polls `source` for page `index` until it appears or the policy deadline passes.
pub(crate) async fn wait_for_page(source: &dyn PageSource, index: usize, policy: WaitPolicy) -> CoreResult<Option<Vec<Row>>> {
    let deadline = Instant::now() + policy.max_wait;
    debug!(page = index, max_wait_ms = policy.max_wait.as_millis() as u64, "Waiting for page");

    while Instant::now() < deadline {
        tokio::time::sleep(policy.poll_interval).await;
        if let Some(rows) = source.page(index).await? {
            return Ok(Some(rows));
        }
    }
    debug!(page = index, "Page did not arrive before deadline");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcache_core::CellValue;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Pages of consecutive integers; pages listed in `late` appear after `late_after` reads.
    struct FakePages {
        pages: HashMap<usize, Vec<Row>>,
        late: Vec<usize>,
        late_after: usize,
        reads: AtomicUsize,
    }

    impl FakePages {
        fn new(rows: u64, page_size: usize) -> Self {
            let all: Vec<Row> = (0..rows).map(|i| vec![CellValue::Int(i as i64)]).collect();
            let pages = all
                .chunks(page_size)
                .enumerate()
                .map(|(i, c)| (i, c.to_vec()))
                .collect();
            Self {
                pages,
                late: Vec::new(),
                late_after: 0,
                reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for FakePages {
        async fn page(&self, index: usize) -> CoreResult<Option<Vec<Row>>> {
            let reads = self.reads.fetch_add(1, Ordering::SeqCst);
            if self.late.contains(&index) && reads < self.late_after {
                return Ok(None);
            }
            Ok(self.pages.get(&index).cloned())
        }
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter()
            .map(|r| match r[0] {
                CellValue::Int(i) => i,
                _ => -1,
            })
            .collect()
    }

    const QUICK: WaitPolicy = WaitPolicy {
        max_wait: Duration::from_millis(40),
        poll_interval: Duration::from_millis(5),
    };

    #[tokio::test]
    async fn test_slice_spans_pages() {
        let source = FakePages::new(1200, 500);
        let slice = read_slice(&source, 450, 1020, 500, Some(1200), None).await.unwrap();
        assert_eq!(ids(&slice.rows), (450..1020).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_and_out_of_range_requests() {
        let source = FakePages::new(10, 4);
        assert!(read_slice(&source, 5, 5, 4, Some(10), Some(QUICK)).await.unwrap().rows.is_empty());
        assert!(read_slice(&source, 7, 3, 4, Some(10), Some(QUICK)).await.unwrap().rows.is_empty());
        let past_end = read_slice(&source, 10, 20, 4, Some(10), Some(QUICK)).await.unwrap();
        assert!(past_end.rows.is_empty());
        assert!(!past_end.timed_out);
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_waits_for_first_missing_page_only() {
        let mut source = FakePages::new(10, 4);
        source.pages.remove(&2);
        source.late = vec![1];
        source.late_after = 3;

        let slice = read_slice(&source, 2, 12, 4, None, Some(QUICK)).await.unwrap();
        // Page 1 shows up while waiting; page 2 never does and is not waited for
        assert_eq!(ids(&slice.rows), (2..8).collect::<Vec<_>>());
        assert!(!slice.timed_out);
    }

    #[tokio::test]
    async fn test_wait_deadline_returns_partial_rows() {
        let mut source = FakePages::new(10, 4);
        source.pages.remove(&1);
        source.pages.remove(&2);

        let slice = read_slice(&source, 0, 10, 4, None, Some(QUICK)).await.unwrap();
        assert_eq!(ids(&slice.rows), vec![0, 1, 2, 3]);
        assert!(slice.timed_out);
    }
}
