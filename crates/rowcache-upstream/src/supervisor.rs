//! Registry of background streaming tasks, one per statement.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawns at most one live task per statement id.
///
/// Tasks run until their statement reaches a terminal state; there is no cancel.
#[derive(Clone, Default)]
pub struct StreamSupervisor {
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl StreamSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` for `statement_id` unless one is already running.
    ///
    /// Returns `false` when a live task exists and `task` was dropped.
    pub fn spawn<F>(&self, statement_id: &str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        if tasks.get(statement_id).is_some_and(|h| !h.is_finished()) {
            debug!(statement_id, "Stream already running");
            return false;
        }

        let registry = Arc::clone(&self.tasks);
        let key = statement_id.to_string();
        let handle = tokio::spawn(async move {
            task.await;
            registry.lock().remove(&key);
        });
        tasks.insert(statement_id.to_string(), handle);
        true
    }

    pub fn is_active(&self, statement_id: &str) -> bool {
        self.tasks
            .lock()
            .get(statement_id)
            .is_some_and(|h| !h.is_finished())
    }

    pub fn active_count(&self) -> usize {
        self.tasks.lock().values().filter(|h| !h.is_finished()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_duplicate_spawn_is_ignored_while_running() {
        let supervisor = StreamSupervisor::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (release, wait) = oneshot::channel::<()>();

        let counter = Arc::clone(&runs);
        assert!(supervisor.spawn("s1", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = wait.await;
        }));

        let counter = Arc::clone(&runs);
        assert!(!supervisor.spawn("s1", async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(supervisor.is_active("s1"));
        assert!(!supervisor.is_active("s2"));
        assert_eq!(supervisor.active_count(), 1);

        release.send(()).unwrap();
        for _ in 0..100 {
            if !supervisor.is_active("s1") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!supervisor.is_active("s1"));
        assert_eq!(supervisor.active_count(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // A finished statement may be streamed again
        assert!(supervisor.spawn("s1", async {}));
    }
}
