//! Delayed tasks tied to an owner's lifetime.
//!
//! Work scheduled here runs on the tokio runtime after a delay. Everything
//! still pending is aborted by `cancel_all` or when the `DelayedTasks` is
//! dropped, so a torn-down component never receives late callbacks.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DelayedTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DelayedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        let mut handles = self.handles.lock().unwrap_or_else(|p| p.into_inner());
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tasks that have not yet completed
    pub fn pending(&self) -> usize {
        let handles = self.handles.lock().unwrap_or_else(|p| p.into_inner());
        handles.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn cancel_all(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(|p| p.into_inner());
        let count = handles.len();
        for handle in handles.drain(..) {
            handle.abort();
        }
        if count > 0 {
            debug!(count, "Cancelled delayed tasks");
        }
    }
}

impl Drop for DelayedTasks {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_delay() {
        let tasks = DelayedTasks::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tasks.schedule(Duration::from_millis(1000), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(tasks.pending(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let tasks = DelayedTasks::new();
            let counter = hits.clone();
            tasks.schedule(Duration::from_millis(10), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
