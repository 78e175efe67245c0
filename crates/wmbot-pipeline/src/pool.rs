use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Bounded pool for request chains.
///
/// Every spawned task waits for a permit before running, so at most `size`
/// chains (and therefore at most `size` compositor processes) run at once.
/// Submissions beyond that queue on the semaphore.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    size: usize,
}

impl WorkerPool {
    /// Pool with `size` workers; zero is bumped to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            size,
        }
    }

    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tracker.spawn(async move {
            // Never closed, so acquisition cannot fail.
            let _permit = permits.acquire_owned().await.ok();
            fut.await
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running chain.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Tasks spawned and not yet finished, queued ones included.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every spawned task, queued ones included, to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        debug!(in_flight = self.tracker.len(), "worker pool draining");
        self.tracker.wait().await;
    }
}
