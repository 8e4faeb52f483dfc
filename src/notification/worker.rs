//! Fixed-size worker pool for notification processing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Default)]
struct Pending {
    jobs: AtomicUsize,
    idle: Notify,
}

/// Decrements the pending count when a job finishes, panicked or not
struct PendingGuard(Arc<Pending>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.jobs.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// At most `size` jobs run at once; the rest wait their turn in FIFO order
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    pending: Arc<Pending>,
    size: usize,
}

impl WorkerPool {
    /// Pool running at most `size` jobs at once
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            pending: Arc::new(Pending::default()),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs queued or running
    pub fn pending(&self) -> usize {
        self.pending.jobs.load(Ordering::SeqCst)
    }

    /// Queue a job; returns immediately
    pub fn execute<F>(&self, job: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.jobs.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(Arc::clone(&self.pending));
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                trace!("Worker pool closed, job dropped");
                return;
            };
            job();
        })
    }

    /// Wait until no job is queued or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}
