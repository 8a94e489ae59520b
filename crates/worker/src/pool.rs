//! Bounded pool for blocking job work.
//!
//! Bundle selection walks the filesystem and decompresses archives, so jobs
//! run on the blocking thread pool. A semaphore caps how many run at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::WorkerError;

/// Runs blocking jobs with at most `capacity` in flight.
#[derive(Clone)]
pub struct JobPool {
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    capacity: usize,
}

impl JobPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            active: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs currently executing.
    pub fn active_tasks(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait for a free slot, then run `job` on the blocking pool.
    pub async fn run<F, T>(&self, job: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::PoolClosed)?;
        let active = Arc::clone(&self.active);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _guard = ActiveGuard::enter(active);
            job()
        })
        .await
        .map_err(|e| WorkerError::JobPanicked(e.to_string()))
    }

    /// Stop accepting jobs. Jobs already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
