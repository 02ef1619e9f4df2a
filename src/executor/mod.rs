//! Fixed-size worker pool for long-running diagnostics
//!
//! Every ping, trace, info or speed-test run is submitted here so the
//! interactive side only ever waits on channels and join handles.

pub mod processes;

use crate::error::{AppError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::task::TaskTracker;

/// Statistics for a pool at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatistics {
    pub workers: usize,
    pub running: usize,
    pub tracked: usize,
}

/// Result of a pool shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every task finished within the grace period
    Drained,
    /// The grace period ran out and this many tasks were aborted
    Aborted(usize),
}

/// Runs at most `workers` tasks at once; further submissions queue in order
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    limiter: Arc<Semaphore>,
    tracker: TaskTracker,
    handles: Arc<Mutex<Vec<AbortHandle>>>,
    closed: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            limiter: Arc::new(Semaphore::new(workers)),
            tracker: TaskTracker::new(),
            handles: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Queue a task. The handle resolves once the task ran; a task aborted
    /// at shutdown resolves to a cancelled `JoinError`.
    pub fn submit<F, T>(&self, task: F) -> Result<JoinHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(AppError::internal("worker pool is shut down"));
        }

        let limiter = self.limiter.clone();
        let handle = self.tracker.spawn(async move {
            // The permit lives until the task finishes
            let _permit = limiter.acquire_owned().await;
            task.await
        });

        let mut handles = self
            .handles
            .lock()
            .map_err(|_| AppError::internal("worker pool state poisoned"))?;
        handles.retain(|h| !h.is_finished());
        handles.push(handle.abort_handle());

        Ok(handle)
    }

    pub fn statistics(&self) -> PoolStatistics {
        PoolStatistics {
            workers: self.workers,
            running: self.workers.saturating_sub(self.limiter.available_permits()),
            tracked: self.tracker.len(),
        }
    }

    /// Stop accepting work, wait up to `grace` for queued and running tasks,
    /// then abort whatever is left.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        self.closed.store(true, Ordering::SeqCst);

        self.tracker.close();
        let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();

        let handles: Vec<AbortHandle> = self
            .handles
            .lock()
            .map(|mut h| std::mem::take(&mut *h))
            .unwrap_or_default();

        if drained {
            self.limiter.close();
            return ShutdownOutcome::Drained;
        }

        let remaining: Vec<&AbortHandle> = handles.iter().filter(|h| !h.is_finished()).collect();
        for handle in &remaining {
            handle.abort();
        }
        self.limiter.close();
        ShutdownOutcome::Aborted(remaining.len())
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(crate::defaults::DEFAULT_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_submit_returns_result() {
        let pool = WorkerPool::new(2);
        let handle = pool.submit(async { 21 * 2 }).unwrap();
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .unwrap()
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.statistics().running, 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_quick_tasks() {
        let pool = WorkerPool::new(4);
        let handle = pool
            .submit(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                "done"
            })
            .unwrap();

        assert_eq!(pool.shutdown(Duration::from_secs(2)).await, ShutdownOutcome::Drained);
        assert_eq!(handle.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_shutdown_aborts_stuck_tasks() {
        let pool = WorkerPool::new(1);
        let stuck = pool.submit(tokio::time::sleep(Duration::from_secs(60))).unwrap();
        let queued = pool.submit(async { 1 }).unwrap();

        let outcome = pool.shutdown(Duration::from_millis(100)).await;
        assert_eq!(outcome, ShutdownOutcome::Aborted(2));
        assert!(stuck.await.unwrap_err().is_cancelled());
        assert!(queued.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(1);
        pool.shutdown(Duration::from_millis(10)).await;
        assert!(pool.submit(async {}).is_err());
        assert!(pool.is_closed());
    }
}
