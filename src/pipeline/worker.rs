//! Fixed-size worker pool over a bounded job queue
//!
//! Workers share one receiver behind an async mutex and pull jobs until the
//! queue is closed and drained. Each job runs under its own deadline and a
//! child cancellation token; failures go to an error sink and never stop a
//! worker.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{PoolStats, StatsSnapshot};
use crate::config::PipelineConfig;
use crate::metrics;
use crate::models::Item;
use crate::utils::error::{FetchError, PoolError, SourceError};

/// Per-job work executed by a pool worker
#[async_trait]
pub trait SourceProcessor: Send + Sync {
    /// Process one locator. `cancel` fires when the job's deadline passes or
    /// the pool is aborted.
    async fn process_source(
        &self,
        locator: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<Item>, FetchError>;
}

/// A unit of work in the queue
#[derive(Debug, Clone)]
pub struct Job {
    /// Job ID for tracking
    pub job_id: u64,

    /// Source to process
    pub locator: String,
}

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker tasks
    pub workers: usize,

    /// Job queue capacity
    pub queue_capacity: usize,

    /// Deadline for a single job
    pub job_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for WorkerPoolConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            job_timeout: Duration::from_secs(config.job_timeout_secs),
        }
    }
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

/// Pool of workers draining a shared bounded queue
pub struct WorkerPool {
    job_tx: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_job_id: AtomicU64,
    stats: Arc<PoolStats>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `config.workers` workers onto the current runtime
    ///
    /// Failed jobs are reported on `error_tx`. Cancelling `cancel` aborts
    /// in-flight jobs and makes queued ones finish without running.
    ///
    /// # Errors
    ///
    /// `PoolError::NoWorkers` when `config.workers` is zero.
    pub fn new(
        processor: Arc<dyn SourceProcessor>,
        config: WorkerPoolConfig,
        error_tx: mpsc::UnboundedSender<SourceError>,
        cancel: CancellationToken,
    ) -> Result<Self, PoolError> {
        if config.workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let job_rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(job_rx));
        let stats = Arc::new(PoolStats::default());

        let handles = (0..config.workers)
            .map(|worker_id| {
                let worker = Worker {
                    worker_id,
                    processor: Arc::clone(&processor),
                    job_timeout: config.job_timeout,
                    error_tx: error_tx.clone(),
                    cancel: cancel.clone(),
                    stats: Arc::clone(&stats),
                };
                tokio::spawn(worker.run(Arc::clone(&job_rx)))
            })
            .collect();

        tracing::info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            job_timeout_ms = config.job_timeout.as_millis() as u64,
            "Worker pool started"
        );

        Ok(Self {
            job_tx: Mutex::new(Some(job_tx)),
            handles: Mutex::new(handles),
            next_job_id: AtomicU64::new(1),
            stats,
            worker_count: config.workers,
        })
    }

    fn sender(&self) -> Option<mpsc::Sender<Job>> {
        self.job_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Enqueue a locator, waiting while the queue is full
    ///
    /// Returns the job ID.
    ///
    /// # Errors
    ///
    /// `PoolError::Stopped` once [`stop`](Self::stop) has been called.
    pub async fn submit(&self, locator: impl Into<String>) -> Result<u64, PoolError> {
        let tx = self.sender().ok_or(PoolError::Stopped)?;
        let job = Job {
            job_id: self.next_job_id.fetch_add(1, Ordering::Relaxed),
            locator: locator.into(),
        };
        let job_id = job.job_id;

        tx.send(job).await.map_err(|_| PoolError::Stopped)?;
        self.stats.record_submit();
        Ok(job_id)
    }

    /// Close the queue. Queued jobs still run; new submissions fail.
    pub fn stop(&self) {
        let previous = self
            .job_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::debug!("Worker pool queue closed");
        }
    }

    /// True after [`stop`](Self::stop)
    pub fn is_stopped(&self) -> bool {
        self.sender().is_none()
    }

    /// Wait for every worker to exit. Only returns after [`stop`](Self::stop).
    pub async fn join(&self) {
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task failed");
            }
        }
        tracing::info!(stats = ?self.stats.snapshot(), "Worker pool stopped");
    }

    /// Current counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Jobs waiting in the queue (0 once stopped)
    pub fn pending(&self) -> usize {
        self.sender()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    /// Number of worker tasks
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

struct Worker {
    worker_id: usize,
    processor: Arc<dyn SourceProcessor>,
    job_timeout: Duration,
    error_tx: mpsc::UnboundedSender<SourceError>,
    cancel: CancellationToken,
    stats: Arc<PoolStats>,
}

impl Worker {
    async fn run(self, job_rx: SharedReceiver) {
        loop {
            let job = {
                let mut rx = job_rx.lock().await;
                rx.recv().await
            };

            let Some(job) = job else {
                break; // Queue closed and drained
            };

            self.process(job).await;
        }

        tracing::debug!(worker_id = self.worker_id, "Worker exiting");
    }

    async fn process(&self, job: Job) {
        let Job { job_id, locator } = job;

        if self.cancel.is_cancelled() {
            self.stats.record_cancelled();
            metrics::record_pool_job("cancelled");
            tracing::debug!(worker_id = self.worker_id, job_id, locator = %locator, "Skipping job, pool cancelled");
            return;
        }

        tracing::debug!(worker_id = self.worker_id, job_id, locator = %locator, "Processing");

        let token = self.cancel.child_token();
        let started = Instant::now();
        let work =
            AssertUnwindSafe(self.processor.process_source(&locator, token.clone())).catch_unwind();

        let outcome = match tokio::time::timeout(self.job_timeout, work).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(FetchError::TaskPanicked),
            Err(_) => {
                token.cancel();
                Err(FetchError::Timeout)
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(items) => {
                self.stats.record_success(items.len());
                metrics::record_pool_job("succeeded");
                tracing::debug!(
                    worker_id = self.worker_id,
                    job_id,
                    items = items.len(),
                    elapsed_ms,
                    "Job completed"
                );
            }
            Err(e) if e.is_cancelled() => {
                self.stats.record_cancelled();
                metrics::record_pool_job("cancelled");
                tracing::debug!(worker_id = self.worker_id, job_id, "Job cancelled");
            }
            Err(e) => {
                if matches!(e, FetchError::Timeout) {
                    self.stats.record_timeout();
                    metrics::record_pool_job("timeout");
                } else {
                    self.stats.record_failure();
                    metrics::record_pool_job("failed");
                }
                tracing::debug!(worker_id = self.worker_id, job_id, error = %e, elapsed_ms, "Job failed");

                // The receiver may already be gone during shutdown.
                let _ = self.error_tx.send(SourceError::new(locator, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl SourceProcessor for Echo {
        async fn process_source(
            &self,
            locator: &str,
            _cancel: CancellationToken,
        ) -> Result<Vec<Item>, FetchError> {
            Ok(vec![Item::new(locator, None)])
        }
    }

    fn pool(workers: usize) -> Result<(WorkerPool, mpsc::UnboundedReceiver<SourceError>), PoolError> {
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let config = WorkerPoolConfig {
            workers,
            queue_capacity: 4,
            job_timeout: Duration::from_secs(1),
        };
        WorkerPool::new(Arc::new(Echo), config, error_tx, CancellationToken::new())
            .map(|p| (p, error_rx))
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        assert_eq!(pool(0).err(), Some(PoolError::NoWorkers));
    }

    #[tokio::test]
    async fn test_job_ids_increase() {
        let (pool, _errors) = pool(2).unwrap();
        let first = pool.submit("a").await.unwrap();
        let second = pool.submit("b").await.unwrap();
        assert!(second > first);

        pool.stop();
        pool.join().await;

        let stats = pool.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.items, 2);
    }

    #[tokio::test]
    async fn test_submit_after_stop_fails() {
        let (pool, _errors) = pool(1).unwrap();
        pool.stop();
        assert!(pool.is_stopped());
        assert_eq!(pool.submit("late").await, Err(PoolError::Stopped));
        pool.join().await;
    }
}
