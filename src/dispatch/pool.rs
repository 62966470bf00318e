//! Bounded worker pool
//!
//! The dispatcher fills a [`WorkQueue`] once, spawns `workers` tasks that each
//! own one leased [`RateLimitedClient`], and waits for one of three things:
//!
//! - the queue drains: flush once, then stop the workers
//! - the caller cancels: stop the workers, then flush once
//! - a worker fails fatally: stop the rest, flush once, return the error

use crate::client::{ClientPool, RateLimitedClient};
use crate::config::CrawlerConfig;
use crate::dispatch::processor::ItemProcessor;
use crate::dispatch::queue::WorkQueue;
use crate::remote::CatalogItem;
use crate::store::SharedStore;
use crate::{Bucket, Result, SiftError, StoreResult};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Worker count and resume behavior
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub workers: usize,

    /// Buckets checked before processing an item; empty means all of them
    pub cache_buckets: Vec<String>,
}

impl DispatchSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            workers: config.workers as usize,
            cache_buckets: config.cache_buckets.clone(),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: RunStatus,

    /// Items handed to the run
    pub total: usize,

    /// Items classified and written during this run
    pub processed: usize,

    /// Items already present in the store
    pub skipped: usize,

    /// Items dropped after an error
    pub failed: usize,
}

#[derive(Debug, Default)]
struct RunCounters {
    processed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl RunCounters {
    fn report(&self, status: RunStatus, total: usize) -> RunReport {
        RunReport {
            status,
            total,
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Flushes the store when dropped, unless a flush already happened
///
/// Covers the paths where the run future is dropped mid-way or a panic unwinds
/// through it.
pub struct FlushGuard {
    store: SharedStore,
    flushed: bool,
}

impl FlushGuard {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            flushed: false,
        }
    }

    /// Flushes now and disarms the guard
    pub fn flush(&mut self) -> StoreResult<()> {
        self.flushed = true;
        self.store.flush()
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if self.flushed {
            return;
        }
        if let Err(e) = self.store.flush() {
            tracing::error!("Failed to flush store on drop: {}", e);
        }
    }
}

enum Outcome {
    Drained,
    Cancelled,
    Failed(SiftError),
}

/// Runs a processor over a catalog with a fixed number of workers
pub struct Dispatcher {
    settings: DispatchSettings,
    clients: ClientPool,
}

impl Dispatcher {
    /// Creates a dispatcher
    ///
    /// # Arguments
    ///
    /// * `settings` - Worker count and cache buckets
    /// * `clients` - Pool each worker leases its client from
    pub fn new(settings: DispatchSettings, clients: ClientPool) -> Self {
        Self { settings, clients }
    }

    /// The client pool, for retry statistics after a run
    pub fn clients(&self) -> &ClientPool {
        &self.clients
    }

    /// Classifies every item not yet in `store`
    ///
    /// Each worker pops an item, skips it when the store already holds it under
    /// one of the cache buckets, runs `processor` through its own leased client
    /// and writes every resulting record with `displace_object` under the store
    /// lock. Item-level errors drop the item; fatal errors stop the run.
    ///
    /// # Arguments
    ///
    /// * `items` - The catalog to classify, queued in order
    /// * `store` - Shared store, read for the cache check and written per item
    /// * `processor` - Fetches and classifies one item
    /// * `cancel` - Stops the run; in-flight items are abandoned, finished ones kept
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The queue drained (`Completed`) or `cancel` fired (`Interrupted`)
    /// * `Err(SiftError)` - A worker hit a fatal error; the store was flushed first
    pub async fn run(
        &self,
        items: Vec<CatalogItem>,
        store: SharedStore,
        processor: Arc<dyn ItemProcessor>,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let total = items.len();
        let queue = Arc::new(WorkQueue::from_items(items));
        let counters = Arc::new(RunCounters::default());
        let workers_token = cancel.child_token();
        let mut guard = FlushGuard::new(store.clone());

        tracing::info!(
            "Dispatching {} items to {} workers",
            total,
            self.settings.workers
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.workers.max(1) {
            let worker = Worker {
                id: worker_id,
                client: self.clients.lease()?,
                queue: Arc::clone(&queue),
                store: store.clone(),
                processor: Arc::clone(&processor),
                cache_buckets: self.settings.cache_buckets.clone(),
                counters: Arc::clone(&counters),
                total,
                cancel: workers_token.clone(),
            };
            workers.spawn(worker.run());
        }

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Outcome::Cancelled,
                joined = workers.join_next() => match joined {
                    Some(Ok(Ok(()))) => continue,
                    Some(Ok(Err(e))) => break Outcome::Failed(e),
                    Some(Err(e)) => break Outcome::Failed(SiftError::Worker(e.to_string())),
                    None => break Outcome::Drained,
                },
                _ = queue.join() => break Outcome::Drained,
            }
        };

        match outcome {
            Outcome::Drained => {
                guard.flush()?;
                workers_token.cancel();
                // A worker acknowledges its item before returning, so a fatal
                // error on the last item can still be in flight here
                if let Some(e) = stop_workers(&mut workers).await {
                    tracing::error!("Worker failed, stopping run: {}", e);
                    return Err(e);
                }

                let report = counters.report(RunStatus::Completed, total);
                tracing::info!(
                    "Run completed: {} processed, {} skipped, {} failed",
                    report.processed,
                    report.skipped,
                    report.failed
                );
                Ok(report)
            }
            Outcome::Cancelled => {
                workers_token.cancel();
                let failure = stop_workers(&mut workers).await;
                guard.flush()?;
                if let Some(e) = failure {
                    tracing::error!("Worker failed during shutdown: {}", e);
                    return Err(e);
                }

                tracing::info!("Shutdown");
                Ok(counters.report(RunStatus::Interrupted, total))
            }
            Outcome::Failed(e) => {
                tracing::error!("Worker failed, stopping run: {}", e);
                workers_token.cancel();
                if let Some(other) = stop_workers(&mut workers).await {
                    tracing::warn!("Another worker also failed: {}", other);
                }
                if let Err(flush_err) = guard.flush() {
                    tracing::error!("Failed to flush store after worker failure: {}", flush_err);
                }
                Err(e)
            }
        }
    }
}

/// Awaits every worker
///
/// # Returns
///
/// * `Some(SiftError)` - The first fatal error (or panic) among the workers
/// * `None` - Every worker stopped cleanly
async fn stop_workers(workers: &mut JoinSet<Result<()>>) -> Option<SiftError> {
    let mut failure = None;
    while let Some(joined) = workers.join_next().await {
        let error = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(e) => SiftError::Worker(e.to_string()),
        };
        if failure.is_none() && error.is_fatal() {
            failure = Some(error);
        } else {
            tracing::warn!("Worker stopped with error: {}", error);
        }
    }
    failure
}

struct Worker {
    id: usize,
    client: RateLimitedClient,
    queue: Arc<WorkQueue<CatalogItem>>,
    store: SharedStore,
    processor: Arc<dyn ItemProcessor>,
    cache_buckets: Vec<String>,
    counters: Arc<RunCounters>,
    total: usize,
    cancel: CancellationToken,
}

impl Worker {
    /// Drains the queue until it is empty, cancelled, or an item fails fatally
    async fn run(self) -> Result<()> {
        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => break,
                item = self.queue.pop() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            let outcome = self.handle(&item).await;
            self.queue.task_done();
            outcome?;
        }

        tracing::debug!("Worker {} stopped", self.id);
        Ok(())
    }

    /// Processes one item and records the outcome
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The item was written, skipped, dropped after an item-level
    ///   error, or abandoned on cancellation
    /// * `Err(SiftError)` - A fatal error that must end the run
    async fn handle(&self, item: &CatalogItem) -> Result<()> {
        let buckets = if self.cache_buckets.is_empty() {
            None
        } else {
            Some(self.cache_buckets.as_slice())
        };
        let cached = self.store.lock().contains(&item.id, buckets);
        if cached {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Item {} already classified, skipping", item.id);
            return Ok(());
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = self.processor.process(&self.client, item) => result,
        };

        let classification = match result {
            Ok(classification) => classification,
            Err(e) if !e.is_fatal() => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropping item {}: {}", item.id, e);
                return Ok(());
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let (stored, eligible) = {
            let mut store = self.store.lock();
            for record in classification.records() {
                store.displace_object(&record.id, record)?;
            }
            (
                store.record_count(),
                store.bucket_len(Bucket::Eligible.store_key()),
            )
        };
        self.counters.processed.fetch_add(1, Ordering::Relaxed);

        if let Some(record) = classification.decision() {
            tracing::info!(
                "Item {} (redirect {}) -> {} [{} of {}, {} eligible]",
                record.id,
                record.redirect_id.as_deref().unwrap_or("-"),
                record.bucket,
                stored,
                self.total,
                eligible
            );
        }

        Ok(())
    }
}
