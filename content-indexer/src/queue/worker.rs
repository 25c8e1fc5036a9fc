//! In-process job worker.
//!
//! Pulls jobs from the in-memory queue and runs them until shut down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

use super::backend::{InMemoryJobQueue, QueuedJob};
use super::runner::{JobOutcome, ReindexJobRunner};

/// Configuration for the worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Runs per job before it is dropped.
    pub max_attempts: u32,
    /// How often progress is logged.
    pub progress_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// Job counts since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub indexed: u64,
    pub skipped: u64,
    pub content_gone: u64,
    pub retried: u64,
    pub failed: u64,
}

impl WorkerSummary {
    pub fn processed(&self) -> u64 {
        self.indexed + self.skipped + self.content_gone + self.failed
    }
}

#[derive(Debug, Default)]
struct Counters {
    indexed: AtomicU64,
    skipped: AtomicU64,
    content_gone: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerSummary {
        WorkerSummary {
            indexed: self.indexed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            content_gone: self.content_gone.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Worker that executes queued reindex jobs.
///
/// Failed jobs are put back on the queue until they reach `max_attempts`;
/// jobs that fail for good stay tracked until the next bulk reindex clears
/// them.
pub struct JobWorker {
    queue: Arc<InMemoryJobQueue>,
    runner: Arc<ReindexJobRunner>,
    config: WorkerConfig,
    shutdown_tx: watch::Sender<bool>,
    counters: Counters,
}

impl JobWorker {
    pub fn new(queue: Arc<InMemoryJobQueue>, runner: Arc<ReindexJobRunner>) -> Self {
        Self::with_config(queue, runner, WorkerConfig::default())
    }

    pub fn with_config(
        queue: Arc<InMemoryJobQueue>,
        runner: Arc<ReindexJobRunner>,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            queue,
            runner,
            config,
            shutdown_tx,
            counters: Counters::default(),
        }
    }

    /// Ask the worker to stop after its current job.
    ///
    /// The request sticks: a `run` that starts afterwards returns at once.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn summary(&self) -> WorkerSummary {
        self.counters.snapshot()
    }

    /// Run jobs until `shutdown` is called or the process receives Ctrl-C.
    #[instrument(skip(self))]
    pub async fn run(&self) -> WorkerSummary {
        info!("Starting job worker");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut prev_processed: u64 = 0;
        let mut prev_time = tokio::time::Instant::now();

        loop {
            tokio::select! {
                biased;

                _ = async { shutdown_rx.wait_for(|stop| *stop).await.map(|_| ()) } => {
                    info!("Worker shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
                job = self.queue.next() => {
                    self.process(job).await;
                }
                _ = progress_timer.tick() => {
                    let summary = self.counters.snapshot();
                    let processed = summary.processed();

                    let now = tokio::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let jobs_per_sec = if elapsed_secs > 0.0 {
                        (processed.saturating_sub(prev_processed) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        jobs_processed = processed,
                        documents_indexed = summary.indexed,
                        pending = self.queue.len(),
                        jobs_per_sec = format!("{:.2}", jobs_per_sec),
                        "Processing progress"
                    );

                    prev_processed = processed;
                    prev_time = now;
                }
            }
        }

        let summary = self.counters.snapshot();
        info!(
            indexed = summary.indexed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Job worker stopped"
        );
        summary
    }

    /// Run jobs until the queue is empty, retries included.
    pub async fn drain(&self) -> WorkerSummary {
        while let Some(job) = self.queue.pop() {
            self.process(job).await;
        }
        self.counters.snapshot()
    }

    async fn process(&self, job: QueuedJob) {
        match self.runner.execute_payload(job.id, &job.payload).await {
            Ok(JobOutcome::Indexed) => {
                self.counters.indexed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(JobOutcome::Skipped(_)) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Ok(JobOutcome::ContentGone) => {
                self.counters.content_gone.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if job.attempts + 1 < self.config.max_attempts => {
                warn!(job_id = %job.id, attempt = job.attempts + 1, error = %e, "Job failed, retrying");
                self.counters.retried.fetch_add(1, Ordering::Relaxed);
                self.queue.requeue(job);
            }
            Err(e) => {
                error!(job_id = %job.id, attempts = job.attempts + 1, error = %e, "Job failed permanently");
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentItem, InMemoryContentRepository, StaticContentItem};
    use crate::diagnostics::Diagnostics;
    use crate::drift::SyncStatusCache;
    use crate::extractor::{ContentExtractor, PageFetcher};
    use crate::index_manager::IndexManager;
    use crate::indexer::ElementIndexer;
    use crate::queue::{InMemoryJobTracker, ReindexQueueManager};
    use content_index_repository::{
        InMemorySearchProvider, SearchIndexProvider, SearchIndexService,
        SearchIndexServiceConfig,
    };
    use content_index_shared::{ElementType, IndexableItemDescriptor, Partition};
    use serde_json::Map;

    struct Fixture {
        provider: Arc<InMemorySearchProvider>,
        repository: Arc<InMemoryContentRepository>,
        queue: Arc<InMemoryJobQueue>,
        queue_manager: Arc<ReindexQueueManager>,
        runner: Arc<ReindexJobRunner>,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(InMemorySearchProvider::new());
        let repository = Arc::new(InMemoryContentRepository::new(vec![Partition::new(1, "en")]));
        let search = Arc::new(SearchIndexService::new(
            provider.clone(),
            SearchIndexServiceConfig::default(),
        ));
        let index_manager = Arc::new(IndexManager::new(
            search.clone(),
            repository.clone(),
            Map::new(),
            Diagnostics::default(),
            Arc::new(SyncStatusCache::default()),
        ));
        let queue = Arc::new(InMemoryJobQueue::new());
        let queue_manager = Arc::new(ReindexQueueManager::new(
            queue.clone(),
            Arc::new(InMemoryJobTracker::default()),
        ));
        let extractor = ContentExtractor::new(
            Some(Arc::new(|item: &dyn ContentItem| Some(item.title()))),
            None,
            PageFetcher::new(Duration::from_secs(10), Duration::from_secs(30)).unwrap(),
        );
        let indexer = Arc::new(ElementIndexer::new(
            repository.clone(),
            search,
            index_manager,
            queue_manager.clone(),
            Diagnostics::default(),
            extractor,
        ));
        let runner = Arc::new(ReindexJobRunner::new(indexer, queue_manager.clone()));
        Fixture {
            provider,
            repository,
            queue,
            queue_manager,
            runner,
        }
    }

    fn descriptor(id: i64) -> IndexableItemDescriptor {
        IndexableItemDescriptor::new(id, 1, ElementType::Entry)
    }

    #[tokio::test]
    async fn test_drain_runs_every_job() {
        let f = fixture();
        f.repository
            .upsert(StaticContentItem::entry(1, 1).with_url("https://example.com/1"));
        f.repository
            .upsert(StaticContentItem::entry(2, 1).without_url());
        f.queue_manager
            .enqueue_jobs(&[descriptor(1), descriptor(2), descriptor(3)])
            .await
            .unwrap();

        let summary = JobWorker::new(f.queue.clone(), f.runner.clone()).drain().await;

        assert_eq!(
            summary,
            WorkerSummary {
                indexed: 1,
                skipped: 1,
                content_gone: 1,
                retried: 0,
                failed: 0,
            }
        );
        assert!(f.queue.is_empty());
        assert!(f.queue_manager.tracked_job_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_job_is_retried_then_dropped() {
        let f = fixture();
        f.repository
            .upsert(StaticContentItem::entry(1, 1).with_url("https://example.com/1"));
        let id = f.queue_manager.enqueue_job(&descriptor(1)).await.unwrap();
        f.provider.set_available(false);

        let worker = JobWorker::with_config(
            f.queue.clone(),
            f.runner.clone(),
            WorkerConfig {
                max_attempts: 2,
                ..WorkerConfig::default()
            },
        );
        let summary = worker.drain().await;

        assert_eq!(summary.retried, 1);
        assert_eq!(summary.failed, 1);
        assert!(f.queue.is_empty());
        assert!(f.queue_manager.tracked_job_ids().await.unwrap().contains(&id));
    }

    #[tokio::test]
    async fn test_run_processes_jobs_until_shutdown() {
        let f = fixture();
        f.repository
            .upsert(StaticContentItem::entry(1, 1).with_url("https://example.com/1"));
        let worker = Arc::new(JobWorker::new(f.queue.clone(), f.runner.clone()));

        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run().await })
        };
        f.queue_manager.enqueue_job(&descriptor(1)).await.unwrap();

        for _ in 0..100 {
            if worker.summary().indexed == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        worker.shutdown();

        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.indexed, 1);
        assert_eq!(f.provider.count("site-content_1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_is_honored() {
        let f = fixture();
        f.repository
            .upsert(StaticContentItem::entry(1, 1).with_url("https://example.com/1"));
        f.queue_manager.enqueue_job(&descriptor(1)).await.unwrap();
        let worker = JobWorker::new(f.queue.clone(), f.runner.clone());

        worker.shutdown();
        let summary = tokio::time::timeout(Duration::from_secs(5), worker.run())
            .await
            .unwrap();

        assert_eq!(summary.processed(), 0);
        assert_eq!(f.queue.len(), 1);
    }
}
