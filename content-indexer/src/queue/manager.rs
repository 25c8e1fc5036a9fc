//! Reindex queue management.

use std::collections::BTreeSet;
use std::sync::Arc;

use content_index_shared::IndexableItemDescriptor;
use tracing::{debug, info, instrument, warn};

use super::backend::{JobQueue, QueueFlavor};
use super::job::{JobId, ReindexJob};
use super::tracker::JobTracker;
use crate::errors::QueueError;

/// Schedules reindex jobs and keeps track of the ones still outstanding, so
/// a bulk reindex can first take the stale ones off the queue.
pub struct ReindexQueueManager {
    queue: Arc<dyn JobQueue>,
    tracker: Arc<dyn JobTracker>,
}

impl ReindexQueueManager {
    pub fn new(queue: Arc<dyn JobQueue>, tracker: Arc<dyn JobTracker>) -> Self {
        Self { queue, tracker }
    }

    #[instrument(skip(self), fields(item = %descriptor))]
    pub async fn enqueue_job(&self, descriptor: &IndexableItemDescriptor) -> Result<JobId, QueueError> {
        let id = self.queue.push(&ReindexJob::from(descriptor)).await?;
        self.tracker.track(&[id]).await?;
        debug!(job_id = %id, "Enqueued reindex job");
        Ok(id)
    }

    /// Enqueue one job per descriptor.
    ///
    /// Ids pushed before a failure are still tracked.
    pub async fn enqueue_jobs(
        &self,
        descriptors: &[IndexableItemDescriptor],
    ) -> Result<Vec<JobId>, QueueError> {
        let mut ids = Vec::with_capacity(descriptors.len());
        let mut failure = None;
        for descriptor in descriptors {
            match self.queue.push(&ReindexJob::from(descriptor)).await {
                Ok(id) => ids.push(id),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.tracker.track(&ids).await?;

        if let Some(e) = failure {
            return Err(e);
        }
        info!(count = ids.len(), "Enqueued reindex jobs");
        Ok(ids)
    }

    /// Take a job off the queue and stop tracking it.
    pub async fn remove_job(&self, id: JobId) -> Result<(), QueueError> {
        self.remove_from_queue(id).await?;
        self.tracker.untrack(id).await
    }

    /// Take every tracked job off the queue and empty the tracked set.
    ///
    /// Jobs that already ran are ignored; other failures are logged.
    ///
    /// # Returns
    ///
    /// The number of jobs taken off the queue.
    #[instrument(skip(self))]
    pub async fn clear_all_jobs(&self) -> Result<usize, QueueError> {
        let tracked = self.tracker.tracked().await?;
        let mut removed = 0;
        for id in &tracked {
            match self.remove_from_queue(*id).await {
                Ok(()) => removed += 1,
                Err(QueueError::JobNotFound(_)) => debug!(job_id = %id, "Tracked job already gone"),
                Err(e) => warn!(job_id = %id, error = %e, "Failed to remove tracked job"),
            }
        }
        self.tracker.clear().await?;
        info!(tracked = tracked.len(), removed, "Cleared reindex jobs");
        Ok(removed)
    }

    /// Called by the runner when a job finished.
    pub async fn job_completed(&self, id: JobId) -> Result<(), QueueError> {
        self.tracker.untrack(id).await
    }

    /// Remove any still queued job for an item.
    pub async fn remove_jobs_for(&self, descriptor: &IndexableItemDescriptor) -> Result<usize, QueueError> {
        let ids = self.queue.find(&ReindexJob::from(descriptor)).await?;
        for id in &ids {
            self.remove_job(*id).await?;
        }
        if !ids.is_empty() {
            debug!(item = %descriptor, count = ids.len(), "Removed pending jobs");
        }
        Ok(ids.len())
    }

    pub async fn tracked_job_ids(&self) -> Result<BTreeSet<JobId>, QueueError> {
        self.tracker.tracked().await
    }

    async fn remove_from_queue(&self, id: JobId) -> Result<(), QueueError> {
        match self.queue.flavor() {
            QueueFlavor::RandomAccess => self.queue.remove(id).await,
            QueueFlavor::Fifo => self.queue.release(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{InMemoryJobQueue, InMemoryJobTracker};
    use async_trait::async_trait;
    use content_index_shared::ElementType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn descriptor(id: i64) -> IndexableItemDescriptor {
        IndexableItemDescriptor::new(id, 1, ElementType::Entry)
    }

    fn manager_with(queue: Arc<InMemoryJobQueue>) -> ReindexQueueManager {
        ReindexQueueManager::new(queue, Arc::new(InMemoryJobTracker::default()))
    }

    #[tokio::test]
    async fn test_enqueue_tracks_ids() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let manager = manager_with(queue.clone());

        let single = manager.enqueue_job(&descriptor(1)).await.unwrap();
        let bulk = manager
            .enqueue_jobs(&[descriptor(2), descriptor(3)])
            .await
            .unwrap();

        let tracked: Vec<JobId> = manager.tracked_job_ids().await.unwrap().into_iter().collect();
        assert_eq!(tracked, vec![single, bulk[0], bulk[1]]);
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn test_clear_all_jobs_random_access() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let manager = manager_with(queue.clone());
        let ids = manager
            .enqueue_jobs(&[descriptor(1), descriptor(2)])
            .await
            .unwrap();

        // The first job already ran.
        queue.pop();

        assert_eq!(manager.clear_all_jobs().await.unwrap(), 1);
        assert!(queue.is_empty());
        assert!(manager.tracked_job_ids().await.unwrap().is_empty());
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_all_jobs_fifo_releases() {
        let queue = Arc::new(InMemoryJobQueue::with_flavor(QueueFlavor::Fifo));
        let manager = manager_with(queue.clone());
        manager
            .enqueue_jobs(&[descriptor(1), descriptor(2)])
            .await
            .unwrap();

        assert_eq!(manager.clear_all_jobs().await.unwrap(), 2);
        assert!(queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_completion_untracks() {
        let manager = manager_with(Arc::new(InMemoryJobQueue::new()));
        let id = manager.enqueue_job(&descriptor(1)).await.unwrap();

        manager.job_completed(id).await.unwrap();
        assert!(manager.tracked_job_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_jobs_for_item() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let manager = manager_with(queue.clone());
        manager.enqueue_job(&descriptor(1)).await.unwrap();
        let other = manager.enqueue_job(&descriptor(2)).await.unwrap();
        manager.enqueue_job(&descriptor(1)).await.unwrap();

        assert_eq!(manager.remove_jobs_for(&descriptor(1)).await.unwrap(), 2);
        assert_eq!(queue.pending_ids(), vec![other]);
        let tracked: Vec<JobId> = manager.tracked_job_ids().await.unwrap().into_iter().collect();
        assert_eq!(tracked, vec![other]);
    }

    struct FailingQueue {
        pushes: AtomicUsize,
    }

    #[async_trait]
    impl JobQueue for FailingQueue {
        fn flavor(&self) -> QueueFlavor {
            QueueFlavor::RandomAccess
        }

        async fn push(&self, _job: &ReindexJob) -> Result<JobId, QueueError> {
            let n = self.pushes.fetch_add(1, Ordering::SeqCst) as u64;
            if n >= 1 {
                return Err(QueueError::backend("queue full"));
            }
            Ok(JobId(n + 1))
        }

        async fn remove(&self, id: JobId) -> Result<(), QueueError> {
            Err(QueueError::JobNotFound(id))
        }

        async fn release(&self, _id: JobId) -> Result<(), QueueError> {
            Err(QueueError::Unsupported("release"))
        }
    }

    #[tokio::test]
    async fn test_partial_bulk_enqueue_keeps_pushed_ids_tracked() {
        let manager = ReindexQueueManager::new(
            Arc::new(FailingQueue {
                pushes: AtomicUsize::new(0),
            }),
            Arc::new(InMemoryJobTracker::default()),
        );

        let result = manager
            .enqueue_jobs(&[descriptor(1), descriptor(2), descriptor(3)])
            .await;

        assert_eq!(result, Err(QueueError::backend("queue full")));
        let tracked: Vec<JobId> = manager.tracked_job_ids().await.unwrap().into_iter().collect();
        assert_eq!(tracked, vec![JobId(1)]);
        assert_eq!(manager.clear_all_jobs().await.unwrap(), 0);
    }
}
