//! Reactions to content repository events.
//!
//! Item saves go through the policy and either enqueue a reindex job or
//! remove the stale document. Settings saves and the reindex action
//! recreate partition indexes and schedule a job per indexable item.

use std::sync::Arc;

use content_index_shared::IndexableItemDescriptor;
use tracing::{info, instrument, warn};

use crate::content::{ContentItem, ContentRepository};
use crate::errors::SyncError;
use crate::index_manager::IndexManager;
use crate::indexer::{ElementIndexer, IndexOutcome};
use crate::policy::{IndexDecision, SkipReason};
use crate::queue::{JobId, ReindexQueueManager};

/// What saving an item led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAction {
    /// The item is not of an indexable kind.
    Ignored,
    Enqueued(JobId),
    /// The item is not indexable anymore; its document was removed.
    Removed { reason: SkipReason, deleted: u64 },
}

/// Result of a partition reindex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexReport {
    pub recreated: Vec<i64>,
    pub failures: Vec<(i64, String)>,
    pub jobs: Vec<JobId>,
}

pub struct SyncCoordinator {
    repository: Arc<dyn ContentRepository>,
    indexer: Arc<ElementIndexer>,
    index_manager: Arc<IndexManager>,
    queue_manager: Arc<ReindexQueueManager>,
}

impl SyncCoordinator {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        indexer: Arc<ElementIndexer>,
        index_manager: Arc<IndexManager>,
        queue_manager: Arc<ReindexQueueManager>,
    ) -> Self {
        Self {
            repository,
            indexer,
            index_manager,
            queue_manager,
        }
    }

    #[instrument(skip(self, item), fields(element_id = item.id(), site_id = item.site_id()))]
    pub async fn on_item_saved(&self, item: &dyn ContentItem) -> Result<SaveAction, SyncError> {
        let Some(descriptor) = item.descriptor() else {
            return Ok(SaveAction::Ignored);
        };

        match self.indexer.policy().evaluate(item) {
            IndexDecision::Proceed => {
                let id = self.queue_manager.enqueue_job(&descriptor).await?;
                Ok(SaveAction::Enqueued(id))
            }
            IndexDecision::Skip(reason) => {
                info!("{}", reason.message(item.id()));
                let deleted = self.indexer.delete_element(&descriptor).await?;
                Ok(SaveAction::Removed { reason, deleted })
            }
        }
    }

    /// Remove a deleted item's document and pending jobs.
    pub async fn on_item_deleted(&self, descriptor: &IndexableItemDescriptor) -> Result<u64, SyncError> {
        Ok(self.indexer.delete_element(descriptor).await?)
    }

    /// Recreate every partition index and reschedule every indexable item.
    ///
    /// Stale jobs are cleared and new ones enqueued even if some partitions
    /// failed to recreate; the aggregate failure is returned afterwards.
    #[instrument(skip(self))]
    pub async fn on_settings_saved(&self) -> Result<Vec<JobId>, SyncError> {
        let recreated = self.index_manager.recreate_all_partitions().await;
        if let Err(e) = &recreated {
            warn!(error = %e, "Recreating partition indexes failed");
        }

        self.queue_manager.clear_all_jobs().await?;
        let descriptors = self
            .repository
            .list_indexable_descriptors(None, self.indexer.policy())
            .await?;
        let jobs = self.queue_manager.enqueue_jobs(&descriptors).await?;

        recreated?;
        info!(jobs = jobs.len(), "Full reindex scheduled");
        Ok(jobs)
    }

    /// Recreate the given partitions and reschedule their indexable items.
    #[instrument(skip(self))]
    pub async fn reindex_partitions(&self, site_ids: &[i64]) -> Result<ReindexReport, SyncError> {
        let recreate = self.index_manager.recreate_partition_indexes(site_ids).await?;

        self.queue_manager.clear_all_jobs().await?;
        let descriptors = self
            .repository
            .list_indexable_descriptors(Some(site_ids), self.indexer.policy())
            .await?;
        let jobs = self.queue_manager.enqueue_jobs(&descriptors).await?;

        info!(
            partitions = site_ids.len(),
            jobs = jobs.len(),
            "Partition reindex scheduled"
        );
        Ok(ReindexReport {
            recreated: recreate.recreated,
            failures: recreate.failures,
            jobs,
        })
    }

    /// Index one item right away. Failures are returned, not logged away.
    pub async fn reindex_single(
        &self,
        descriptor: &IndexableItemDescriptor,
    ) -> Result<IndexOutcome, SyncError> {
        Ok(self.indexer.index_descriptor(descriptor).await?)
    }
}
