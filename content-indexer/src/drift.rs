//! Sync drift detection.
//!
//! Compares, per partition, the number of indexable items in the content
//! repository with the number of documents in the partition index.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use content_index_repository::SearchIndexService;
use futures::future::try_join_all;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::content::ContentRepository;
use crate::errors::IndexManagementError;
use crate::policy::IndexabilityPolicy;

/// How long a computed sync status stays valid.
pub const SYNC_STATUS_TTL: Duration = Duration::from_secs(300);

/// Process-wide cache of the last computed sync status.
///
/// Concurrent misses may each recompute; the last write wins.
#[derive(Debug)]
pub struct SyncStatusCache {
    ttl: Duration,
    entry: RwLock<Option<(bool, Instant)>>,
}

impl Default for SyncStatusCache {
    fn default() -> Self {
        Self::new(SYNC_STATUS_TTL)
    }
}

impl SyncStatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Option<bool> {
        let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        (*entry).and_then(|(in_sync, stored_at)| (stored_at.elapsed() < self.ttl).then_some(in_sync))
    }

    pub fn set(&self, in_sync: bool) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some((in_sync, Instant::now()));
    }

    pub fn invalidate(&self) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Item and document counts of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSyncStatus {
    pub site_id: i64,
    pub indexable: u64,
    pub indexed: u64,
}

impl PartitionSyncStatus {
    pub fn in_sync(&self) -> bool {
        self.indexable == self.indexed
    }
}

pub struct SyncDriftDetector {
    repository: Arc<dyn ContentRepository>,
    search: Arc<SearchIndexService>,
    policy: IndexabilityPolicy,
    cache: Arc<SyncStatusCache>,
}

impl SyncDriftDetector {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        search: Arc<SearchIndexService>,
        policy: IndexabilityPolicy,
        cache: Arc<SyncStatusCache>,
    ) -> Self {
        Self {
            repository,
            search,
            policy,
            cache,
        }
    }

    /// Whether every partition index holds exactly the indexable items.
    ///
    /// Never errors: an unreachable engine or repository reads as out of
    /// sync and is not cached.
    #[instrument(skip(self))]
    pub async fn is_in_sync(&self) -> bool {
        if let Some(in_sync) = self.cache.get() {
            debug!(in_sync, "Sync status served from cache");
            return in_sync;
        }

        if !self.search.test_connection().await {
            warn!("Search engine unreachable, reporting out of sync");
            return false;
        }

        match self.partition_statuses().await {
            Ok(statuses) => {
                let in_sync = statuses.iter().all(PartitionSyncStatus::in_sync);
                for status in statuses.iter().filter(|s| !s.in_sync()) {
                    info!(
                        site_id = status.site_id,
                        indexable = status.indexable,
                        indexed = status.indexed,
                        "Partition index out of sync"
                    );
                }
                self.cache.set(in_sync);
                in_sync
            }
            Err(e) => {
                warn!(error = %e, "Failed to compute sync status");
                false
            }
        }
    }

    /// Counts for every partition, bypassing the cache.
    pub async fn partition_statuses(&self) -> Result<Vec<PartitionSyncStatus>, IndexManagementError> {
        let partitions = self.repository.partitions().await?;
        try_join_all(partitions.iter().map(|partition| async move {
            let indexable = self
                .repository
                .count_indexable(partition.site_id, &self.policy)
                .await?;
            let indexed = self.search.count_documents(partition.site_id).await?;
            Ok::<_, IndexManagementError>(PartitionSyncStatus {
                site_id: partition.site_id,
                indexable,
                indexed,
            })
        }))
        .await
    }
}
