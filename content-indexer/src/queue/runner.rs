//! Execution of reindex jobs.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::job::{JobId, ReindexJob};
use super::manager::ReindexQueueManager;
use crate::errors::{IndexerError, SyncError};
use crate::indexer::{ElementIndexer, IndexOutcome};
use crate::policy::SkipReason;

/// What a finished job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Indexed,
    Skipped(SkipReason),
    /// The item could not be resolved anymore; nothing was done.
    ContentGone,
}

pub struct ReindexJobRunner {
    indexer: Arc<ElementIndexer>,
    queue_manager: Arc<ReindexQueueManager>,
}

impl ReindexJobRunner {
    pub fn new(indexer: Arc<ElementIndexer>, queue_manager: Arc<ReindexQueueManager>) -> Self {
        Self {
            indexer,
            queue_manager,
        }
    }

    /// Run a job.
    ///
    /// Content is resolved fresh. A resolution failure completes the job as a
    /// no-op; any other failure leaves the job tracked for the queue's retry
    /// policy.
    #[instrument(skip(self, job), fields(job_id = %id, description = %job.description()))]
    pub async fn execute(&self, id: JobId, job: &ReindexJob) -> Result<JobOutcome, IndexerError> {
        let outcome = match self.indexer.index_descriptor(&job.descriptor()).await {
            Ok(IndexOutcome::Indexed) => JobOutcome::Indexed,
            Ok(IndexOutcome::Skipped(reason)) => JobOutcome::Skipped(reason),
            Err(IndexerError::Resolve(e)) => {
                warn!(error = %e, "Could not resolve element, skipping job");
                JobOutcome::ContentGone
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.queue_manager.job_completed(id).await {
            warn!(error = %e, "Failed to untrack completed job");
        }
        info!(outcome = ?outcome, "Job finished");
        Ok(outcome)
    }

    /// Decode a raw queue payload and run it.
    pub async fn execute_payload(&self, id: JobId, payload: &str) -> Result<JobOutcome, SyncError> {
        let job = ReindexJob::from_payload(payload)?;
        Ok(self.execute(id, &job).await?)
    }
}
