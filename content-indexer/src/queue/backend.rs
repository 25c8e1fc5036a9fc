//! Job queue seam and the in-process queue.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::job::{JobId, ReindexJob};
use crate::errors::QueueError;

/// How jobs can be taken out of a queue before they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueFlavor {
    /// Any job can be removed by id.
    RandomAccess,
    /// Jobs can only be released; the queue drops them when they come up.
    Fifo,
}

/// Asynchronous job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    fn flavor(&self) -> QueueFlavor;

    /// Push a job and return the id the queue assigned to it.
    async fn push(&self, job: &ReindexJob) -> Result<JobId, QueueError>;

    /// Remove a pending job. Only supported by random-access queues.
    async fn remove(&self, id: JobId) -> Result<(), QueueError>;

    /// Release a pending job. Only supported by FIFO queues.
    async fn release(&self, id: JobId) -> Result<(), QueueError>;

    /// Ids of pending jobs with the given payload.
    ///
    /// Queues that cannot inspect payloads find nothing.
    async fn find(&self, _job: &ReindexJob) -> Result<Vec<JobId>, QueueError> {
        Ok(Vec::new())
    }
}

/// A job taken from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: JobId,
    pub payload: String,
    /// Number of failed runs so far.
    pub attempts: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    pending: VecDeque<QueuedJob>,
    released: HashSet<JobId>,
}

/// Queue kept in process memory, consumed by the in-process worker.
#[derive(Debug)]
pub struct InMemoryJobQueue {
    flavor: QueueFlavor,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::with_flavor(QueueFlavor::RandomAccess)
    }

    pub fn with_flavor(flavor: QueueFlavor) -> Self {
        Self {
            flavor,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the next runnable job, if any.
    pub fn pop(&self) -> Option<QueuedJob> {
        let mut state = self.lock();
        while let Some(job) = state.pending.pop_front() {
            if !state.released.remove(&job.id) {
                return Some(job);
            }
        }
        None
    }

    /// Wait for the next runnable job.
    pub async fn next(&self) -> QueuedJob {
        loop {
            if let Some(job) = self.pop() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    /// Put a failed job back at the end of the queue, keeping its id.
    pub fn requeue(&self, mut job: QueuedJob) {
        job.attempts += 1;
        self.lock().pending.push_back(job);
        self.notify.notify_one();
    }

    /// Number of runnable jobs.
    pub fn len(&self) -> usize {
        let state = self.lock();
        state
            .pending
            .iter()
            .filter(|job| !state.released.contains(&job.id))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of runnable jobs in queue order.
    pub fn pending_ids(&self) -> Vec<JobId> {
        let state = self.lock();
        state
            .pending
            .iter()
            .filter(|job| !state.released.contains(&job.id))
            .map(|job| job.id)
            .collect()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn flavor(&self) -> QueueFlavor {
        self.flavor
    }

    async fn push(&self, job: &ReindexJob) -> Result<JobId, QueueError> {
        let payload = job.to_payload()?;
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = JobId(state.next_id);
            state.pending.push_back(QueuedJob {
                id,
                payload,
                attempts: 0,
            });
            id
        };
        self.notify.notify_one();
        Ok(id)
    }

    async fn remove(&self, id: JobId) -> Result<(), QueueError> {
        if self.flavor != QueueFlavor::RandomAccess {
            return Err(QueueError::Unsupported("remove"));
        }
        let mut state = self.lock();
        let position = state
            .pending
            .iter()
            .position(|job| job.id == id)
            .ok_or(QueueError::JobNotFound(id))?;
        state.pending.remove(position);
        Ok(())
    }

    async fn release(&self, id: JobId) -> Result<(), QueueError> {
        if self.flavor != QueueFlavor::Fifo {
            return Err(QueueError::Unsupported("release"));
        }
        let mut state = self.lock();
        let pending = state
            .pending
            .iter()
            .any(|job| job.id == id && !state.released.contains(&id));
        if !pending {
            return Err(QueueError::JobNotFound(id));
        }
        state.released.insert(id);
        Ok(())
    }

    async fn find(&self, job: &ReindexJob) -> Result<Vec<JobId>, QueueError> {
        let state = self.lock();
        Ok(state
            .pending
            .iter()
            .filter(|queued| !state.released.contains(&queued.id))
            .filter(|queued| {
                ReindexJob::from_payload(&queued.payload).is_ok_and(|payload| payload == *job)
            })
            .map(|queued| queued.id)
            .collect())
    }
}
