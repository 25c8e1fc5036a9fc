//! Side cache of outstanding job ids.
//!
//! All ids live in one entry with a TTL that is refreshed on every write.
//! Updates are read-modify-write with last-write-wins; a lost update leaves
//! at worst a stale id that expires with the entry.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::job::JobId;
use crate::errors::QueueError;

/// Lifetime of the tracked-job entry.
pub const TRACKED_JOBS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait JobTracker: Send + Sync {
    /// Currently tracked ids, empty once the entry expired.
    async fn tracked(&self) -> Result<BTreeSet<JobId>, QueueError>;

    async fn track(&self, ids: &[JobId]) -> Result<(), QueueError>;

    async fn untrack(&self, id: JobId) -> Result<(), QueueError>;

    async fn clear(&self) -> Result<(), QueueError>;
}

#[derive(Debug)]
struct Entry {
    ids: BTreeSet<JobId>,
    written_at: Instant,
}

#[derive(Debug)]
pub struct InMemoryJobTracker {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl Default for InMemoryJobTracker {
    fn default() -> Self {
        Self::new(TRACKED_JOBS_TTL)
    }
}

impl InMemoryJobTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    fn live(&self, entry: &Option<Entry>) -> BTreeSet<JobId> {
        match entry {
            Some(e) if e.written_at.elapsed() < self.ttl => e.ids.clone(),
            _ => BTreeSet::new(),
        }
    }
}

#[async_trait]
impl JobTracker for InMemoryJobTracker {
    async fn tracked(&self) -> Result<BTreeSet<JobId>, QueueError> {
        let entry = self.entry.lock().await;
        Ok(self.live(&entry))
    }

    async fn track(&self, ids: &[JobId]) -> Result<(), QueueError> {
        let mut entry = self.entry.lock().await;
        let mut current = self.live(&entry);
        current.extend(ids.iter().copied());
        *entry = Some(Entry {
            ids: current,
            written_at: Instant::now(),
        });
        Ok(())
    }

    async fn untrack(&self, id: JobId) -> Result<(), QueueError> {
        let mut entry = self.entry.lock().await;
        let mut current = self.live(&entry);
        if current.remove(&id) {
            *entry = Some(Entry {
                ids: current,
                written_at: Instant::now(),
            });
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), QueueError> {
        *self.entry.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_track_and_untrack() {
        let tracker = InMemoryJobTracker::default();
        tracker.track(&[JobId(1), JobId(2)]).await.unwrap();
        tracker.track(&[JobId(3)]).await.unwrap();
        tracker.untrack(JobId(2)).await.unwrap();

        let ids: Vec<JobId> = tracker.tracked().await.unwrap().into_iter().collect();
        assert_eq!(ids, vec![JobId(1), JobId(3)]);

        tracker.clear().await.unwrap();
        assert!(tracker.tracked().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_and_writes_refresh_it() {
        let tracker = InMemoryJobTracker::new(Duration::from_secs(60));
        tracker.track(&[JobId(1)]).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        tracker.track(&[JobId(2)]).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(tracker.tracked().await.unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(tracker.tracked().await.unwrap().is_empty());
    }
}
