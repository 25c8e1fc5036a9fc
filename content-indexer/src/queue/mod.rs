//! Reindex job scheduling and execution.

mod backend;
mod job;
mod manager;
mod runner;
mod tracker;
mod worker;

pub use backend::{InMemoryJobQueue, JobQueue, QueueFlavor, QueuedJob};
pub use job::{JobId, ReindexJob};
pub use manager::ReindexQueueManager;
pub use runner::{JobOutcome, ReindexJobRunner};
pub use tracker::{InMemoryJobTracker, JobTracker, TRACKED_JOBS_TTL};
pub use worker::{JobWorker, WorkerConfig, WorkerSummary};
