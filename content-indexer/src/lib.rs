//! # Content Indexer
//!
//! Keeps per-site search indexes in sync with a content repository.
//!
//! ## Architecture
//!
//! Repository events flow through an indexability policy and end up either
//! as queued reindex jobs or as immediate document deletions:
//!
//! 1. **Policy**: Decides whether an item belongs in its partition index
//! 2. **Queue**: Schedules reindex jobs and tracks the outstanding ones
//! 3. **Indexer**: Extracts content and writes one document per item
//! 4. **Index manager**: Creates and recreates partition indexes
//! 5. **Drift detector**: Compares indexable item counts with document counts
//!
//! ## Modules
//!
//! - [`config`]: Settings and dependency wiring
//! - [`content`]: Content repository seam
//! - [`policy`]: Indexability rules
//! - [`extractor`]: Content extraction from previews, files or callbacks
//! - [`indexer`]: Indexes and deletes single items
//! - [`index_manager`]: Partition index lifecycle
//! - [`queue`]: Reindex jobs, queue, tracker and worker
//! - [`drift`]: Sync drift detection
//! - [`search`]: Full-text search over a partition
//! - [`coordinator`]: Reactions to repository and settings events
//! - [`diagnostics`]: Operator-facing events
//! - [`errors`]: Error types for the indexer

pub mod config;
pub mod content;
pub mod coordinator;
pub mod diagnostics;
pub mod drift;
pub mod errors;
pub mod extractor;
pub mod index_manager;
pub mod indexer;
pub mod policy;
pub mod queue;
pub mod search;
pub mod strategies;

pub use config::{Dependencies, Pipeline, Settings};
pub use coordinator::{SaveAction, SyncCoordinator};
pub use errors::{ConfigError, IndexManagementError, IndexerError, QueueError, SyncError};
pub use indexer::{ElementIndexer, IndexOutcome};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Partition provisioning error.
    #[error("Index management error: {0}")]
    IndexManagement(#[from] IndexManagementError),
}
