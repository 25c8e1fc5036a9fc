//! Error types for the content indexer.

use content_index_repository::SearchIndexError;
use content_index_shared::ElementType;
use thiserror::Error;

use crate::queue::JobId;

/// Errors raised while turning a descriptor back into a content item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No item with that id exists in the site.
    #[error("Element #{element_id} (site #{site_id}) not found (type: {element_type})")]
    NotFound {
        element_id: i64,
        site_id: i64,
        element_type: ElementType,
    },

    /// The item exists but is not of an indexable kind, or not of the requested one.
    #[error("Unexpected type ({found}) for element #{element_id} (site #{site_id}).")]
    UnexpectedType {
        element_id: i64,
        site_id: i64,
        found: String,
    },

    /// The repository cannot serve this kind of item (e.g. commerce products
    /// without the commerce extension).
    #[error("Element #{element_id} (site #{site_id}) is a {element_type} but the repository does not support that type.")]
    UnsupportedType {
        element_id: i64,
        site_id: i64,
        element_type: ElementType,
    },

    /// The repository itself failed.
    #[error("Content repository error: {0}")]
    Repository(String),
}

impl ResolveError {
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

/// Errors raised while extracting indexable content.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// The preview request failed before a response was received.
    #[error("Failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The preview answered with an error status.
    #[error("Fetching {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// A content callback failed.
    #[error("Content callback failed: {0}")]
    Callback(String),
}

impl ExtractError {
    pub fn callback(msg: impl Into<String>) -> Self {
        Self::Callback(msg.into())
    }
}

/// Errors from partition index management.
#[derive(Error, Debug)]
pub enum IndexManagementError {
    /// The site is not one of the repository's partitions.
    #[error("Unknown partition: site #{0}")]
    UnknownPartition(i64),

    #[error(transparent)]
    Search(#[from] SearchIndexError),

    #[error(transparent)]
    Repository(#[from] ResolveError),

    /// One or more partitions could not be recreated.
    #[error("Failed to recreate {} partition index(es): {}", .failures.len(), describe_failures(.failures))]
    RecreateFailed { failures: Vec<(i64, String)> },
}

fn describe_failures(failures: &[(i64, String)]) -> String {
    failures
        .iter()
        .map(|(site_id, error)| format!("site #{}: {}", site_id, error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from indexing or deleting a single item.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Failed to persist document: {0}")]
    Persistence(#[from] SearchIndexError),

    #[error(transparent)]
    IndexManagement(#[from] IndexManagementError),
}

/// Errors from the job queue and job tracking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue cannot perform this operation for its flavor.
    #[error("Queue does not support {0}")]
    Unsupported(&'static str),

    /// No job with that id is queued.
    #[error("Job {0} not found")]
    JobNotFound(JobId),

    /// A job payload could not be encoded or decoded.
    #[error("Invalid job payload: {0}")]
    Payload(String),

    /// The queue backend failed.
    #[error("Queue backend error: {0}")]
    Backend(String),
}

impl QueueError {
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Errors from loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid search endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Invalid index name prefix '{0}': expected at most 5 lowercase letters")]
    InvalidPrefix(String),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },

    #[error("Could not connect to the search engine: {0}")]
    Connectivity(String),

    #[error(transparent)]
    Search(#[from] SearchIndexError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl ConfigError {
    pub fn invalid_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Errors from search requests.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Engine(#[from] SearchIndexError),

    #[error(transparent)]
    Partition(#[from] IndexManagementError),
}

/// Errors from multi-step synchronization flows.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    IndexManagement(#[from] IndexManagementError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),
}
