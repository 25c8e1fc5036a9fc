//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch,
//! an in-memory engine for tests).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchIndexError;

/// Abstracts the underlying search engine.
///
/// Implementations are injected into `SearchIndexService` as
/// `Arc<dyn SearchIndexProvider>`. Index names are passed verbatim; naming
/// partitions is the service's job.
///
/// Operations that target something missing are not errors where the caller
/// only needs the end state: deleting an absent index, pipeline or document
/// succeeds, and counting a missing index yields zero.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Fetch the engine's node information.
    ///
    /// Used as a connectivity probe.
    async fn node_info(&self) -> Result<Value, SearchIndexError>;

    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Create an index with the given settings and mappings body.
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchIndexError>;

    /// Delete an index. Absent indexes are ignored.
    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError>;

    /// Install an ingest pipeline under the given id.
    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<(), SearchIndexError>;

    /// Delete an ingest pipeline. Absent pipelines are ignored.
    async fn delete_pipeline(&self, id: &str) -> Result<(), SearchIndexError>;

    /// Check whether a document exists.
    async fn document_exists(&self, index: &str, id: &str) -> Result<bool, SearchIndexError>;

    /// Write a document, optionally through an ingest pipeline.
    ///
    /// # Arguments
    ///
    /// * `index` - Target index name
    /// * `id` - Document id
    /// * `body` - Document source
    /// * `pipeline` - Ingest pipeline id to run on write
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Value,
        pipeline: Option<&str>,
    ) -> Result<(), SearchIndexError>;

    /// Delete a document.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If a document was removed
    /// * `Ok(false)` - If there was nothing to remove
    /// * `Err(SearchIndexError)` - If the deletion fails
    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, SearchIndexError>;

    /// Count the documents of an index.
    async fn count(&self, index: &str) -> Result<u64, SearchIndexError>;

    /// Run a search request and return the raw response body.
    async fn search(&self, index: &str, body: &Value) -> Result<Value, SearchIndexError>;
}
