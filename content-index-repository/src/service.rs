//! Search index service implementation.
//!
//! This module provides the main service for interacting with the search index.
//! Application code addresses partitions by site id and documents by element
//! id; the service maps those onto index names and validates them before
//! delegating to a `SearchIndexProvider`.

use std::sync::Arc;

use content_index_shared::IndexDocument;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::SearchIndexServiceConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::attachment_pipeline;

/// The main service for interacting with the search index.
///
/// This is the high-level API that application code should use. It provides
/// input validation, partition naming and delegates to a `SearchIndexProvider`
/// for actual backend operations.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use content_index_repository::{SearchIndexService, SearchIndexServiceConfig};
/// use content_index_repository::opensearch::{OpenSearchConfig, OpenSearchProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = Arc::new(OpenSearchProvider::new(OpenSearchConfig::new("http://localhost:9200"))?);
/// let service = SearchIndexService::new(provider, SearchIndexServiceConfig::default());
///
/// let indexed = service.count_documents(1).await?;
/// # Ok(())
/// # }
/// ```
pub struct SearchIndexService {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchIndexServiceConfig,
}

impl SearchIndexService {
    /// Create a new SearchIndexService.
    ///
    /// # Arguments
    ///
    /// * `provider` - A shared implementation of `SearchIndexProvider` (e.g., `OpenSearchProvider`)
    /// * `config` - Index naming and pipeline configuration
    pub fn new(provider: Arc<dyn SearchIndexProvider>, config: SearchIndexServiceConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &SearchIndexServiceConfig {
        &self.config
    }

    /// Get the index name of a partition.
    pub fn index_name(&self, site_id: i64) -> String {
        self.config.index.index_name(site_id)
    }

    fn validate_id(field_name: &str, value: i64) -> Result<(), SearchIndexError> {
        if value <= 0 {
            return Err(SearchIndexError::validation(format!(
                "{} must be positive, got {}",
                field_name, value
            )));
        }
        Ok(())
    }

    /// Probe the engine.
    ///
    /// # Returns
    ///
    /// `true` if the engine answered the node info request.
    pub async fn test_connection(&self) -> bool {
        match self.provider.node_info().await {
            Ok(info) => {
                debug!(node = %info["name"], "Search engine reachable");
                true
            }
            Err(e) => {
                debug!(error = %e, "Search engine unreachable");
                false
            }
        }
    }

    /// Fetch the engine's node information.
    pub async fn node_info(&self) -> Result<Value, SearchIndexError> {
        self.provider.node_info().await
    }

    pub async fn index_exists(&self, site_id: i64) -> Result<bool, SearchIndexError> {
        Self::validate_id("site_id", site_id)?;
        self.provider.index_exists(&self.index_name(site_id)).await
    }

    /// Create the partition index with the given settings and mappings.
    pub async fn create_index(&self, site_id: i64, body: &Value) -> Result<(), SearchIndexError> {
        Self::validate_id("site_id", site_id)?;
        self.provider
            .create_index(&self.index_name(site_id), body)
            .await
    }

    /// Drop the partition index. Absent indexes are ignored.
    pub async fn delete_index(&self, site_id: i64) -> Result<(), SearchIndexError> {
        Self::validate_id("site_id", site_id)?;
        self.provider.delete_index(&self.index_name(site_id)).await
    }

    /// Replace the attachment ingest pipeline.
    ///
    /// The previous definition is removed first so a changed definition
    /// always takes effect.
    pub async fn install_pipeline(&self) -> Result<(), SearchIndexError> {
        let id = self.config.pipeline.as_str();
        self.provider.delete_pipeline(id).await?;
        self.provider.put_pipeline(id, &attachment_pipeline()).await
    }

    pub async fn document_exists(
        &self,
        site_id: i64,
        element_id: i64,
    ) -> Result<bool, SearchIndexError> {
        Self::validate_id("site_id", site_id)?;
        Self::validate_id("element_id", element_id)?;
        self.provider
            .document_exists(&self.index_name(site_id), &element_id.to_string())
            .await
    }

    /// Write a document through the attachment pipeline.
    ///
    /// # Arguments
    ///
    /// * `site_id` - Partition the document belongs to
    /// * `document` - Document to write; its element id becomes the document id
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was written
    /// * `Err(SearchIndexError)` - If validation, serialization or the write fails
    #[instrument(skip(self, document), fields(element_id = document.element_id))]
    pub async fn insert_document(
        &self,
        site_id: i64,
        document: &IndexDocument,
    ) -> Result<(), SearchIndexError> {
        Self::validate_id("site_id", site_id)?;
        Self::validate_id("element_id", document.element_id)?;

        let body = serde_json::to_value(document)
            .map_err(|e| SearchIndexError::serialization(e.to_string()))?;

        self.provider
            .index_document(
                &self.index_name(site_id),
                &document.document_id(),
                &body,
                Some(self.config.pipeline.as_str()),
            )
            .await
    }

    /// Delete a document.
    ///
    /// # Returns
    ///
    /// The number of documents removed (0 or 1).
    pub async fn delete_document(
        &self,
        site_id: i64,
        element_id: i64,
    ) -> Result<u64, SearchIndexError> {
        Self::validate_id("site_id", site_id)?;
        Self::validate_id("element_id", element_id)?;

        let removed = self
            .provider
            .delete_document(&self.index_name(site_id), &element_id.to_string())
            .await?;
        Ok(u64::from(removed))
    }

    /// Count the documents of a partition. Missing indexes count as empty.
    pub async fn count_documents(&self, site_id: i64) -> Result<u64, SearchIndexError> {
        Self::validate_id("site_id", site_id)?;
        self.provider.count(&self.index_name(site_id)).await
    }

    /// Run a raw search request against a partition.
    pub async fn search(&self, site_id: i64, body: &Value) -> Result<Value, SearchIndexError> {
        Self::validate_id("site_id", site_id)?;
        self.provider.search(&self.index_name(site_id), body).await
    }
}
