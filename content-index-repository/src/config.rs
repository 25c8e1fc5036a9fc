//! Configuration types for the SearchIndexService.

use crate::opensearch::index_config::ATTACHMENT_PIPELINE;
use crate::opensearch::IndexConfig;

/// Configuration for the SearchIndexService.
///
/// Controls how partitions map onto index names and which ingest pipeline
/// documents are written through.
#[derive(Debug, Clone)]
pub struct SearchIndexServiceConfig {
    /// Index naming (prefix).
    pub index: IndexConfig,
    /// Ingest pipeline id used for every document write.
    pub pipeline: String,
}

impl Default for SearchIndexServiceConfig {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl SearchIndexServiceConfig {
    /// Create a config writing through the `attachment` pipeline.
    ///
    /// # Arguments
    ///
    /// * `index` - Index naming configuration
    pub fn new(index: IndexConfig) -> Self {
        Self {
            index,
            pipeline: ATTACHMENT_PIPELINE.to_string(),
        }
    }
}
