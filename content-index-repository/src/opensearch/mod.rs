//! OpenSearch implementation of the search index provider.
//!
//! This module provides a concrete implementation of `SearchIndexProvider`
//! using OpenSearch as the backend, plus the index naming, mappings and
//! ingest pipeline definitions shared by every backend.

pub mod index_config;
mod provider;

pub use index_config::IndexConfig;
pub use provider::{OpenSearchConfig, OpenSearchProvider};
