//! # Content Index Repository
//!
//! This crate provides traits and implementations for interacting with the
//! search engine that holds the per-site content indexes. It includes
//! definitions for errors, interfaces, index mappings, a concrete
//! implementation for OpenSearch and an in-memory engine.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod service;

pub use config::SearchIndexServiceConfig;
pub use errors::{SearchIndexError, MISSING_ATTACHMENT_PROCESSOR_REASON};
pub use interfaces::SearchIndexProvider;
pub use memory::InMemorySearchProvider;
pub use opensearch::{OpenSearchConfig, OpenSearchProvider};
pub use service::SearchIndexService;
