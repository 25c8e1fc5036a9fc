//! # Content Index Shared
//!
//! This crate defines the data structures shared by the content index
//! synchronization pipeline: item descriptors, partitions, the document stored
//! in the search engine and the search hits read back from it.

pub mod types;

pub use types::descriptor::{ElementType, IndexableItemDescriptor, ParseElementTypeError};
pub use types::index_document::IndexDocument;
pub use types::partition::Partition;
pub use types::search_hit::SearchHit;
