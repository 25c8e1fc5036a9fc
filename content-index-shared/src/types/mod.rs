//! Core data structures used across the content index pipeline.

pub mod descriptor;
pub mod index_document;
pub mod partition;
pub mod search_hit;

pub use descriptor::{ElementType, IndexableItemDescriptor};
pub use index_document::IndexDocument;
pub use partition::Partition;
pub use search_hit::SearchHit;
