//! Error types for the content index repository.
//!
//! This module provides a unified error type for all search index operations.

mod search_index_error;

pub use search_index_error::{SearchIndexError, MISSING_ATTACHMENT_PROCESSOR_REASON};
