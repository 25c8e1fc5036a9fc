//! Search index error types.
//!
//! This module defines the unified error type for all search index operations,
//! including both low-level backend errors and engine rejections.

use thiserror::Error;

/// Reason reported by the engine when an ingest pipeline references a
/// processor that is not installed.
pub const MISSING_ATTACHMENT_PROCESSOR_REASON: &str =
    "No processor type exists with name [attachment]";

/// Unified errors from search index operations.
///
/// Used by the `SearchIndexProvider` trait and `SearchIndexService`. Requests
/// the engine answered with a non-success status become `Rejected`, carrying
/// the top-level `error.reason` when the body has one.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., non-positive ids).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to establish connection to the search index backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to index a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create or delete an index.
    #[error("Index management error: {0}")]
    IndexManagementError(String),

    /// Failed to install or remove an ingest pipeline.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Failed to run a search or count request.
    #[error("Search error: {0}")]
    SearchError(String),

    /// Failed to parse response from search index backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search index backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The engine answered with a non-success status.
    #[error("{operation} rejected with status {status}: {}", rejection_detail(.reason, .body))]
    Rejected {
        operation: String,
        status: u16,
        reason: Option<String>,
        body: String,
    },
}

fn rejection_detail<'a>(reason: &'a Option<String>, body: &'a str) -> &'a str {
    reason.as_deref().unwrap_or(body)
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create an index management error.
    pub fn index_management(msg: impl Into<String>) -> Self {
        Self::IndexManagementError(msg.into())
    }

    /// Create a pipeline error.
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::PipelineError(msg.into())
    }

    /// Create a search error.
    pub fn search(msg: impl Into<String>) -> Self {
        Self::SearchError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Build a rejection from a response status and raw body.
    ///
    /// The engine reports failures as `{"error": {"reason": ".."}}`; the
    /// reason is extracted when present.
    pub fn rejected(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let reason = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"]["reason"].as_str().map(str::to_string));
        Self::Rejected {
            operation: operation.into(),
            status,
            reason,
            body,
        }
    }

    /// Engine reported reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rejected { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    /// Whether the engine lacks the attachment ingest processor.
    pub fn is_missing_attachment_processor(&self) -> bool {
        self.reason() == Some(MISSING_ATTACHMENT_PROCESSOR_REASON)
    }

    /// Whether the error came from a failure to reach the engine.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_extracts_reason() {
        let body = r#"{"error":{"root_cause":[],"type":"parse_exception","reason":"No processor type exists with name [attachment]"},"status":400}"#;
        let err = SearchIndexError::rejected("put pipeline", 400, body);

        assert_eq!(err.reason(), Some(MISSING_ATTACHMENT_PROCESSOR_REASON));
        assert!(err.is_missing_attachment_processor());
        assert_eq!(
            err.to_string(),
            "put pipeline rejected with status 400: No processor type exists with name [attachment]"
        );
    }

    #[test]
    fn test_rejected_without_json_body() {
        let err = SearchIndexError::rejected("index document", 502, "Bad Gateway");

        assert_eq!(err.reason(), None);
        assert!(!err.is_missing_attachment_processor());
        assert_eq!(
            err.to_string(),
            "index document rejected with status 502: Bad Gateway"
        );
    }

    #[test]
    fn test_other_reason_is_not_missing_processor() {
        let body = r#"{"error":{"reason":"index_not_found_exception"}}"#;
        let err = SearchIndexError::rejected("search", 404, body);
        assert!(!err.is_missing_attachment_processor());
        assert!(!err.is_connection());
    }
}
