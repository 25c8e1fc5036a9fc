//! Document types for the search index.
//!
//! This module defines the body sent to the search engine for every indexed
//! content item. The `content` field carries the base64 encoded page source
//! and is consumed by the `attachment` ingest pipeline on write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document representation for the search index.
///
/// The document id in the engine is the element id; it is kept out of the
/// serialized body.
///
/// # Fields
///
/// - `element_id`: Engine document id, never serialized
/// - `title`: Item title (searched together with the attachment content)
/// - `url`: Public URL of the item
/// - `element_handle`: Kind of item (`entry`, `asset`, `product`, `digitalProduct`)
/// - `post_date` / `no_post_date`: Publication date and whether it is missing
/// - `expiry_date` / `no_expiry_date`: Expiry date and whether it is missing
/// - `content`: Base64 of the trimmed indexable content
/// - `extra`: Site-specific extra fields, flattened into the body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    #[serde(skip)]
    pub element_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub element_handle: String,
    pub post_date: Option<DateTime<Utc>>,
    pub no_post_date: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub no_expiry_date: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexDocument {
    /// Create a document with no dates, no content and no extra fields.
    ///
    /// # Example
    ///
    /// ```
    /// use content_index_shared::IndexDocument;
    ///
    /// let doc = IndexDocument::new(10, "About us", Some("https://example.com/about".into()), "entry");
    /// assert!(doc.no_post_date);
    /// assert_eq!(doc.document_id(), "10");
    /// ```
    pub fn new(
        element_id: i64,
        title: impl Into<String>,
        url: Option<String>,
        element_handle: impl Into<String>,
    ) -> Self {
        Self {
            element_id,
            title: title.into(),
            url,
            element_handle: element_handle.into(),
            post_date: None,
            no_post_date: true,
            expiry_date: None,
            no_expiry_date: true,
            content: None,
            extra: Map::new(),
        }
    }

    /// Set publication and expiry dates, keeping the `no*` flags consistent.
    pub fn with_dates(
        mut self,
        post_date: Option<DateTime<Utc>>,
        expiry_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.no_post_date = post_date.is_none();
        self.post_date = post_date;
        self.no_expiry_date = expiry_date.is_none();
        self.expiry_date = expiry_date;
        self
    }

    /// Set the base64 encoded content.
    pub fn with_content(mut self, encoded: impl Into<String>) -> Self {
        self.content = Some(encoded.into());
        self
    }

    /// Add an extra field. Reserved keys are not overwritten.
    pub fn with_extra_field(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if !Self::is_reserved_field(&name) {
            self.extra.insert(name, value);
        }
        self
    }

    /// Engine document id.
    pub fn document_id(&self) -> String {
        self.element_id.to_string()
    }

    /// Field names owned by the document itself or by the ingest pipeline.
    pub fn is_reserved_field(name: &str) -> bool {
        matches!(
            name,
            "title"
                | "url"
                | "elementHandle"
                | "postDate"
                | "noPostDate"
                | "expiryDate"
                | "noExpiryDate"
                | "content"
                | "attachment"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_document_has_no_dates() {
        let doc = IndexDocument::new(7, "Title", None, "asset");

        assert_eq!(doc.element_id, 7);
        assert!(doc.post_date.is_none());
        assert!(doc.no_post_date);
        assert!(doc.expiry_date.is_none());
        assert!(doc.no_expiry_date);
        assert!(doc.content.is_none());
    }

    #[test]
    fn test_with_dates_sets_flags() {
        let posted = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let doc = IndexDocument::new(1, "t", None, "entry").with_dates(Some(posted), None);

        assert_eq!(doc.post_date, Some(posted));
        assert!(!doc.no_post_date);
        assert!(doc.no_expiry_date);
    }

    #[test]
    fn test_serialization() {
        let doc = IndexDocument::new(10, "About", Some("https://example.com/about".into()), "entry")
            .with_content("PGgxPkhpPC9oMT4=")
            .with_extra_field("summary", Value::String("short".into()));

        let json = serde_json::to_value(&doc).unwrap();

        assert!(json.get("elementId").is_none());
        assert_eq!(json["title"], "About");
        assert_eq!(json["elementHandle"], "entry");
        assert_eq!(json["noPostDate"], true);
        assert_eq!(json["content"], "PGgxPkhpPC9oMT4=");
        assert_eq!(json["summary"], "short");
    }

    #[test]
    fn test_reserved_extra_fields_are_ignored() {
        let doc = IndexDocument::new(1, "Real title", None, "entry")
            .with_extra_field("title", Value::String("spoofed".into()))
            .with_extra_field("attachment", Value::Null);

        assert!(doc.extra.is_empty());
        assert_eq!(serde_json::to_value(&doc).unwrap()["title"], "Real title");
    }
}
