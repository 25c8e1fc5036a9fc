//! Item descriptors.
//!
//! A descriptor is the minimal reference needed to re-resolve a content item
//! later, typically from a queued reindex job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of content item that can be indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementType {
    Entry,
    Asset,
    Product,
    DigitalProduct,
}

impl ElementType {
    /// Handle stored in the `elementHandle` field of indexed documents.
    pub fn handle(&self) -> &'static str {
        match self {
            ElementType::Entry => "entry",
            ElementType::Asset => "asset",
            ElementType::Product => "product",
            ElementType::DigitalProduct => "digitalProduct",
        }
    }

    /// Human readable label used in job descriptions and log messages.
    pub fn label(&self) -> &'static str {
        match self {
            ElementType::Entry => "entry",
            ElementType::Asset => "asset",
            ElementType::Product => "product",
            ElementType::DigitalProduct => "digital product",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.handle())
    }
}

/// Error returned when a string does not name a known element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseElementTypeError(pub String);

impl fmt::Display for ParseElementTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown element type: {}", self.0)
    }
}

impl std::error::Error for ParseElementTypeError {}

impl FromStr for ElementType {
    type Err = ParseElementTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(ElementType::Entry),
            "asset" => Ok(ElementType::Asset),
            "product" => Ok(ElementType::Product),
            "digitalProduct" => Ok(ElementType::DigitalProduct),
            other => Err(ParseElementTypeError(other.to_string())),
        }
    }
}

/// Reference to a content item in a given site.
///
/// Serialized as `{"elementId": .., "siteId": .., "type": ".."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexableItemDescriptor {
    pub element_id: i64,
    pub site_id: i64,
    #[serde(rename = "type")]
    pub element_type: ElementType,
}

impl IndexableItemDescriptor {
    pub fn new(element_id: i64, site_id: i64, element_type: ElementType) -> Self {
        Self {
            element_id,
            site_id,
            element_type,
        }
    }
}

impl fmt::Display for IndexableItemDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} (site #{})",
            self.element_type.label(),
            self.element_id,
            self.site_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_wire_format() {
        let descriptor = IndexableItemDescriptor::new(10, 1, ElementType::DigitalProduct);
        let json = serde_json::to_value(descriptor).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"elementId": 10, "siteId": 1, "type": "digitalProduct"})
        );

        let back: IndexableItemDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result: Result<IndexableItemDescriptor, _> =
            serde_json::from_str(r#"{"elementId": 1, "siteId": 1, "type": "category"}"#);
        assert!(result.is_err());
        assert!("category".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_handle_parses_back() {
        for element_type in [
            ElementType::Entry,
            ElementType::Asset,
            ElementType::Product,
            ElementType::DigitalProduct,
        ] {
            assert_eq!(element_type.handle().parse::<ElementType>(), Ok(element_type));
        }
    }

    #[test]
    fn test_display() {
        let descriptor = IndexableItemDescriptor::new(42, 3, ElementType::Entry);
        assert_eq!(descriptor.to_string(), "entry #42 (site #3)");
    }
}
