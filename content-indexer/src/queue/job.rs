//! Reindex job payloads.

use std::fmt;

use content_index_shared::{ElementType, IndexableItemDescriptor};
use serde::{Deserialize, Serialize};

use crate::errors::QueueError;

/// Opaque job id assigned by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Job that (re)indexes one item.
///
/// The payload only carries the descriptor; content is resolved again when
/// the job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexJob {
    pub element_id: i64,
    pub site_id: i64,
    #[serde(rename = "type")]
    pub element_type: ElementType,
}

impl ReindexJob {
    pub fn descriptor(&self) -> IndexableItemDescriptor {
        IndexableItemDescriptor::new(self.element_id, self.site_id, self.element_type)
    }

    /// Human label shown by queue monitors.
    pub fn description(&self) -> String {
        let label = self.element_type.label();
        let mut chars = label.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!(
            "Index {} #{} (site #{})",
            capitalized, self.element_id, self.site_id
        )
    }

    pub fn to_payload(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::payload(e.to_string()))
    }

    pub fn from_payload(payload: &str) -> Result<Self, QueueError> {
        serde_json::from_str(payload).map_err(|e| QueueError::payload(e.to_string()))
    }
}

impl From<&IndexableItemDescriptor> for ReindexJob {
    fn from(descriptor: &IndexableItemDescriptor) -> Self {
        Self {
            element_id: descriptor.element_id,
            site_id: descriptor.site_id,
            element_type: descriptor.element_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_format() {
        let job = ReindexJob::from(&IndexableItemDescriptor::new(
            42,
            3,
            ElementType::DigitalProduct,
        ));
        assert_eq!(
            job.to_payload().unwrap(),
            r#"{"elementId":42,"siteId":3,"type":"digitalProduct"}"#
        );
        assert_eq!(
            ReindexJob::from_payload(r#"{"elementId":42,"siteId":3,"type":"digitalProduct"}"#)
                .unwrap(),
            job
        );
    }

    #[test]
    fn test_invalid_payload() {
        let err = ReindexJob::from_payload(r#"{"elementId":1,"siteId":1,"type":"category"}"#)
            .unwrap_err();
        assert!(matches!(err, QueueError::Payload(_)));
    }

    #[test]
    fn test_description() {
        let entry = ReindexJob::from(&IndexableItemDescriptor::new(10, 1, ElementType::Entry));
        assert_eq!(entry.description(), "Index Entry #10 (site #1)");

        let digital =
            ReindexJob::from(&IndexableItemDescriptor::new(5, 2, ElementType::DigitalProduct));
        assert_eq!(digital.description(), "Index Digital product #5 (site #2)");
    }
}
