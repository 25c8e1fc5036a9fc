//! Search result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single search result.
///
/// `highlights` holds the highlight fragments of every highlighted field,
/// flattened in field order. `extra` holds the configured extra fields read
/// back from the stored document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub post_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub element_handle: Option<String>,
    pub score: f64,
    pub highlights: Vec<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}
