//! Index partitions.

use serde::{Deserialize, Serialize};

/// A site served by the content repository.
///
/// Every partition gets its own search index, analyzed with the language
/// configured for the site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub site_id: i64,
    /// Language tag such as `en`, `pt-BR` or `zh-Hant`.
    pub language: String,
}

impl Partition {
    pub fn new(site_id: i64, language: impl Into<String>) -> Self {
        Self {
            site_id,
            language: language.into(),
        }
    }
}
