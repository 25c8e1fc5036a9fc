//! OpenSearch index configuration and mappings.
//!
//! This module defines partition index naming, the language analyzer table,
//! the index settings and mappings, and the attachment ingest pipeline.

use serde_json::{json, Map, Value};

/// The base name of every partition index.
pub const INDEX_NAME: &str = "site-content";

/// Id of the ingest pipeline that extracts text from the `content` field.
pub const ATTACHMENT_PIPELINE: &str = "attachment";

/// Analyzer used when the partition language has no dedicated analyzer.
pub const DEFAULT_ANALYZER: &str = "standard";

/// Maximum length of the index name prefix.
pub const MAX_PREFIX_LEN: usize = 5;

/// Configuration for partition index naming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexConfig {
    /// Optional lowercase prefix prepended to every index name.
    pub prefix: Option<String>,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Optional index name prefix (empty strings are treated as none)
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Get the index name of a partition.
    ///
    /// # Returns
    ///
    /// The index name (e.g., "site-content_1" or "dev_site-content_1")
    pub fn index_name(&self, site_id: i64) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}_{}", prefix, INDEX_NAME, site_id),
            None => format!("{}_{}", INDEX_NAME, site_id),
        }
    }

    /// Check that the prefix is at most 5 lowercase ASCII letters.
    pub fn is_valid_prefix(prefix: &str) -> bool {
        !prefix.is_empty()
            && prefix.len() <= MAX_PREFIX_LEN
            && prefix.chars().all(|c| c.is_ascii_lowercase())
    }
}

/// Get the analyzer for a language tag.
///
/// The full tag is looked up first, then the part before the first `-`.
/// Unknown languages use the `standard` analyzer.
pub fn analyzer_for_language(language: &str) -> &'static str {
    if let Some(analyzer) = lookup_analyzer(language) {
        return analyzer;
    }
    language
        .split('-')
        .next()
        .and_then(lookup_analyzer)
        .unwrap_or(DEFAULT_ANALYZER)
}

fn lookup_analyzer(tag: &str) -> Option<&'static str> {
    let analyzer = match tag {
        "ar" => "arabic",
        "hy" => "armenian",
        "eu" => "basque",
        "bn" => "bengali",
        "pt-BR" => "brazilian",
        "bg" => "bulgarian",
        "ca" => "catalan",
        "cs" => "czech",
        "da" => "danish",
        "nl" => "dutch",
        "pl" => "stempel",
        "en" => "english",
        "fi" => "finnish",
        "fr" => "french",
        "gl" => "galician",
        "de" => "german",
        "el" => "greek",
        "hi" => "hindi",
        "hu" => "hungarian",
        "id" => "indonesian",
        "ga" => "irish",
        "it" => "italian",
        "ja" | "ko" | "zh" => "cjk",
        "lv" => "latvian",
        "lt" => "lithuanian",
        "nb" => "norwegian",
        "fa" => "persian",
        "pt" => "portuguese",
        "ro" => "romanian",
        "ru" => "russian",
        "es" => "spanish",
        "sv" => "swedish",
        "tr" => "turkish",
        "th" => "thai",
        _ => return None,
    };
    Some(analyzer)
}

/// Get the index settings and mappings for a partition index.
///
/// `title`, `content` and `attachment.content` are analyzed with the
/// partition analyzer. Extra field mappings are merged into the top-level
/// properties without overriding the built-in fields.
///
/// # Arguments
///
/// * `analyzer` - Analyzer name from [`analyzer_for_language`]
/// * `extra_mappings` - Field name to mapping for the configured extra fields
pub fn get_index_settings(analyzer: &str, extra_mappings: &Map<String, Value>) -> Value {
    let mut properties = json!({
        "title": {
            "type": "text",
            "analyzer": analyzer,
            "store": true
        },
        "url": {
            "type": "text",
            "store": true
        },
        "elementHandle": {
            "type": "keyword",
            "store": true
        },
        "postDate": {
            "type": "date",
            "store": true
        },
        "noPostDate": {
            "type": "boolean",
            "store": true
        },
        "expiryDate": {
            "type": "date",
            "store": true
        },
        "noExpiryDate": {
            "type": "boolean",
            "store": true
        },
        "content": {
            "type": "text",
            "analyzer": analyzer
        },
        "attachment": {
            "properties": {
                "content": {
                    "type": "text",
                    "analyzer": analyzer,
                    "store": true
                }
            }
        }
    });

    if let Some(map) = properties.as_object_mut() {
        for (name, mapping) in extra_mappings {
            map.entry(name.clone()).or_insert_with(|| mapping.clone());
        }
    }

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": properties
        }
    })
}

/// Get the body of the attachment ingest pipeline.
///
/// Extracts text from the base64 `content` field into `attachment.content`
/// without a character limit, then drops the raw field.
pub fn attachment_pipeline() -> Value {
    json!({
        "description": "Extract attachment information",
        "processors": [
            {
                "attachment": {
                    "field": "content",
                    "target_field": "attachment",
                    "indexed_chars": -1,
                    "ignore_missing": true
                }
            },
            {
                "remove": {
                    "field": "content"
                }
            }
        ]
    })
}
