//! Indexability policy.
//!
//! Decides whether a content item belongs in its partition index. Skips are
//! values, never errors.

use std::collections::BTreeSet;
use std::fmt;

use content_index_shared::ElementType;

use crate::content::ContentItem;

/// Why an item is not indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedType,
    NotEnabledForSite { site_id: i64 },
    NoContent,
    NoUrl,
    Blacklisted { element_type: ElementType, handle: String },
    NoTemplate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedType => {
                f.write_str("it is not an entry, an asset, a product or a digital product")
            }
            SkipReason::NotEnabledForSite { site_id } => {
                write!(f, "it is not enabled for the current site (#{})", site_id)
            }
            SkipReason::NoContent => f.write_str("it has no content"),
            SkipReason::NoUrl => f.write_str("it has no URL"),
            SkipReason::Blacklisted {
                element_type: ElementType::Asset,
                handle,
            } => write!(f, "it is in a blacklisted asset volume ({})", handle),
            SkipReason::Blacklisted { handle, .. } => {
                write!(f, "it is in a blacklisted entry type ({})", handle)
            }
            SkipReason::NoTemplate => f.write_str("it doesn't have a template"),
        }
    }
}

impl SkipReason {
    /// Full log message for an element.
    pub fn message(&self, element_id: i64) -> String {
        format!("Not indexing element #{} since {}.", element_id, self)
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDecision {
    Proceed,
    Skip(SkipReason),
}

/// Blacklist-driven indexability rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexabilityPolicy {
    blacklisted_entry_types: BTreeSet<String>,
    blacklisted_asset_volumes: BTreeSet<String>,
}

impl IndexabilityPolicy {
    pub fn new<E, A>(blacklisted_entry_types: E, blacklisted_asset_volumes: A) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            blacklisted_entry_types: blacklisted_entry_types.into_iter().map(Into::into).collect(),
            blacklisted_asset_volumes: blacklisted_asset_volumes
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }

    pub fn blacklisted_entry_types(&self) -> &BTreeSet<String> {
        &self.blacklisted_entry_types
    }

    pub fn blacklisted_asset_volumes(&self) -> &BTreeSet<String> {
        &self.blacklisted_asset_volumes
    }

    /// Whether a group handle is blacklisted for the given kind.
    ///
    /// Only entry types and asset volumes can be blacklisted.
    pub fn is_blacklisted(&self, element_type: ElementType, handle: &str) -> bool {
        match element_type {
            ElementType::Entry => self.blacklisted_entry_types.contains(handle),
            ElementType::Asset => self.blacklisted_asset_volumes.contains(handle),
            ElementType::Product | ElementType::DigitalProduct => false,
        }
    }

    /// Check an item. The first failing check wins.
    pub fn evaluate(&self, item: &dyn ContentItem) -> IndexDecision {
        let Some(element_type) = item.element_type() else {
            return IndexDecision::Skip(SkipReason::UnsupportedType);
        };
        if !item.enabled_for_site() {
            return IndexDecision::Skip(SkipReason::NotEnabledForSite {
                site_id: item.site_id(),
            });
        }
        if !item.has_content() {
            return IndexDecision::Skip(SkipReason::NoContent);
        }
        if item.url().map_or(true, |url| url.is_empty()) {
            return IndexDecision::Skip(SkipReason::NoUrl);
        }
        if let Some(handle) = item.group_handle() {
            if self.is_blacklisted(element_type, &handle) {
                return IndexDecision::Skip(SkipReason::Blacklisted {
                    element_type,
                    handle,
                });
            }
        }
        IndexDecision::Proceed
    }
}
