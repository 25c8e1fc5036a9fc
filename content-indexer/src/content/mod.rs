//! Content repository seam.
//!
//! The indexer never looks at concrete content kinds. Items are exposed
//! through the [`ContentItem`] capability trait and resolved by a
//! [`ContentRepository`], which owns all type-specific lookup.

mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use content_index_shared::{ElementType, IndexableItemDescriptor, Partition};
use serde_json::Value;

use crate::errors::ResolveError;
use crate::policy::IndexabilityPolicy;

pub use memory::{InMemoryContentRepository, StaticContentItem};

/// How the indexable payload of an item can be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPath {
    /// Token-scoped preview URL rendering the item through its template.
    Preview(String),
    /// Stored file bytes, `None` when the file cannot be read.
    File(Option<Vec<u8>>),
    /// Nothing renders the item.
    Unrenderable,
}

/// Read-only view of a content item.
pub trait ContentItem: Send + Sync + fmt::Debug {
    fn id(&self) -> i64;

    fn site_id(&self) -> i64;

    /// Indexable kind of the item, `None` for anything else.
    fn element_type(&self) -> Option<ElementType>;

    fn enabled_for_site(&self) -> bool;

    /// Whether the item carries renderable content (e.g. entries whose
    /// section has URLs).
    fn has_content(&self) -> bool;

    fn url(&self) -> Option<String>;

    fn title(&self) -> String;

    fn post_date(&self) -> Option<DateTime<Utc>>;

    fn expiry_date(&self) -> Option<DateTime<Utc>>;

    fn date_created(&self) -> Option<DateTime<Utc>>;

    /// Entry type handle for entries, volume handle for assets.
    fn group_handle(&self) -> Option<String>;

    fn render_path(&self) -> RenderPath;

    /// Arbitrary attribute lookup used by extra-field resolvers.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Descriptor of the item, if it is of an indexable kind.
    fn descriptor(&self) -> Option<IndexableItemDescriptor> {
        self.element_type()
            .map(|t| IndexableItemDescriptor::new(self.id(), self.site_id(), t))
    }
}

/// Source of content items and partitions.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Resolve a descriptor to a fresh content item.
    ///
    /// # Returns
    ///
    /// * `Ok(item)` - The item as currently stored
    /// * `Err(ResolveError::NotFound)` - If the item no longer exists
    /// * `Err(ResolveError::UnexpectedType)` - If the stored item is of another kind
    /// * `Err(ResolveError::UnsupportedType)` - If the kind is not served by this repository
    async fn resolve(
        &self,
        descriptor: &IndexableItemDescriptor,
    ) -> Result<Arc<dyn ContentItem>, ResolveError>;

    /// All partitions (sites) with their language tags.
    async fn partitions(&self) -> Result<Vec<Partition>, ResolveError>;

    /// Descriptors of every indexable item of the given sites, or of all
    /// sites when `site_ids` is `None`.
    ///
    /// "Indexable" applies the policy's predicates as a bulk query.
    async fn list_indexable_descriptors(
        &self,
        site_ids: Option<&[i64]>,
        policy: &IndexabilityPolicy,
    ) -> Result<Vec<IndexableItemDescriptor>, ResolveError>;

    /// Number of indexable items of a site, with the same predicates as
    /// `list_indexable_descriptors`.
    async fn count_indexable(
        &self,
        site_id: i64,
        policy: &IndexabilityPolicy,
    ) -> Result<u64, ResolveError>;
}
