//! In-memory content repository.
//!
//! Holds a fixed set of partitions and items. The bootstrap binary uses it to
//! provision partition indexes; tests use it as the content source.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use content_index_shared::{ElementType, IndexableItemDescriptor, Partition};
use serde_json::{Map, Value};

use super::{ContentItem, ContentRepository, RenderPath};
use crate::errors::ResolveError;
use crate::policy::{IndexDecision, IndexabilityPolicy};

/// A content item with fixed values.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticContentItem {
    pub id: i64,
    pub site_id: i64,
    pub element_type: Option<ElementType>,
    pub enabled: bool,
    pub has_content: bool,
    pub url: Option<String>,
    pub title: String,
    pub post_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub date_created: Option<DateTime<Utc>>,
    pub group_handle: Option<String>,
    pub render_path: RenderPath,
    pub attributes: Map<String, Value>,
}

impl StaticContentItem {
    pub fn new(id: i64, site_id: i64, element_type: Option<ElementType>) -> Self {
        Self {
            id,
            site_id,
            element_type,
            enabled: true,
            has_content: true,
            url: None,
            title: format!("Element #{}", id),
            post_date: None,
            expiry_date: None,
            date_created: None,
            group_handle: None,
            render_path: RenderPath::Unrenderable,
            attributes: Map::new(),
        }
    }

    pub fn entry(id: i64, site_id: i64) -> Self {
        Self::new(id, site_id, Some(ElementType::Entry))
    }

    pub fn asset(id: i64, site_id: i64) -> Self {
        Self::new(id, site_id, Some(ElementType::Asset))
    }

    pub fn product(id: i64, site_id: i64) -> Self {
        Self::new(id, site_id, Some(ElementType::Product))
    }

    pub fn with_element_type(mut self, element_type: Option<ElementType>) -> Self {
        self.element_type = element_type;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_has_content(mut self, has_content: bool) -> Self {
        self.has_content = has_content;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn without_url(mut self) -> Self {
        self.url = None;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_group_handle(mut self, handle: impl Into<String>) -> Self {
        self.group_handle = Some(handle.into());
        self
    }

    pub fn with_post_date(mut self, date: DateTime<Utc>) -> Self {
        self.post_date = Some(date);
        self
    }

    pub fn with_expiry_date(mut self, date: DateTime<Utc>) -> Self {
        self.expiry_date = Some(date);
        self
    }

    pub fn with_date_created(mut self, date: DateTime<Utc>) -> Self {
        self.date_created = Some(date);
        self
    }

    pub fn with_render_path(mut self, render_path: RenderPath) -> Self {
        self.render_path = render_path;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

impl ContentItem for StaticContentItem {
    fn id(&self) -> i64 {
        self.id
    }

    fn site_id(&self) -> i64 {
        self.site_id
    }

    fn element_type(&self) -> Option<ElementType> {
        self.element_type
    }

    fn enabled_for_site(&self) -> bool {
        self.enabled
    }

    fn has_content(&self) -> bool {
        self.has_content
    }

    fn url(&self) -> Option<String> {
        self.url.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn post_date(&self) -> Option<DateTime<Utc>> {
        self.post_date
    }

    fn expiry_date(&self) -> Option<DateTime<Utc>> {
        self.expiry_date
    }

    fn date_created(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }

    fn group_handle(&self) -> Option<String> {
        self.group_handle.clone()
    }

    fn render_path(&self) -> RenderPath {
        self.render_path.clone()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }
}

/// Content repository kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryContentRepository {
    partitions: RwLock<Vec<Partition>>,
    items: RwLock<BTreeMap<(i64, i64), StaticContentItem>>,
    unsupported: RwLock<HashSet<ElementType>>,
    failing: AtomicBool,
}

impl InMemoryContentRepository {
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self {
            partitions: RwLock::new(partitions),
            ..Self::default()
        }
    }

    /// Insert or replace an item.
    pub fn upsert(&self, item: StaticContentItem) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((item.site_id, item.id), item);
    }

    pub fn remove(&self, site_id: i64, element_id: i64) -> Option<StaticContentItem> {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(site_id, element_id))
    }

    /// Stop serving a kind of item, as when its extension is not installed.
    pub fn disable_type(&self, element_type: ElementType) {
        self.unsupported
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(element_type);
    }

    /// Make every call fail, or recover.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ResolveError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ResolveError::repository("content repository unavailable"))
        } else {
            Ok(())
        }
    }

    fn indexable(
        &self,
        site_ids: Option<&[i64]>,
        policy: &IndexabilityPolicy,
    ) -> Vec<IndexableItemDescriptor> {
        let unsupported = self
            .unsupported
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|item| site_ids.map_or(true, |ids| ids.contains(&item.site_id)))
            .filter(|item| item.element_type.is_some_and(|t| !unsupported.contains(&t)))
            .filter(|item| policy.evaluate(*item) == IndexDecision::Proceed)
            .filter_map(|item| item.descriptor())
            .collect()
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    async fn resolve(
        &self,
        descriptor: &IndexableItemDescriptor,
    ) -> Result<Arc<dyn ContentItem>, ResolveError> {
        self.check_available()?;

        let unsupported = self
            .unsupported
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&descriptor.element_type);
        if unsupported {
            return Err(ResolveError::UnsupportedType {
                element_id: descriptor.element_id,
                site_id: descriptor.site_id,
                element_type: descriptor.element_type,
            });
        }

        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let item = items
            .get(&(descriptor.site_id, descriptor.element_id))
            .ok_or(ResolveError::NotFound {
                element_id: descriptor.element_id,
                site_id: descriptor.site_id,
                element_type: descriptor.element_type,
            })?;

        match item.element_type {
            Some(t) if t == descriptor.element_type => Ok(Arc::new(item.clone())),
            other => Err(ResolveError::UnexpectedType {
                element_id: descriptor.element_id,
                site_id: descriptor.site_id,
                found: other.map_or_else(|| "unknown".to_string(), |t| t.handle().to_string()),
            }),
        }
    }

    async fn partitions(&self) -> Result<Vec<Partition>, ResolveError> {
        self.check_available()?;
        Ok(self
            .partitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn list_indexable_descriptors(
        &self,
        site_ids: Option<&[i64]>,
        policy: &IndexabilityPolicy,
    ) -> Result<Vec<IndexableItemDescriptor>, ResolveError> {
        self.check_available()?;
        Ok(self.indexable(site_ids, policy))
    }

    async fn count_indexable(
        &self,
        site_id: i64,
        policy: &IndexabilityPolicy,
    ) -> Result<u64, ResolveError> {
        self.check_available()?;
        Ok(self.indexable(Some(&[site_id]), policy).len() as u64)
    }
}
