//! Element indexer.
//!
//! Turns one content item into one partition index document, or removes it.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use content_index_repository::{SearchIndexError, SearchIndexService};
use content_index_shared::{ElementType, IndexDocument, IndexableItemDescriptor};
use tracing::{info, instrument, warn};

use crate::content::{ContentItem, ContentRepository};
use crate::diagnostics::Diagnostics;
use crate::errors::IndexerError;
use crate::extractor::{ContentExtractor, Extraction};
use crate::index_manager::IndexManager;
use crate::policy::{IndexDecision, IndexabilityPolicy, SkipReason};
use crate::queue::ReindexQueueManager;
use crate::strategies::ExtraField;

/// Result of indexing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed,
    Skipped(SkipReason),
}

pub struct ElementIndexer {
    repository: Arc<dyn ContentRepository>,
    search: Arc<SearchIndexService>,
    index_manager: Arc<IndexManager>,
    queue_manager: Arc<ReindexQueueManager>,
    diagnostics: Diagnostics,
    extractor: ContentExtractor,
    policy: IndexabilityPolicy,
    extra_fields: Vec<ExtraField>,
}

impl ElementIndexer {
    /// Create an indexer with an empty blacklist and no extra fields.
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        search: Arc<SearchIndexService>,
        index_manager: Arc<IndexManager>,
        queue_manager: Arc<ReindexQueueManager>,
        diagnostics: Diagnostics,
        extractor: ContentExtractor,
    ) -> Self {
        Self {
            repository,
            search,
            index_manager,
            queue_manager,
            diagnostics,
            extractor,
            policy: IndexabilityPolicy::default(),
            extra_fields: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: IndexabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_extra_fields(mut self, extra_fields: Vec<ExtraField>) -> Self {
        self.extra_fields = extra_fields;
        self
    }

    pub fn policy(&self) -> &IndexabilityPolicy {
        &self.policy
    }

    /// Resolve a descriptor and index the item it points to.
    pub async fn index_descriptor(
        &self,
        descriptor: &IndexableItemDescriptor,
    ) -> Result<IndexOutcome, IndexerError> {
        let item = self.repository.resolve(descriptor).await?;
        self.index_element(item.as_ref()).await
    }

    /// Index an item.
    ///
    /// Skipped items cause no engine writes. An existing document is deleted
    /// before the new one is written, so readers may briefly miss it.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexOutcome::Indexed)` - If the document was written
    /// * `Ok(IndexOutcome::Skipped(reason))` - If the item is not indexable
    /// * `Err(IndexerError)` - If extraction or persistence failed
    #[instrument(skip(self, item), fields(element_id = item.id(), site_id = item.site_id()))]
    pub async fn index_element(&self, item: &dyn ContentItem) -> Result<IndexOutcome, IndexerError> {
        if let IndexDecision::Skip(reason) = self.policy.evaluate(item) {
            info!("{}", reason.message(item.id()));
            return Ok(IndexOutcome::Skipped(reason));
        }
        let Some(element_type) = item.element_type() else {
            return Ok(IndexOutcome::Skipped(SkipReason::UnsupportedType));
        };
        let (site_id, element_id) = (item.site_id(), item.id());

        let exists = self
            .search
            .document_exists(site_id, element_id)
            .await
            .map_err(|e| self.persistence(site_id, e))?;

        let (post_date, expiry_date) = match element_type {
            ElementType::Asset => (item.date_created(), None),
            _ => (item.post_date(), item.expiry_date()),
        };

        let content = match self.extractor.extract(item).await? {
            Extraction::Content(bytes) => STANDARD.encode(bytes.trim_ascii()),
            Extraction::NotIndexable => {
                let reason = SkipReason::NoTemplate;
                info!("{}", reason.message(element_id));
                return Ok(IndexOutcome::Skipped(reason));
            }
        };

        let document = self
            .extra_fields
            .iter()
            .fold(
                IndexDocument::new(element_id, item.title(), item.url(), element_type.handle())
                    .with_dates(post_date, expiry_date)
                    .with_content(content),
                |document, field| document.with_extra_field(field.name.clone(), field.value.resolve(item)),
            );

        self.index_manager.ensure_partition_index(site_id).await?;

        if exists {
            self.search
                .delete_document(site_id, element_id)
                .await
                .map_err(|e| self.persistence(site_id, e))?;
        }
        self.search
            .insert_document(site_id, &document)
            .await
            .map_err(|e| self.persistence(site_id, e))?;

        info!(replaced = exists, "Indexed element");
        Ok(IndexOutcome::Indexed)
    }

    /// Delete an item's document and any job still queued for it.
    ///
    /// # Returns
    ///
    /// The number of documents removed (0 or 1).
    #[instrument(skip(self), fields(item = %descriptor))]
    pub async fn delete_element(&self, descriptor: &IndexableItemDescriptor) -> Result<u64, IndexerError> {
        // Pending jobs are dropped even when the delete below fails.
        if let Err(e) = self.queue_manager.remove_jobs_for(descriptor).await {
            warn!(error = %e, "Failed to remove pending jobs");
        }

        let deleted = self
            .search
            .delete_document(descriptor.site_id, descriptor.element_id)
            .await
            .map_err(|e| self.persistence(descriptor.site_id, e))?;

        info!(deleted, "Deleted element");
        Ok(deleted)
    }

    fn persistence(&self, site_id: i64, error: SearchIndexError) -> IndexerError {
        self.diagnostics.report_search_error(Some(site_id), &error);
        IndexerError::Persistence(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{InMemoryContentRepository, RenderPath, StaticContentItem};
    use crate::drift::SyncStatusCache;
    use crate::errors::ResolveError;
    use crate::extractor::PageFetcher;
    use crate::queue::{InMemoryJobQueue, InMemoryJobTracker};
    use chrono::{TimeZone, Utc};
    use content_index_repository::memory::WriteOp;
    use content_index_repository::{InMemorySearchProvider, SearchIndexServiceConfig};
    use content_index_shared::Partition;
    use serde_json::{json, Map, Value};
    use std::time::Duration;

    struct Fixture {
        provider: Arc<InMemorySearchProvider>,
        repository: Arc<InMemoryContentRepository>,
        queue: Arc<InMemoryJobQueue>,
        queue_manager: Arc<ReindexQueueManager>,
        indexer: ElementIndexer,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(InMemorySearchProvider::new());
        let repository = Arc::new(InMemoryContentRepository::new(vec![Partition::new(1, "en")]));
        let search = Arc::new(SearchIndexService::new(
            provider.clone(),
            SearchIndexServiceConfig::default(),
        ));
        let diagnostics = Diagnostics::default();
        let index_manager = Arc::new(IndexManager::new(
            search.clone(),
            repository.clone(),
            Map::new(),
            diagnostics.clone(),
            Arc::new(SyncStatusCache::default()),
        ));
        let queue = Arc::new(InMemoryJobQueue::new());
        let queue_manager = Arc::new(ReindexQueueManager::new(
            queue.clone(),
            Arc::new(InMemoryJobTracker::default()),
        ));
        let callback = |item: &dyn ContentItem| {
            item.attribute("body").and_then(|v| v.as_str().map(str::to_string))
        };
        let extractor = ContentExtractor::new(
            Some(Arc::new(callback)),
            None,
            PageFetcher::new(Duration::from_secs(10), Duration::from_secs(30)).unwrap(),
        );
        let indexer = ElementIndexer::new(
            repository.clone(),
            search,
            index_manager,
            queue_manager.clone(),
            diagnostics,
            extractor,
        )
        .with_policy(IndexabilityPolicy::new(["news"], Vec::<String>::new()));

        Fixture {
            provider,
            repository,
            queue,
            queue_manager,
            indexer,
        }
    }

    fn page(id: i64) -> StaticContentItem {
        StaticContentItem::entry(id, 1)
            .with_title("About")
            .with_url(format!("https://example.com/{}", id))
            .with_group_handle("pages")
            .with_attribute("body", json!("  <p>About us</p>\n"))
    }

    #[tokio::test]
    async fn test_indexes_document_through_pipeline() {
        let f = fixture();
        let post = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let item = page(10).with_post_date(post);

        assert_eq!(f.indexer.index_element(&item).await.unwrap(), IndexOutcome::Indexed);

        let stored = f.provider.document("site-content_1", "10").await.unwrap();
        assert_eq!(stored["title"], "About");
        assert_eq!(stored["elementHandle"], "entry");
        assert_eq!(stored["noPostDate"], false);
        assert_eq!(stored["noExpiryDate"], true);
        assert_eq!(stored["attachment"]["content"], "<p>About us</p>");
        assert!(stored.get("content").is_none());
    }

    #[tokio::test]
    async fn test_reindex_replaces_document() {
        let f = fixture();
        f.indexer.index_element(&page(10)).await.unwrap();
        f.indexer
            .index_element(&page(10).with_title("About us"))
            .await
            .unwrap();

        let stored = f.provider.document("site-content_1", "10").await.unwrap();
        assert_eq!(stored["title"], "About us");
        assert_eq!(
            f.provider.writes().await,
            vec![
                WriteOp::Index {
                    index: "site-content_1".into(),
                    id: "10".into()
                },
                WriteOp::Delete {
                    index: "site-content_1".into(),
                    id: "10".into()
                },
                WriteOp::Index {
                    index: "site-content_1".into(),
                    id: "10".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_skipped_item_writes_nothing() {
        let f = fixture();
        let blacklisted = page(11).with_group_handle("news");

        let outcome = f.indexer.index_element(&blacklisted).await.unwrap();

        assert!(matches!(
            outcome,
            IndexOutcome::Skipped(SkipReason::Blacklisted { .. })
        ));
        assert!(f.provider.writes().await.is_empty());
        assert!(f.provider.index_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_not_indexable_content_is_no_template() {
        let f = fixture();
        let item = StaticContentItem::entry(12, 1)
            .with_url("https://example.com/12")
            .with_render_path(RenderPath::Unrenderable);

        assert_eq!(
            f.indexer.index_element(&item).await.unwrap(),
            IndexOutcome::Skipped(SkipReason::NoTemplate)
        );
        assert!(f.provider.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_asset_uses_creation_date() {
        let f = fixture();
        let created = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        let asset = StaticContentItem::asset(20, 1)
            .with_url("https://example.com/file.pdf")
            .with_date_created(created)
            .with_expiry_date(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
            .with_attribute("body", json!("pdf text"));

        f.indexer.index_element(&asset).await.unwrap();

        let stored = f.provider.document("site-content_1", "20").await.unwrap();
        assert_eq!(stored["elementHandle"], "asset");
        assert_eq!(stored["postDate"], json!(created));
        assert_eq!(stored["expiryDate"], Value::Null);
        assert_eq!(stored["noExpiryDate"], true);
    }

    #[tokio::test]
    async fn test_extra_fields_are_stored() {
        let f = fixture();
        let indexer = f.indexer.with_extra_fields(vec![
            crate::strategies::ExtraField::literal("kind", json!({"type": "keyword"}), json!("page")),
            crate::strategies::ExtraField::resolved(
                "summary",
                json!({"type": "text"}),
                |item: &dyn ContentItem| json!(format!("Summary of {}", item.title())),
            ),
        ]);

        indexer.index_element(&page(10)).await.unwrap();

        let stored = f.provider.document("site-content_1", "10").await.unwrap();
        assert_eq!(stored["kind"], "page");
        assert_eq!(stored["summary"], "Summary of About");
    }

    #[tokio::test]
    async fn test_index_descriptor_resolves_fresh_content() {
        let f = fixture();
        f.repository.upsert(page(10));

        let outcome = f
            .indexer
            .index_descriptor(&IndexableItemDescriptor::new(10, 1, ElementType::Entry))
            .await
            .unwrap();
        assert_eq!(outcome, IndexOutcome::Indexed);

        let missing = f
            .indexer
            .index_descriptor(&IndexableItemDescriptor::new(99, 1, ElementType::Entry))
            .await;
        assert!(matches!(
            missing,
            Err(IndexerError::Resolve(ResolveError::NotFound { element_id: 99, .. }))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_document_and_pending_job() {
        let f = fixture();
        let descriptor = IndexableItemDescriptor::new(10, 1, ElementType::Entry);
        f.indexer.index_element(&page(10)).await.unwrap();
        f.queue_manager.enqueue_job(&descriptor).await.unwrap();

        assert_eq!(f.indexer.delete_element(&descriptor).await.unwrap(), 1);
        assert_eq!(f.indexer.delete_element(&descriptor).await.unwrap(), 0);
        assert!(f.queue.is_empty());
        assert!(f.queue_manager.tracked_job_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_still_cancels_pending_job() {
        let f = fixture();
        let descriptor = IndexableItemDescriptor::new(10, 1, ElementType::Entry);
        f.queue_manager.enqueue_job(&descriptor).await.unwrap();
        f.provider.set_available(false);

        let result = f.indexer.delete_element(&descriptor).await;

        assert!(matches!(result, Err(IndexerError::Persistence(_))));
        assert!(f.queue.is_empty());
        assert!(f.queue_manager.tracked_job_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_an_error() {
        let f = fixture();
        f.provider.set_available(false);

        let result = f.indexer.index_element(&page(10)).await;
        assert!(matches!(result, Err(IndexerError::Persistence(_))));
    }
}
