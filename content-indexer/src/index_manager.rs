//! Partition index management.
//!
//! Creates, drops and recreates the per-site indexes together with the
//! attachment ingest pipeline they are written through.

use std::sync::Arc;

use content_index_repository::opensearch::index_config::{analyzer_for_language, get_index_settings};
use content_index_repository::{SearchIndexError, SearchIndexService};
use content_index_shared::Partition;
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use crate::content::ContentRepository;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::drift::SyncStatusCache;
use crate::errors::IndexManagementError;

/// Outcome of recreating a batch of partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecreateReport {
    pub recreated: Vec<i64>,
    pub failures: Vec<(i64, String)>,
}

impl RecreateReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct IndexManager {
    search: Arc<SearchIndexService>,
    repository: Arc<dyn ContentRepository>,
    extra_mappings: Map<String, Value>,
    diagnostics: Diagnostics,
    sync_cache: Arc<SyncStatusCache>,
}

impl IndexManager {
    /// # Arguments
    ///
    /// * `search` - Search index service
    /// * `repository` - Source of partitions and their languages
    /// * `extra_mappings` - Mappings of the configured extra fields
    /// * `diagnostics` - Where operator-facing failures are published
    /// * `sync_cache` - Drift cache invalidated by every recreate
    pub fn new(
        search: Arc<SearchIndexService>,
        repository: Arc<dyn ContentRepository>,
        extra_mappings: Map<String, Value>,
        diagnostics: Diagnostics,
        sync_cache: Arc<SyncStatusCache>,
    ) -> Self {
        Self {
            search,
            repository,
            extra_mappings,
            diagnostics,
            sync_cache,
        }
    }

    /// Look up a partition by site id.
    pub async fn partition(&self, site_id: i64) -> Result<Partition, IndexManagementError> {
        self.repository
            .partitions()
            .await?
            .into_iter()
            .find(|p| p.site_id == site_id)
            .ok_or(IndexManagementError::UnknownPartition(site_id))
    }

    /// Analyzer of a partition's language.
    pub async fn analyzer_for_site(&self, site_id: i64) -> Result<&'static str, IndexManagementError> {
        let partition = self.partition(site_id).await?;
        Ok(analyzer_for_language(&partition.language))
    }

    /// Install the attachment pipeline and create the partition index.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index was created
    /// * `Err(IndexManagementError)` - If the pipeline or the index could not be created;
    ///   a missing attachment processor also raises a diagnostic event
    #[instrument(skip(self), fields(site_id = partition.site_id))]
    pub async fn create_partition_index(&self, partition: &Partition) -> Result<(), IndexManagementError> {
        let analyzer = analyzer_for_language(&partition.language);
        let body = get_index_settings(analyzer, &self.extra_mappings);

        self.search
            .install_pipeline()
            .await
            .map_err(|e| self.reported(partition.site_id, e))?;
        self.search
            .create_index(partition.site_id, &body)
            .await
            .map_err(|e| self.reported(partition.site_id, e))?;

        info!(
            index = %self.search.index_name(partition.site_id),
            language = %partition.language,
            analyzer,
            "Created partition index"
        );
        Ok(())
    }

    /// Create the partition index unless it already exists.
    pub async fn ensure_partition_index(&self, site_id: i64) -> Result<(), IndexManagementError> {
        if self.search.index_exists(site_id).await? {
            return Ok(());
        }
        let partition = self.partition(site_id).await?;
        if let Err(e) = self.create_partition_index(&partition).await {
            // Lost a creation race with another writer.
            if !self.search.index_exists(site_id).await? {
                return Err(e);
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_partition_index(&self, site_id: i64) -> Result<(), IndexManagementError> {
        self.search.delete_index(site_id).await?;
        info!(index = %self.search.index_name(site_id), "Removed partition index");
        Ok(())
    }

    /// Drop and create the indexes of the given partitions.
    ///
    /// A failing partition is logged and published as a diagnostic event;
    /// the batch continues. The drift cache is invalidated in every case.
    #[instrument(skip(self))]
    pub async fn recreate_partition_indexes(
        &self,
        site_ids: &[i64],
    ) -> Result<RecreateReport, IndexManagementError> {
        let partitions = match self.repository.partitions().await {
            Ok(partitions) => partitions,
            Err(e) => {
                self.sync_cache.invalidate();
                return Err(e.into());
            }
        };

        let mut report = RecreateReport::default();
        for &site_id in site_ids {
            let result = match partitions.iter().find(|p| p.site_id == site_id) {
                Some(partition) => self.recreate_one(partition).await,
                None => Err(IndexManagementError::UnknownPartition(site_id)),
            };
            match result {
                Ok(()) => report.recreated.push(site_id),
                Err(e) => {
                    error!(site_id, error = %e, "Failed to recreate partition index");
                    self.diagnostics.emit(DiagnosticEvent::PartitionRecreateFailed {
                        site_id,
                        error: e.to_string(),
                    });
                    report.failures.push((site_id, e.to_string()));
                }
            }
        }

        self.sync_cache.invalidate();
        info!(
            recreated = report.recreated.len(),
            failed = report.failures.len(),
            "Partition indexes recreated"
        );
        Ok(report)
    }

    /// Recreate every partition index.
    ///
    /// # Returns
    ///
    /// * `Ok(RecreateReport)` - If every partition was recreated
    /// * `Err(IndexManagementError::RecreateFailed)` - With every failure, after
    ///   the remaining partitions were still processed
    pub async fn recreate_all_partitions(&self) -> Result<RecreateReport, IndexManagementError> {
        let site_ids: Vec<i64> = match self.repository.partitions().await {
            Ok(partitions) => partitions.iter().map(|p| p.site_id).collect(),
            Err(e) => {
                self.sync_cache.invalidate();
                return Err(e.into());
            }
        };

        let report = self.recreate_partition_indexes(&site_ids).await?;
        if report.is_success() {
            Ok(report)
        } else {
            Err(IndexManagementError::RecreateFailed {
                failures: report.failures,
            })
        }
    }

    async fn recreate_one(&self, partition: &Partition) -> Result<(), IndexManagementError> {
        self.remove_partition_index(partition.site_id).await?;
        self.create_partition_index(partition).await
    }

    fn reported(&self, site_id: i64, error: SearchIndexError) -> IndexManagementError {
        self.diagnostics.report_search_error(Some(site_id), &error);
        error.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContentRepository;
    use content_index_repository::{
        InMemorySearchProvider, SearchIndexProvider, SearchIndexServiceConfig,
    };
    use serde_json::json;

    struct Fixture {
        provider: Arc<InMemorySearchProvider>,
        diagnostics: Diagnostics,
        cache: Arc<SyncStatusCache>,
        manager: IndexManager,
    }

    fn fixture_with(provider: InMemorySearchProvider, extra: Map<String, Value>) -> Fixture {
        let provider = Arc::new(provider);
        let repository = Arc::new(InMemoryContentRepository::new(vec![
            Partition::new(1, "fr-CA"),
            Partition::new(2, "xx"),
        ]));
        let search = Arc::new(SearchIndexService::new(
            provider.clone(),
            SearchIndexServiceConfig::default(),
        ));
        let diagnostics = Diagnostics::default();
        let cache = Arc::new(SyncStatusCache::default());
        let manager = IndexManager::new(search, repository, extra, diagnostics.clone(), cache.clone());
        Fixture {
            provider,
            diagnostics,
            cache,
            manager,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(InMemorySearchProvider::new(), Map::new())
    }

    #[tokio::test]
    async fn test_create_uses_partition_analyzer_and_extra_mappings() {
        let mut extra = Map::new();
        extra.insert("summary".into(), json!({"type": "text"}));
        let f = fixture_with(InMemorySearchProvider::new(), extra);

        let partition = f.manager.partition(1).await.unwrap();
        f.manager.create_partition_index(&partition).await.unwrap();

        let settings = f.provider.index_settings("site-content_1").await.unwrap();
        assert_eq!(
            settings["mappings"]["properties"]["title"]["analyzer"],
            "french"
        );
        assert_eq!(
            settings["mappings"]["properties"]["summary"]["type"],
            "text"
        );
        assert!(f.provider.has_pipeline("attachment").await);
    }

    #[tokio::test]
    async fn test_unknown_language_uses_standard() {
        let f = fixture();
        assert_eq!(f.manager.analyzer_for_site(2).await.unwrap(), "standard");
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let f = fixture();
        f.manager.ensure_partition_index(1).await.unwrap();
        f.manager.ensure_partition_index(1).await.unwrap();
        assert_eq!(f.provider.index_names().await, vec!["site-content_1"]);
    }

    #[tokio::test]
    async fn test_ensure_unknown_partition() {
        let f = fixture();
        let result = f.manager.ensure_partition_index(7).await;
        assert!(matches!(result, Err(IndexManagementError::UnknownPartition(7))));
    }

    #[tokio::test]
    async fn test_missing_processor_raises_event() {
        let f = fixture_with(InMemorySearchProvider::without_attachment_processor(), Map::new());
        let mut events = f.diagnostics.subscribe();

        let partition = f.manager.partition(1).await.unwrap();
        let result = f.manager.create_partition_index(&partition).await;

        assert!(matches!(result, Err(IndexManagementError::Search(_))));
        assert!(matches!(
            events.recv().await.unwrap(),
            DiagnosticEvent::MissingIngestProcessor { site_id: Some(1), .. }
        ));
    }

    #[tokio::test]
    async fn test_recreate_continues_past_failures() {
        let f = fixture();
        f.cache.set(true);
        let mut events = f.diagnostics.subscribe();

        let report = f.manager.recreate_partition_indexes(&[9, 1]).await.unwrap();

        assert_eq!(report.recreated, vec![1]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, 9);
        assert_eq!(f.cache.get(), None);
        assert!(matches!(
            events.recv().await.unwrap(),
            DiagnosticEvent::PartitionRecreateFailed { site_id: 9, .. }
        ));
    }

    #[tokio::test]
    async fn test_recreate_all_aggregates_failures() {
        let f = fixture_with(InMemorySearchProvider::without_attachment_processor(), Map::new());
        f.cache.set(true);

        let result = f.manager.recreate_all_partitions().await;

        match result {
            Err(IndexManagementError::RecreateFailed { failures }) => {
                let sites: Vec<i64> = failures.iter().map(|(site, _)| *site).collect();
                assert_eq!(sites, vec![1, 2]);
            }
            other => panic!("expected aggregate failure, got {:?}", other),
        }
        assert_eq!(f.cache.get(), None);
    }

    #[tokio::test]
    async fn test_recreate_drops_documents() {
        let f = fixture();
        f.manager.ensure_partition_index(1).await.unwrap();
        f.provider
            .index_document("site-content_1", "5", &json!({"title": "old"}), None)
            .await
            .unwrap();

        f.manager.recreate_all_partitions().await.unwrap();

        assert_eq!(f.provider.count("site-content_1").await.unwrap(), 0);
        assert_eq!(
            f.provider.index_names().await,
            vec!["site-content_1", "site-content_2"]
        );
    }
}
