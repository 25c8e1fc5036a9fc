//! Dependency initialization and wiring for the content indexer.

use std::env;
use std::sync::Arc;

use content_index_repository::{OpenSearchProvider, SearchIndexProvider, SearchIndexService};
use tokio::time::sleep;
use tracing::{info, warn};

use super::{parse_partitions, ConnectionMode, Settings, SettingsValidator, DEFAULT_PARTITIONS};
use crate::content::{ContentRepository, InMemoryContentRepository};
use crate::coordinator::SyncCoordinator;
use crate::diagnostics::Diagnostics;
use crate::drift::{SyncDriftDetector, SyncStatusCache};
use crate::errors::ConfigError;
use crate::extractor::ContentExtractor;
use crate::index_manager::IndexManager;
use crate::indexer::ElementIndexer;
use crate::queue::{
    InMemoryJobQueue, InMemoryJobTracker, JobQueue, JobTracker, JobWorker, ReindexJobRunner,
    ReindexQueueManager,
};
use crate::search::SearchService;
use crate::IndexingError;

/// Every component of the synchronization pipeline, wired from one set of
/// settings.
pub struct Pipeline {
    pub settings: Settings,
    pub diagnostics: Diagnostics,
    pub repository: Arc<dyn ContentRepository>,
    pub search: Arc<SearchIndexService>,
    pub sync_cache: Arc<SyncStatusCache>,
    pub index_manager: Arc<IndexManager>,
    pub queue_manager: Arc<ReindexQueueManager>,
    pub indexer: Arc<ElementIndexer>,
    pub runner: Arc<ReindexJobRunner>,
    pub drift: SyncDriftDetector,
    pub search_service: SearchService,
    pub coordinator: SyncCoordinator,
}

impl Pipeline {
    /// Wire the pipeline.
    ///
    /// # Arguments
    ///
    /// * `settings` - Validated settings
    /// * `provider` - Search engine backend
    /// * `repository` - Content source
    /// * `queue` - Queue reindex jobs are pushed to
    /// * `tracker` - Side cache of outstanding job ids
    pub fn new(
        settings: Settings,
        provider: Arc<dyn SearchIndexProvider>,
        repository: Arc<dyn ContentRepository>,
        queue: Arc<dyn JobQueue>,
        tracker: Arc<dyn JobTracker>,
    ) -> Result<Self, ConfigError> {
        let diagnostics = Diagnostics::default();
        let policy = settings.policy();
        let search = Arc::new(SearchIndexService::new(provider, settings.search_index_config()));
        let sync_cache = Arc::new(SyncStatusCache::default());

        let index_manager = Arc::new(IndexManager::new(
            search.clone(),
            repository.clone(),
            settings.extra_field_mappings(),
            diagnostics.clone(),
            sync_cache.clone(),
        ));
        let queue_manager = Arc::new(ReindexQueueManager::new(queue, tracker));
        let indexer = Arc::new(
            ElementIndexer::new(
                repository.clone(),
                search.clone(),
                index_manager.clone(),
                queue_manager.clone(),
                diagnostics.clone(),
                ContentExtractor::from_settings(&settings)?,
            )
            .with_policy(policy.clone())
            .with_extra_fields(settings.extra_fields.clone()),
        );
        let runner = Arc::new(ReindexJobRunner::new(indexer.clone(), queue_manager.clone()));
        let drift = SyncDriftDetector::new(
            repository.clone(),
            search.clone(),
            policy,
            sync_cache.clone(),
        );
        let search_service =
            SearchService::new(search.clone(), index_manager.clone()).with_settings(&settings);
        let coordinator = SyncCoordinator::new(
            repository.clone(),
            indexer.clone(),
            index_manager.clone(),
            queue_manager.clone(),
        );

        Ok(Self {
            settings,
            diagnostics,
            repository,
            search,
            sync_cache,
            index_manager,
            queue_manager,
            indexer,
            runner,
            drift,
            search_service,
            coordinator,
        })
    }
}

/// Container for all initialized dependencies of the bootstrap binary.
pub struct Dependencies {
    pub pipeline: Pipeline,
    /// The configured worker ready to run.
    pub worker: JobWorker,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// Besides the variables read by [`Settings::from_env`], reads
    /// `CONTENT_PARTITIONS` (default: `1:en`), the partitions to provision.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If settings are invalid, or the engine is unreachable in fail-fast mode
    pub async fn new() -> Result<Self, IndexingError> {
        let settings = Settings::from_env()?;
        settings.validate()?;

        let partitions = parse_partitions(
            &env::var("CONTENT_PARTITIONS").unwrap_or_else(|_| DEFAULT_PARTITIONS.to_string()),
        )?;

        info!(
            endpoint = %settings.normalized_endpoint(),
            index_name_prefix = ?settings.index_name_prefix,
            partitions = partitions.len(),
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let provider = Self::connect_to_search_engine(&settings).await?;
        info!("Search engine connection established");

        let repository = Arc::new(InMemoryContentRepository::new(partitions));
        let queue = Arc::new(InMemoryJobQueue::new());
        let pipeline = Pipeline::new(
            settings,
            provider,
            repository,
            queue.clone(),
            Arc::new(InMemoryJobTracker::default()),
        )?;
        let worker = JobWorker::new(queue, pipeline.runner.clone());

        Ok(Self { pipeline, worker })
    }

    /// Connect to the search engine with retry logic based on connection mode.
    async fn connect_to_search_engine(
        settings: &Settings,
    ) -> Result<Arc<dyn SearchIndexProvider>, ConfigError> {
        loop {
            match Self::try_connect(settings).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match settings.connection_mode {
                    ConnectionMode::FailFast => return Err(e),
                    ConnectionMode::Retry => {
                        warn!(
                            endpoint = %settings.normalized_endpoint(),
                            error = %e,
                            retry_interval_secs = settings.retry_interval.as_secs(),
                            "Failed to connect to the search engine, retrying..."
                        );
                        sleep(settings.retry_interval).await;
                    }
                },
            }
        }
    }

    /// Build the provider and require a successful node info call.
    async fn try_connect(settings: &Settings) -> Result<Arc<dyn SearchIndexProvider>, ConfigError> {
        let provider: Arc<dyn SearchIndexProvider> =
            Arc::new(OpenSearchProvider::new(settings.opensearch_config())?);
        let search = SearchIndexService::new(provider.clone(), settings.search_index_config());
        SettingsValidator::validate_with_connectivity(settings, &search).await?;
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContentItem;
    use content_index_repository::InMemorySearchProvider;
    use content_index_shared::Partition;

    #[tokio::test]
    async fn test_pipeline_uses_settings() {
        let settings = Settings::default()
            .with_index_name_prefix("acme")
            .with_blacklisted_entry_types(["news"])
            .with_content_callback(|item: &dyn crate::content::ContentItem| Some(item.title()));
        let repository = Arc::new(InMemoryContentRepository::new(vec![Partition::new(1, "en")]));
        repository.upsert(
            StaticContentItem::entry(10, 1)
                .with_url("https://example.com/10")
                .with_group_handle("pages"),
        );
        repository.upsert(
            StaticContentItem::entry(11, 1)
                .with_url("https://example.com/11")
                .with_group_handle("news"),
        );

        let pipeline = Pipeline::new(
            settings,
            Arc::new(InMemorySearchProvider::new()),
            repository,
            Arc::new(InMemoryJobQueue::new()),
            Arc::new(InMemoryJobTracker::default()),
        )
        .unwrap();

        assert_eq!(pipeline.search.index_name(1), "acme_site-content_1");
        let jobs = pipeline.coordinator.on_settings_saved().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(!pipeline.drift.is_in_sync().await);
    }
}
