//! Full-text search over a partition index.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use content_index_repository::SearchIndexService;
use content_index_shared::SearchHit;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::config::{HighlightSettings, Settings};
use crate::errors::SearchError;
use crate::index_manager::IndexManager;
use crate::strategies::{ExtraField, ResultFormatter};

/// Upper bound on the number of hits a search returns.
pub const MAX_RESULT_WINDOW: u64 = 10_000;

pub struct SearchService {
    search: Arc<SearchIndexService>,
    index_manager: Arc<IndexManager>,
    highlight: HighlightSettings,
    extra_fields: Vec<ExtraField>,
    formatter: Option<Arc<dyn ResultFormatter>>,
}

impl SearchService {
    pub fn new(search: Arc<SearchIndexService>, index_manager: Arc<IndexManager>) -> Self {
        Self {
            search,
            index_manager,
            highlight: HighlightSettings::default(),
            extra_fields: Vec::new(),
            formatter: None,
        }
    }

    /// Take highlight markup, extra fields and the result formatter from settings.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.highlight = settings.highlight.clone();
        self.extra_fields = settings.extra_fields.clone();
        self.formatter = settings.result_formatter.clone();
        self
    }

    /// Search a partition.
    ///
    /// Every query term has to match, in the title or the extracted content.
    /// An empty query returns no hits.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, site_id: i64) -> Result<Vec<SearchHit>, SearchError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let analyzer = self.index_manager.analyzer_for_site(site_id).await?;
        let size = self.search.count_documents(site_id).await?.min(MAX_RESULT_WINDOW);
        if size == 0 {
            return Ok(Vec::new());
        }

        let body = self.query_body(query, analyzer, size);
        let response = self.search.search(site_id, &body).await?;

        let hits: Vec<SearchHit> = response["hits"]["hits"]
            .as_array()
            .map(|hits| hits.iter().filter_map(|hit| self.to_hit(hit)).collect())
            .unwrap_or_default();
        debug!(count = hits.len(), "Search finished");
        Ok(hits)
    }

    fn query_body(&self, query: &str, analyzer: &str, size: u64) -> Value {
        let mut fields = Map::new();
        fields.insert("title".into(), json!({"type": "plain"}));
        fields.insert("attachment.content".into(), json!({}));
        for field in &self.extra_fields {
            if let Some(highlighter) = &field.highlighter {
                fields.insert(field.name.clone(), highlighter.clone());
            }
        }

        json!({
            "size": size,
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["attachment.content", "title"],
                    "analyzer": analyzer,
                    "operator": "and"
                }
            },
            "highlight": {
                "pre_tags": self.highlight.pre_tags,
                "post_tags": self.highlight.post_tags,
                "fields": fields
            }
        })
    }

    fn to_hit(&self, hit: &Value) -> Option<SearchHit> {
        let id = match &hit["_id"] {
            Value::String(s) => s.parse::<i64>().ok()?,
            other => other.as_i64()?,
        };
        let source = &hit["_source"];

        let highlights = hit["highlight"]
            .as_object()
            .map(|fields| {
                fields
                    .values()
                    .filter_map(Value::as_array)
                    .flatten()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let extra = self
            .extra_fields
            .iter()
            .filter_map(|f| source.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect();

        let result = SearchHit {
            id,
            title: source["title"].as_str().unwrap_or_default().to_string(),
            url: source["url"].as_str().map(str::to_string),
            post_date: parse_date(&source["postDate"]),
            expiry_date: parse_date(&source["expiryDate"]),
            element_handle: source["elementHandle"].as_str().map(str::to_string),
            score: hit["_score"].as_f64().unwrap_or_default(),
            highlights,
            extra,
        };

        Some(match &self.formatter {
            Some(formatter) => formatter.format(result, source),
            None => result,
        })
    }
}

fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentItem, InMemoryContentRepository, StaticContentItem};
    use crate::diagnostics::Diagnostics;
    use crate::drift::SyncStatusCache;
    use crate::extractor::{ContentExtractor, PageFetcher};
    use crate::indexer::ElementIndexer;
    use crate::queue::{InMemoryJobQueue, InMemoryJobTracker, ReindexQueueManager};
    use chrono::TimeZone;
    use content_index_repository::{InMemorySearchProvider, SearchIndexServiceConfig};
    use content_index_shared::Partition;
    use std::time::Duration;

    struct Fixture {
        indexer: ElementIndexer,
        service: SearchService,
    }

    fn fixture(settings: Settings) -> Fixture {
        let provider = Arc::new(InMemorySearchProvider::new());
        let repository = Arc::new(InMemoryContentRepository::new(vec![Partition::new(1, "en")]));
        let search = Arc::new(SearchIndexService::new(
            provider,
            SearchIndexServiceConfig::default(),
        ));
        let index_manager = Arc::new(IndexManager::new(
            search.clone(),
            repository.clone(),
            settings.extra_field_mappings(),
            Diagnostics::default(),
            Arc::new(SyncStatusCache::default()),
        ));
        let queue_manager = Arc::new(ReindexQueueManager::new(
            Arc::new(InMemoryJobQueue::new()),
            Arc::new(InMemoryJobTracker::default()),
        ));
        let extractor = ContentExtractor::new(
            Some(Arc::new(|item: &dyn ContentItem| {
                item.attribute("body").and_then(|v| v.as_str().map(str::to_string))
            })),
            None,
            PageFetcher::new(Duration::from_secs(10), Duration::from_secs(30)).unwrap(),
        );
        let indexer = ElementIndexer::new(
            repository,
            search.clone(),
            index_manager.clone(),
            queue_manager,
            Diagnostics::default(),
            extractor,
        )
        .with_extra_fields(settings.extra_fields.clone());
        let service = SearchService::new(search, index_manager).with_settings(&settings);
        Fixture { indexer, service }
    }

    fn page(id: i64, title: &str, body: &str) -> StaticContentItem {
        StaticContentItem::entry(id, 1)
            .with_title(title)
            .with_url(format!("https://example.com/{}", id))
            .with_attribute("body", json!(body))
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let f = fixture(Settings::default());
        assert!(f.service.search("   ", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_index_returns_nothing() {
        let f = fixture(Settings::default());
        assert!(f.service.search("about", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_terms_must_match() {
        let f = fixture(Settings::default().with_highlight_tags("<mark>", "</mark>"));
        let posted = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        f.indexer
            .index_element(&page(10, "About", "Our team builds boats").with_post_date(posted))
            .await
            .unwrap();
        f.indexer
            .index_element(&page(11, "Contact", "Write to our team"))
            .await
            .unwrap();

        let hits = f.service.search("team boats", 1).await.unwrap();

        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.id, 10);
        assert_eq!(hit.title, "About");
        assert_eq!(hit.url.as_deref(), Some("https://example.com/10"));
        assert_eq!(hit.element_handle.as_deref(), Some("entry"));
        assert_eq!(hit.post_date, Some(posted));
        assert_eq!(hit.expiry_date, None);
        assert_eq!(hit.highlights, vec!["<mark>Our team builds boats</mark>"]);
    }

    #[tokio::test]
    async fn test_extra_fields_and_formatter() {
        let settings = Settings::default()
            .with_extra_field(
                ExtraField::literal("section", json!({"type": "keyword"}), json!("news"))
                    .with_highlighter(json!({})),
            )
            .with_result_formatter(|mut hit: SearchHit, source: &Value| {
                hit.title = format!("{} ({})", hit.title, source["section"].as_str().unwrap_or("?"));
                hit
            });
        let f = fixture(settings);
        f.indexer
            .index_element(&page(10, "Launch", "Release notes"))
            .await
            .unwrap();

        let hits = f.service.search("release", 1).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Launch (news)");
        assert_eq!(hits[0].extra.get("section"), Some(&json!("news")));
    }

    #[test]
    fn test_query_body() {
        let f = fixture(Settings::default().with_highlight_tags("<b>", "</b>"));
        let body = f.service.query_body("boats", "french", 3);

        assert_eq!(body["size"], 3);
        assert_eq!(body["query"]["multi_match"]["operator"], "and");
        assert_eq!(body["query"]["multi_match"]["analyzer"], "french");
        assert_eq!(
            body["query"]["multi_match"]["fields"],
            json!(["attachment.content", "title"])
        );
        assert_eq!(body["highlight"]["pre_tags"], json!(["<b>"]));
        assert_eq!(body["highlight"]["fields"]["title"]["type"], "plain");
    }
}
