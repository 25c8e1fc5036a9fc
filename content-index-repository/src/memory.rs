//! In-memory search index provider.
//!
//! Mirrors the engine behavior the pipeline relies on: auto-created indexes on
//! first write, ingest pipelines (the `attachment` processor decodes base64
//! `content` into `attachment.content`), counts and a naive `multi_match`
//! search. Used for tests and local runs without an engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use crate::errors::{SearchIndexError, MISSING_ATTACHMENT_PROCESSOR_REASON};
use crate::interfaces::SearchIndexProvider;

/// A write recorded by the provider, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Index { index: String, id: String },
    Delete { index: String, id: String },
}

#[derive(Debug, Default)]
struct IndexState {
    settings: Value,
    documents: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct EngineState {
    indexes: HashMap<String, IndexState>,
    pipelines: HashMap<String, Value>,
    writes: Vec<WriteOp>,
}

/// Search engine kept in process memory.
#[derive(Debug)]
pub struct InMemorySearchProvider {
    state: RwLock<EngineState>,
    available: AtomicBool,
    attachment_processor: AtomicBool,
}

impl Default for InMemorySearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySearchProvider {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            available: AtomicBool::new(true),
            attachment_processor: AtomicBool::new(true),
        }
    }

    /// Simulate an engine without the ingest attachment plugin.
    pub fn without_attachment_processor() -> Self {
        let provider = Self::new();
        provider.attachment_processor.store(false, Ordering::SeqCst);
        provider
    }

    /// Make every subsequent request fail with a connection error, or recover.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Stored source of a document, after ingest processing.
    pub async fn document(&self, index: &str, id: &str) -> Option<Value> {
        let state = self.state.read().await;
        state
            .indexes
            .get(index)
            .and_then(|i| i.documents.get(id))
            .cloned()
    }

    /// Settings and mappings an index was created with.
    pub async fn index_settings(&self, index: &str) -> Option<Value> {
        let state = self.state.read().await;
        state.indexes.get(index).map(|i| i.settings.clone())
    }

    /// Names of all existing indexes, sorted.
    pub async fn index_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.indexes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether an ingest pipeline is installed.
    pub async fn has_pipeline(&self, id: &str) -> bool {
        self.state.read().await.pipelines.contains_key(id)
    }

    /// Document writes performed so far.
    pub async fn writes(&self) -> Vec<WriteOp> {
        self.state.read().await.writes.clone()
    }

    fn check_available(&self) -> Result<(), SearchIndexError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SearchIndexError::connection("connection refused"))
        }
    }

    fn not_found(operation: &str, reason: String) -> SearchIndexError {
        let body = json!({"error": {"reason": reason}, "status": 404});
        SearchIndexError::rejected(operation, 404, body.to_string())
    }
}

/// Run the processors of a pipeline over a document source.
fn run_pipeline(pipeline: &Value, mut source: Value) -> Value {
    let processors = pipeline["processors"].as_array().cloned().unwrap_or_default();
    for processor in processors {
        if let Some(attachment) = processor.get("attachment") {
            let field = attachment["field"].as_str().unwrap_or("content");
            let target = attachment["target_field"].as_str().unwrap_or("attachment");
            let decoded = source
                .get(field)
                .and_then(Value::as_str)
                .and_then(|encoded| STANDARD.decode(encoded).ok())
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            if let (Some(text), Some(map)) = (decoded, source.as_object_mut()) {
                map.insert(target.to_string(), json!({ "content": text }));
            }
        }
        if let Some(remove) = processor.get("remove") {
            if let (Some(field), Some(map)) = (remove["field"].as_str(), source.as_object_mut()) {
                map.remove(field);
            }
        }
    }
    source
}

fn field_text<'a>(source: &'a Value, path: &str) -> Option<&'a str> {
    path.split('.')
        .try_fold(source, |value, key| value.get(key))
        .and_then(Value::as_str)
}

fn search_documents(documents: &BTreeMap<String, Value>, body: &Value) -> Value {
    let multi_match = &body["query"]["multi_match"];
    let query = multi_match["query"].as_str().unwrap_or_default().to_lowercase();
    let terms: Vec<&str> = query.split_whitespace().collect();
    let fields: Vec<String> = multi_match["fields"]
        .as_array()
        .map(|f| f.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let size = body["size"].as_u64().unwrap_or(10) as usize;
    let pre_tag = body["highlight"]["pre_tags"][0].as_str().unwrap_or_default();
    let post_tag = body["highlight"]["post_tags"][0].as_str().unwrap_or_default();
    let highlight_fields: Vec<String> = body["highlight"]["fields"]
        .as_object()
        .map(|f| f.keys().cloned().collect())
        .unwrap_or_default();

    let mut hits = Vec::new();
    for (id, source) in documents {
        if terms.is_empty() {
            break;
        }
        let haystack: String = fields
            .iter()
            .filter_map(|f| field_text(source, f))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let matched = terms.iter().filter(|t| haystack.contains(*t)).count();
        if matched < terms.len() {
            continue;
        }

        let mut highlight = Map::new();
        for field in &highlight_fields {
            if let Some(text) = field_text(source, field) {
                let lower = text.to_lowercase();
                if terms.iter().any(|t| lower.contains(t)) {
                    highlight.insert(
                        field.clone(),
                        json!([format!("{}{}{}", pre_tag, text, post_tag)]),
                    );
                }
            }
        }

        hits.push(json!({
            "_id": id,
            "_score": matched as f64,
            "_source": source,
            "highlight": highlight,
        }));
    }

    let total = hits.len();
    hits.truncate(size);
    json!({
        "hits": {
            "total": { "value": total, "relation": "eq" },
            "hits": hits,
        }
    })
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchProvider {
    async fn node_info(&self) -> Result<Value, SearchIndexError> {
        self.check_available()?;
        Ok(json!({
            "name": "in-memory",
            "version": { "number": "2.11.0", "distribution": "opensearch" }
        }))
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        self.check_available()?;
        Ok(self.state.read().await.indexes.contains_key(index))
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchIndexError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.indexes.contains_key(index) {
            let body = json!({
                "error": {
                    "type": "resource_already_exists_exception",
                    "reason": format!("index [{}] already exists", index)
                },
                "status": 400
            });
            return Err(SearchIndexError::rejected("create index", 400, body.to_string()));
        }
        state.indexes.insert(
            index.to_string(),
            IndexState {
                settings: body.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        self.check_available()?;
        self.state.write().await.indexes.remove(index);
        Ok(())
    }

    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<(), SearchIndexError> {
        self.check_available()?;
        let uses_attachment = body["processors"]
            .as_array()
            .map(|p| p.iter().any(|proc| proc.get("attachment").is_some()))
            .unwrap_or(false);
        if uses_attachment && !self.attachment_processor.load(Ordering::SeqCst) {
            let body = json!({
                "error": {
                    "type": "parse_exception",
                    "reason": MISSING_ATTACHMENT_PROCESSOR_REASON
                },
                "status": 400
            });
            return Err(SearchIndexError::rejected("put pipeline", 400, body.to_string()));
        }
        self.state
            .write()
            .await
            .pipelines
            .insert(id.to_string(), body.clone());
        Ok(())
    }

    async fn delete_pipeline(&self, id: &str) -> Result<(), SearchIndexError> {
        self.check_available()?;
        self.state.write().await.pipelines.remove(id);
        Ok(())
    }

    async fn document_exists(&self, index: &str, id: &str) -> Result<bool, SearchIndexError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .indexes
            .get(index)
            .map(|i| i.documents.contains_key(id))
            .unwrap_or(false))
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Value,
        pipeline: Option<&str>,
    ) -> Result<(), SearchIndexError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let source = match pipeline {
            Some(pipeline_id) => {
                let definition = state.pipelines.get(pipeline_id).ok_or_else(|| {
                    Self::not_found(
                        "index document",
                        format!("pipeline with id [{}] does not exist", pipeline_id),
                    )
                })?;
                run_pipeline(definition, body.clone())
            }
            None => body.clone(),
        };
        state
            .indexes
            .entry(index.to_string())
            .or_default()
            .documents
            .insert(id.to_string(), source);
        state.writes.push(WriteOp::Index {
            index: index.to_string(),
            id: id.to_string(),
        });
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, SearchIndexError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let removed = state
            .indexes
            .get_mut(index)
            .and_then(|i| i.documents.remove(id))
            .is_some();
        if removed {
            state.writes.push(WriteOp::Delete {
                index: index.to_string(),
                id: id.to_string(),
            });
        }
        Ok(removed)
    }

    async fn count(&self, index: &str) -> Result<u64, SearchIndexError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .indexes
            .get(index)
            .map(|i| i.documents.len() as u64)
            .unwrap_or(0))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value, SearchIndexError> {
        self.check_available()?;
        let state = self.state.read().await;
        let documents = state.indexes.get(index).map(|i| &i.documents).ok_or_else(|| {
            Self::not_found("search", format!("no such index [{}]", index))
        })?;
        Ok(search_documents(documents, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opensearch::index_config::{attachment_pipeline, ATTACHMENT_PIPELINE};

    #[tokio::test]
    async fn test_attachment_pipeline_decodes_content() {
        let provider = InMemorySearchProvider::new();
        provider
            .put_pipeline(ATTACHMENT_PIPELINE, &attachment_pipeline())
            .await
            .unwrap();

        let body = json!({"title": "Hello", "content": STANDARD.encode("<p>Body text</p>")});
        provider
            .index_document("site-content_1", "10", &body, Some(ATTACHMENT_PIPELINE))
            .await
            .unwrap();

        let stored = provider.document("site-content_1", "10").await.unwrap();
        assert!(stored.get("content").is_none());
        assert_eq!(stored["attachment"]["content"], "<p>Body text</p>");
        assert_eq!(provider.count("site-content_1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_pipeline_rejects_write() {
        let provider = InMemorySearchProvider::new();
        let result = provider
            .index_document("idx", "1", &json!({}), Some(ATTACHMENT_PIPELINE))
            .await;

        assert!(matches!(result, Err(SearchIndexError::Rejected { status: 404, .. })));
        assert_eq!(provider.count("idx").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_attachment_processor() {
        let provider = InMemorySearchProvider::without_attachment_processor();
        let err = provider
            .put_pipeline(ATTACHMENT_PIPELINE, &attachment_pipeline())
            .await
            .unwrap_err();

        assert!(err.is_missing_attachment_processor());
        assert!(!provider.has_pipeline(ATTACHMENT_PIPELINE).await);
    }

    #[tokio::test]
    async fn test_unavailable_engine() {
        let provider = InMemorySearchProvider::new();
        provider.set_available(false);

        assert!(provider.node_info().await.unwrap_err().is_connection());
        assert!(provider.count("idx").await.is_err());

        provider.set_available(true);
        assert!(provider.node_info().await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_reports_absence() {
        let provider = InMemorySearchProvider::new();
        provider
            .index_document("idx", "1", &json!({"title": "t"}), None)
            .await
            .unwrap();

        assert!(provider.delete_document("idx", "1").await.unwrap());
        assert!(!provider.delete_document("idx", "1").await.unwrap());
        assert!(!provider.delete_document("other", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_requires_all_terms() {
        let provider = InMemorySearchProvider::new();
        provider
            .index_document("idx", "1", &json!({"title": "Red apple"}), None)
            .await
            .unwrap();
        provider
            .index_document("idx", "2", &json!({"title": "Green apple"}), None)
            .await
            .unwrap();

        let body = json!({
            "query": {"multi_match": {"query": "red apple", "fields": ["title"], "operator": "and"}},
            "highlight": {"pre_tags": ["<em>"], "post_tags": ["</em>"], "fields": {"title": {}}},
            "size": 10
        });
        let response = provider.search("idx", &body).await.unwrap();
        let hits = response["hits"]["hits"].as_array().unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["_id"], "1");
        assert_eq!(hits[0]["highlight"]["title"][0], "<em>Red apple</em>");
    }
}
