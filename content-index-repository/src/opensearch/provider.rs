//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts},
    ingest::{IngestDeletePipelineParts, IngestPutPipelineParts},
    CountParts, DeleteParts, ExistsParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;

/// Connection settings for [`OpenSearchProvider`].
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// Engine URL (e.g., "http://localhost:9200").
    pub url: String,
    /// Basic auth credentials as `(username, password)`.
    pub credentials: Option<(String, String)>,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Bound on the node info probe.
    pub connect_timeout: Duration,
}

impl OpenSearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// OpenSearch provider implementation.
///
/// Talks to a single OpenSearch (or Elasticsearch compatible) node.
///
/// # Example
///
/// ```ignore
/// use content_index_repository::opensearch::{OpenSearchConfig, OpenSearchProvider};
///
/// let config = OpenSearchConfig::new("http://localhost:9200").with_credentials("elastic", "secret");
/// let provider = OpenSearchProvider::new(config)?;
/// let exists = provider.index_exists("site-content_1").await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    connect_timeout: Duration,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider for the configured node.
    ///
    /// No request is sent; use `node_info` to probe connectivity.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or the transport cannot be built
    pub fn new(config: OpenSearchConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.timeout);
        if let Some((username, password)) = config.credentials.clone() {
            builder = builder.auth(Credentials::Basic(username, password));
        }
        let transport = builder
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(
            url = %config.url,
            auth = config.credentials.is_some(),
            timeout_secs = config.timeout.as_secs(),
            connect_timeout_secs = config.connect_timeout.as_secs(),
            "Created OpenSearch provider"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
            connect_timeout: config.connect_timeout,
        })
    }

    /// Turn a non-success response into a `Rejected` error.
    async fn ensure_success(
        operation: &str,
        response: Response,
    ) -> Result<Response, SearchIndexError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(operation, status = %status, body = %body, "Search engine request failed");
        Err(SearchIndexError::rejected(operation, status.as_u16(), body))
    }

    async fn json_body(response: Response) -> Result<Value, SearchIndexError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn node_info(&self) -> Result<Value, SearchIndexError> {
        let request = async {
            let response = self
                .client
                .info()
                .send()
                .await
                .map_err(|e| SearchIndexError::connection(e.to_string()))?;
            let response = Self::ensure_success("node info", response).await?;
            Self::json_body(response).await
        };

        timeout(self.connect_timeout, request).await.map_err(|_| {
            SearchIndexError::connection(format!(
                "no node info response within {}ms",
                self.connect_timeout.as_millis()
            ))
        })?
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Self::ensure_success("index exists", response)
                .await
                .map(|_| false),
        }
    }

    /// Create an index with the given settings and mappings.
    ///
    /// # Arguments
    ///
    /// * `index` - The index name
    /// * `body` - Settings and mappings, see `index_config::get_index_settings`
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body.clone())
            .send()
            .await
            .map_err(|e| SearchIndexError::index_management(e.to_string()))?;

        Self::ensure_success("create index", response).await?;
        info!(index, "Created index");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_management(e.to_string()))?;

        // 404 is acceptable - index may not exist
        if response.status_code().as_u16() == 404 {
            debug!(index, "Index already absent");
            return Ok(());
        }
        Self::ensure_success("delete index", response).await?;
        info!(index, "Deleted index");
        Ok(())
    }

    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .ingest()
            .put_pipeline(IngestPutPipelineParts::Id(id))
            .body(body.clone())
            .send()
            .await
            .map_err(|e| SearchIndexError::pipeline(e.to_string()))?;

        Self::ensure_success("put pipeline", response).await?;
        debug!(pipeline = id, "Installed ingest pipeline");
        Ok(())
    }

    async fn delete_pipeline(&self, id: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .ingest()
            .delete_pipeline(IngestDeletePipelineParts::Id(id))
            .send()
            .await
            .map_err(|e| SearchIndexError::pipeline(e.to_string()))?;

        if response.status_code().as_u16() == 404 {
            return Ok(());
        }
        Self::ensure_success("delete pipeline", response).await?;
        Ok(())
    }

    async fn document_exists(&self, index: &str, id: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .exists(ExistsParts::IndexId(index, id))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Self::ensure_success("document exists", response)
                .await
                .map(|_| false),
        }
    }

    /// Write a document, creating or replacing it.
    ///
    /// # Arguments
    ///
    /// * `index` - Target index name
    /// * `id` - Document id
    /// * `body` - Document source
    /// * `pipeline` - Ingest pipeline to run on write
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was written
    /// * `Err(SearchIndexError)` - If the request fails or the engine rejects it
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Value,
        pipeline: Option<&str>,
    ) -> Result<(), SearchIndexError> {
        let mut request = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(body.clone());
        if let Some(pipeline) = pipeline {
            request = request.pipeline(pipeline);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchIndexError::index(e.to_string()))?;

        Self::ensure_success("index document", response).await?;
        debug!(index, doc_id = id, "Document indexed");
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .send()
            .await
            .map_err(|e| SearchIndexError::delete(e.to_string()))?;

        // 404 is acceptable - document or index may not exist
        if response.status_code().as_u16() == 404 {
            return Ok(false);
        }
        Self::ensure_success("delete document", response).await?;
        debug!(index, doc_id = id, "Document deleted");
        Ok(true)
    }

    async fn count(&self, index: &str) -> Result<u64, SearchIndexError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::search(e.to_string()))?;

        if response.status_code().as_u16() == 404 {
            return Ok(0);
        }
        let response = Self::ensure_success("count", response).await?;
        let body = Self::json_body(response).await?;
        parse_count(&body)
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value, SearchIndexError> {
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body.clone())
            .send()
            .await
            .map_err(|e| SearchIndexError::search(e.to_string()))?;

        let response = Self::ensure_success("search", response).await?;
        Self::json_body(response).await
    }
}

fn parse_count(body: &Value) -> Result<u64, SearchIndexError> {
    body["count"]
        .as_u64()
        .ok_or_else(|| SearchIndexError::parse(format!("count missing from response: {}", body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(&json!({"count": 42, "_shards": {}})).unwrap(), 42);
    }

    #[test]
    fn test_parse_count_missing() {
        let result = parse_count(&json!({"error": "boom"}));
        assert!(matches!(result.unwrap_err(), SearchIndexError::ParseError(_)));
    }

    #[test]
    fn test_invalid_url_is_a_connection_error() {
        let result = OpenSearchProvider::new(OpenSearchConfig::new("not a url"));
        assert!(matches!(result, Err(SearchIndexError::ConnectionError(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = OpenSearchConfig::new("http://search:9200")
            .with_credentials("elastic", "secret")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.credentials, Some(("elastic".into(), "secret".into())));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_silent_node_fails_within_connect_timeout() {
        // Accepts connections into the backlog but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let provider = OpenSearchProvider::new(
            OpenSearchConfig::new(url).with_connect_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let result = provider.node_info().await;

        assert!(matches!(result, Err(SearchIndexError::ConnectionError(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }
}
