//! Settings, validation and dependency wiring.

mod dependencies;

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use content_index_repository::opensearch::IndexConfig;
use content_index_repository::{OpenSearchConfig, SearchIndexService, SearchIndexServiceConfig};
use content_index_shared::Partition;
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::warn;
use url::Url;

use crate::errors::ConfigError;
use crate::policy::IndexabilityPolicy;
use crate::strategies::{ContentPostProcessor, ElementContentCallback, ExtraField, ResultFormatter};

pub use dependencies::{Dependencies, Pipeline};

/// Default search engine URL.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9200";

/// Default engine and fetch request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connect timeout for preview fetches.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection retry interval in seconds.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Partitions provisioned by the bootstrap binary when none are configured.
pub const DEFAULT_PARTITIONS: &str = "1:en";

/// Connection mode for the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection every retry interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Anything else defaults to "retry".
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!(value, "Invalid SEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Highlight markup wrapped around matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightSettings {
    pub pre_tags: Vec<String>,
    pub post_tags: Vec<String>,
}

/// Basic auth credentials for the search engine.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Indexer settings.
///
/// Loaded once and passed into constructors; components never look settings
/// up on their own. Saving new settings means rebuilding the pipeline and
/// running `SyncCoordinator::on_settings_saved`.
#[derive(Clone)]
pub struct Settings {
    pub endpoint: String,
    pub credentials: Option<Credentials>,
    pub index_name_prefix: Option<String>,
    pub blacklisted_entry_types: Vec<String>,
    pub blacklisted_asset_volumes: Vec<String>,
    pub highlight: HighlightSettings,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub content_callback: Option<Arc<dyn ElementContentCallback>>,
    pub post_processor: Option<Arc<dyn ContentPostProcessor>>,
    pub result_formatter: Option<Arc<dyn ResultFormatter>>,
    pub extra_fields: Vec<ExtraField>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("index_name_prefix", &self.index_name_prefix)
            .field("blacklisted_entry_types", &self.blacklisted_entry_types)
            .field("blacklisted_asset_volumes", &self.blacklisted_asset_volumes)
            .field("highlight", &self.highlight)
            .field("request_timeout", &self.request_timeout)
            .field("connection_mode", &self.connection_mode)
            .field("content_callback", &self.content_callback.is_some())
            .field("post_processor", &self.post_processor.is_some())
            .field("result_formatter", &self.result_formatter.is_some())
            .field("extra_fields", &self.extra_fields)
            .finish()
    }
}

impl Settings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: None,
            index_name_prefix: None,
            blacklisted_entry_types: Vec::new(),
            blacklisted_asset_volumes: Vec::new(),
            highlight: HighlightSettings::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: CONNECT_TIMEOUT,
            connection_mode: ConnectionMode::Retry,
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            content_callback: None,
            post_processor: None,
            result_formatter: None,
            extra_fields: Vec::new(),
        }
    }

    /// Load settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_ENDPOINT`: Engine URL (default: http://localhost:9200)
    /// - `SEARCH_USERNAME` / `SEARCH_PASSWORD`: Basic auth, enabled when both are set
    /// - `INDEX_NAME_PREFIX`: Index name prefix, at most 5 lowercase letters
    /// - `BLACKLISTED_ENTRY_TYPES`: Comma-separated entry type handles
    /// - `BLACKLISTED_ASSET_VOLUMES`: Comma-separated asset volume handles
    /// - `HIGHLIGHT_PRE_TAGS` / `HIGHLIGHT_POST_TAGS`: Highlight markup
    /// - `SEARCH_REQUEST_TIMEOUT_SECS`: Request timeout (default: 30)
    /// - `SEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `SEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - Loaded settings, not yet validated
    /// * `Err(ConfigError)` - If a numeric variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let list = |name: &str| {
            non_empty(name)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        let seconds = |name: &str, default: u64| -> Result<Duration, ConfigError> {
            match non_empty(name) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::invalid_value(name, v.as_str())),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let mut settings =
            Self::new(non_empty("SEARCH_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()));

        if let (Some(username), Some(password)) =
            (non_empty("SEARCH_USERNAME"), non_empty("SEARCH_PASSWORD"))
        {
            settings.credentials = Some(Credentials { username, password });
        }
        settings.index_name_prefix = non_empty("INDEX_NAME_PREFIX");
        settings.blacklisted_entry_types = list("BLACKLISTED_ENTRY_TYPES");
        settings.blacklisted_asset_volumes = list("BLACKLISTED_ASSET_VOLUMES");
        settings.highlight = HighlightSettings {
            pre_tags: non_empty("HIGHLIGHT_PRE_TAGS").into_iter().collect(),
            post_tags: non_empty("HIGHLIGHT_POST_TAGS").into_iter().collect(),
        };
        settings.request_timeout =
            seconds("SEARCH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        settings.connection_mode = non_empty("SEARCH_CONNECTION_MODE")
            .map(|v| ConnectionMode::parse(&v))
            .unwrap_or(ConnectionMode::Retry);
        settings.retry_interval = seconds("SEARCH_RETRY_INTERVAL_SECS", DEFAULT_RETRY_INTERVAL_SECS)?;

        Ok(settings)
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_index_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_name_prefix = Some(prefix.into());
        self
    }

    pub fn with_blacklisted_entry_types<I, S>(mut self, handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklisted_entry_types = handles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_blacklisted_asset_volumes<I, S>(mut self, handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklisted_asset_volumes = handles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_highlight_tags(mut self, pre_tag: impl Into<String>, post_tag: impl Into<String>) -> Self {
        self.highlight = HighlightSettings {
            pre_tags: vec![pre_tag.into()],
            post_tags: vec![post_tag.into()],
        };
        self
    }

    pub fn with_content_callback<C>(mut self, callback: C) -> Self
    where
        C: ElementContentCallback + 'static,
    {
        self.content_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_post_processor<P>(mut self, processor: P) -> Self
    where
        P: ContentPostProcessor + 'static,
    {
        self.post_processor = Some(Arc::new(processor));
        self
    }

    pub fn with_result_formatter<R>(mut self, formatter: R) -> Self
    where
        R: ResultFormatter + 'static,
    {
        self.result_formatter = Some(Arc::new(formatter));
        self
    }

    pub fn with_extra_field(mut self, field: ExtraField) -> Self {
        self.extra_fields.push(field);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.connection_mode = mode;
        self
    }

    /// Endpoint with a scheme; bare `host:port` values get `http://`.
    pub fn normalized_endpoint(&self) -> String {
        let endpoint = self.endpoint.trim();
        if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        }
    }

    /// Check the endpoint and the index name prefix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.normalized_endpoint();
        let url =
            Url::parse(&endpoint).map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }

        if let Some(prefix) = &self.index_name_prefix {
            if !IndexConfig::is_valid_prefix(prefix) {
                return Err(ConfigError::InvalidPrefix(prefix.clone()));
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> IndexabilityPolicy {
        IndexabilityPolicy::new(
            self.blacklisted_entry_types.iter().cloned(),
            self.blacklisted_asset_volumes.iter().cloned(),
        )
    }

    pub fn search_index_config(&self) -> SearchIndexServiceConfig {
        SearchIndexServiceConfig::new(IndexConfig::new(self.index_name_prefix.clone()))
    }

    pub fn opensearch_config(&self) -> OpenSearchConfig {
        let config = OpenSearchConfig::new(self.normalized_endpoint())
            .with_timeout(self.request_timeout)
            .with_connect_timeout(self.connect_timeout);
        match &self.credentials {
            Some(c) => config.with_credentials(c.username.clone(), c.password.clone()),
            None => config,
        }
    }

    /// Mappings of the configured extra fields.
    pub fn extra_field_mappings(&self) -> Map<String, Value> {
        self.extra_fields
            .iter()
            .map(|f| (f.name.clone(), f.mapping.clone()))
            .collect()
    }
}

/// Settings checks that need a live engine.
pub struct SettingsValidator;

impl SettingsValidator {
    /// Validate settings and require a successful node info call.
    ///
    /// Settings that fail here must not be saved.
    pub async fn validate_with_connectivity(
        settings: &Settings,
        search: &SearchIndexService,
    ) -> Result<(), ConfigError> {
        settings.validate()?;
        let reachable = timeout(settings.connect_timeout, search.test_connection())
            .await
            .unwrap_or(false);
        if !reachable {
            return Err(ConfigError::Connectivity(settings.normalized_endpoint()));
        }
        Ok(())
    }
}

/// Parse a partition list such as `1:en,2:fr-FR`.
///
/// Used by the bootstrap binary (`CONTENT_PARTITIONS`).
pub fn parse_partitions(value: &str) -> Result<Vec<Partition>, ConfigError> {
    let mut seen = HashSet::new();
    let mut partitions = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (id, language) = part
            .split_once(':')
            .ok_or_else(|| ConfigError::invalid_value("CONTENT_PARTITIONS", part))?;
        let site_id = id
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| ConfigError::invalid_value("CONTENT_PARTITIONS", part))?;
        if !seen.insert(site_id) {
            return Err(ConfigError::invalid_value("CONTENT_PARTITIONS", part));
        }
        partitions.push(Partition::new(site_id, language.trim()));
    }
    Ok(partitions)
}
