//! Content extraction.
//!
//! Produces the bytes that get base64 encoded into the `content` field:
//! either from a configured callback, from stored file bytes, or by fetching
//! the item's preview and cutting out the indexed region.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use tracing::{debug, instrument};

use crate::config::Settings;
use crate::content::{ContentItem, RenderPath};
use crate::errors::ExtractError;
use crate::strategies::{ContentPostProcessor, ElementContentCallback};

pub const INDEXED_CONTENT_BEGIN: &str = "<!-- BEGIN indexed content -->";
pub const INDEXED_CONTENT_END: &str = "<!-- END indexed content -->";

/// Result of an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Content(Vec<u8>),
    /// Nothing renders the item.
    NotIndexable,
}

/// Keep only the marked region of a page, if it has one.
///
/// The region runs from the first begin marker to the last end marker and is
/// prefixed with a doctype so the ingest pipeline still sees an HTML
/// document. The result is trimmed.
pub fn extract_indexed_region(html: &str) -> String {
    let region = html.find(INDEXED_CONTENT_BEGIN).and_then(|begin| {
        let start = begin + INDEXED_CONTENT_BEGIN.len();
        html[start..]
            .rfind(INDEXED_CONTENT_END)
            .map(|end| &html[start..start + end])
    });

    match region {
        Some(inner) => format!("<!DOCTYPE html>{}", inner.trim()),
        None => html.trim().to_string(),
    }
}

/// HTTP client for preview pages.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: ReqwestClient,
}

impl PageFetcher {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, ExtractError> {
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ExtractError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Fetch a page body.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(body))` - On `200 OK`
    /// * `Ok(None)` - On any other success status (nothing rendered)
    /// * `Err(ExtractError)` - On transport failures and error statuses
    pub async fn fetch(&self, url: &str) -> Result<Option<String>, ExtractError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ExtractError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.as_u16() == 200 {
            let body = response
                .text()
                .await
                .map_err(|source| ExtractError::Transport {
                    url: url.to_string(),
                    source,
                })?;
            return Ok(Some(body));
        }
        if status.is_success() {
            debug!(url, status = status.as_u16(), "Preview rendered nothing");
            return Ok(None);
        }
        Err(ExtractError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Chooses the extraction strategy for an item.
///
/// A configured content callback takes precedence over everything else.
/// Otherwise files contribute their stored bytes and other items are fetched
/// through their preview URL, passed to the post-processor, then cut down to
/// the marked region.
#[derive(Clone)]
pub struct ContentExtractor {
    callback: Option<Arc<dyn ElementContentCallback>>,
    post_processor: Option<Arc<dyn ContentPostProcessor>>,
    fetcher: PageFetcher,
}

impl ContentExtractor {
    pub fn new(
        callback: Option<Arc<dyn ElementContentCallback>>,
        post_processor: Option<Arc<dyn ContentPostProcessor>>,
        fetcher: PageFetcher,
    ) -> Self {
        Self {
            callback,
            post_processor,
            fetcher,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ExtractError> {
        Ok(Self::new(
            settings.content_callback.clone(),
            settings.post_processor.clone(),
            PageFetcher::new(settings.connect_timeout, settings.request_timeout)?,
        ))
    }

    #[instrument(skip(self, item), fields(element_id = item.id(), site_id = item.site_id()))]
    pub async fn extract(&self, item: &dyn ContentItem) -> Result<Extraction, ExtractError> {
        if let Some(callback) = &self.callback {
            return Ok(match callback.content(item)? {
                Some(text) => Extraction::Content(text.into_bytes()),
                None => Extraction::NotIndexable,
            });
        }

        match item.render_path() {
            RenderPath::File(Some(bytes)) => Ok(Extraction::Content(bytes)),
            RenderPath::File(None) => {
                debug!("Stored file could not be read");
                Ok(Extraction::NotIndexable)
            }
            RenderPath::Unrenderable => Ok(Extraction::NotIndexable),
            RenderPath::Preview(url) => {
                let Some(mut html) = self.fetcher.fetch(&url).await? else {
                    return Ok(Extraction::NotIndexable);
                };
                if let Some(post_processor) = &self.post_processor {
                    html = post_processor.process(html);
                }
                Ok(Extraction::Content(
                    extract_indexed_region(&html).into_bytes(),
                ))
            }
        }
    }
}
