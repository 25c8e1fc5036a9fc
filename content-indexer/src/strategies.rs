//! Pluggable behavior configured through `Settings`.
//!
//! Every strategy is implemented for plain closures, so hosts can pass
//! `|item: &dyn ContentItem| ...` where a trait object is expected.

use std::fmt;
use std::sync::Arc;

use content_index_shared::SearchHit;
use serde_json::Value;

use crate::content::ContentItem;
use crate::errors::ExtractError;

/// Produces the indexable text of an item instead of fetching its preview.
pub trait ElementContentCallback: Send + Sync {
    /// # Returns
    ///
    /// * `Ok(Some(text))` - The indexable content
    /// * `Ok(None)` - The item has nothing to index
    /// * `Err(ExtractError)` - If producing the content failed
    fn content(&self, item: &dyn ContentItem) -> Result<Option<String>, ExtractError>;
}

impl<F> ElementContentCallback for F
where
    F: Fn(&dyn ContentItem) -> Option<String> + Send + Sync,
{
    fn content(&self, item: &dyn ContentItem) -> Result<Option<String>, ExtractError> {
        Ok(self(item))
    }
}

/// Transforms a fetched page before the indexed region is cut out of it.
pub trait ContentPostProcessor: Send + Sync {
    fn process(&self, html: String) -> String;
}

impl<F> ContentPostProcessor for F
where
    F: Fn(String) -> String + Send + Sync,
{
    fn process(&self, html: String) -> String {
        self(html)
    }
}

/// Computes the value of an extra field from an item.
pub trait FieldResolver: Send + Sync {
    fn resolve(&self, item: &dyn ContentItem) -> Value;
}

impl<F> FieldResolver for F
where
    F: Fn(&dyn ContentItem) -> Value + Send + Sync,
{
    fn resolve(&self, item: &dyn ContentItem) -> Value {
        self(item)
    }
}

/// Rewrites a search hit. `source` is the stored document.
pub trait ResultFormatter: Send + Sync {
    fn format(&self, hit: SearchHit, source: &Value) -> SearchHit;
}

impl<F> ResultFormatter for F
where
    F: Fn(SearchHit, &Value) -> SearchHit + Send + Sync,
{
    fn format(&self, hit: SearchHit, source: &Value) -> SearchHit {
        self(hit, source)
    }
}

/// Value of an extra field.
#[derive(Clone)]
pub enum FieldValue {
    Literal(Value),
    Resolver(Arc<dyn FieldResolver>),
}

impl FieldValue {
    pub fn resolve(&self, item: &dyn ContentItem) -> Value {
        match self {
            FieldValue::Literal(value) => value.clone(),
            FieldValue::Resolver(resolver) => resolver.resolve(item),
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            FieldValue::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// A site-specific field stored alongside the built-in document fields.
#[derive(Debug, Clone)]
pub struct ExtraField {
    pub name: String,
    /// Index mapping of the field.
    pub mapping: Value,
    /// Highlighter options; the field is highlighted when set.
    pub highlighter: Option<Value>,
    pub value: FieldValue,
}

impl ExtraField {
    pub fn literal(name: impl Into<String>, mapping: Value, value: Value) -> Self {
        Self {
            name: name.into(),
            mapping,
            highlighter: None,
            value: FieldValue::Literal(value),
        }
    }

    pub fn resolved<R>(name: impl Into<String>, mapping: Value, resolver: R) -> Self
    where
        R: FieldResolver + 'static,
    {
        Self {
            name: name.into(),
            mapping,
            highlighter: None,
            value: FieldValue::Resolver(Arc::new(resolver)),
        }
    }

    pub fn with_highlighter(mut self, highlighter: Value) -> Self {
        self.highlighter = Some(highlighter);
        self
    }
}
