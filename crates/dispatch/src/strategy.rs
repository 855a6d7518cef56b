// ABOUTME: The Strategy trait, closure and URL-filter adapters, and the StrategyRegistry.
// ABOUTME: Strategies are looked up by id; the registry remembers registration order.

//! Pluggable extraction strategies.
//!
//! A strategy receives a [`Document`] and a [`CancelToken`] and returns either
//! a structured [`Extraction`], `None` for "nothing here", or an error. The
//! engine does not know what a strategy does internally.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::document::Document;
use crate::error::DispatchError;
use crate::job::CancelToken;
use crate::result::{Extraction, StrategyId};

/// An invocable extraction routine.
pub trait Strategy: Send + Sync {
    /// Stable identifier used in preference lists.
    fn id(&self) -> &str;

    /// Whether this strategy wants the document at all. Fan-out skips
    /// strategies that return false.
    fn accepts(&self, _document: &Document) -> bool {
        true
    }

    /// Extracts data. Long-running implementations should poll `cancel`.
    fn extract(
        &self,
        document: &Document,
        cancel: &CancelToken,
    ) -> anyhow::Result<Option<Extraction>>;
}

type ExtractFn =
    dyn Fn(&Document, &CancelToken) -> anyhow::Result<Option<Extraction>> + Send + Sync;

/// A strategy backed by a closure.
pub struct FnStrategy {
    id: String,
    f: Box<ExtractFn>,
}

impl FnStrategy {
    pub fn new<F>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document, &CancelToken) -> anyhow::Result<Option<Extraction>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: id.into(),
            f: Box::new(f),
        }
    }
}

impl fmt::Debug for FnStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStrategy").field("id", &self.id).finish()
    }
}

impl Strategy for FnStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn extract(
        &self,
        document: &Document,
        cancel: &CancelToken,
    ) -> anyhow::Result<Option<Extraction>> {
        (self.f)(document, cancel)
    }
}

/// Restricts a strategy to documents whose URL matches a pattern.
///
/// Site-specific item parsers only make sense for their own product pages;
/// this wrapper expresses that as `accepts`.
#[derive(Debug)]
pub struct UrlFilter<S> {
    pattern: Regex,
    inner: S,
}

impl<S: Strategy> UrlFilter<S> {
    pub fn new(pattern: &str, inner: S) -> Result<Self, DispatchError> {
        let pattern = Regex::new(pattern).map_err(DispatchError::configuration_from)?;
        Ok(Self { pattern, inner })
    }
}

impl<S: Strategy> Strategy for UrlFilter<S> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn accepts(&self, document: &Document) -> bool {
        self.pattern.is_match(&document.url) && self.inner.accepts(document)
    }

    fn extract(
        &self,
        document: &Document,
        cancel: &CancelToken,
    ) -> anyhow::Result<Option<Extraction>> {
        if !self.pattern.is_match(&document.url) {
            return Ok(None);
        }
        self.inner.extract(document, cancel)
    }
}

/// Registry for looking up strategies by id.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    map: HashMap<StrategyId, Arc<dyn Strategy>>,
    order: Vec<StrategyId>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("ids", &self.order)
            .finish()
    }
}

impl StrategyRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy under its id, replacing any previous one with the same id.
    pub fn register<S: Strategy + 'static>(&mut self, strategy: S) {
        self.register_arc(Arc::new(strategy));
    }

    pub fn register_arc(&mut self, strategy: Arc<dyn Strategy>) {
        let id = strategy.id().to_string();
        if self.map.insert(id.clone(), strategy).is_none() {
            self.order.push(id);
        }
    }

    /// Looks up a strategy by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Strategy>> {
        self.map.get(id).cloned()
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> &[StrategyId] {
        &self.order
    }

    /// Strategies in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Strategy>> {
        self.order.iter().filter_map(|id| self.map.get(id))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
