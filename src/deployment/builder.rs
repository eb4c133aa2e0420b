//! Single-threaded assembly of a `Deployment`.
//!
//! # Responsibilities
//! - Register mappings and filters, reporting displaced handlers
//! - Order fragments and apply their contributions in that order
//! - Collect handler / filter implementations and error pages
//! - Reject references to names with no implementation
//!
//! # Design Decisions
//! - Every error here is a configuration error: fatal to the deployment,
//!   reported with the offending names
//! - Duplicate literal patterns overwrite unless strict mode is on

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::deployment::{Deployment, DispatchSettings};
use crate::dispatch::{ErrorPageLookup, ErrorPages, Filter, Handler};
use crate::filter::{ChainBuilder, FilterEntry, FilterIndex, ANY_HANDLER};
use crate::fragment::{self, Fragment, OrderingEntry, OrderingError};
use crate::observability::metrics;
use crate::routing::{PatternError, PatternTable};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error("pattern `{pattern}` is mapped to both `{existing}` and `{handler}`")]
    DuplicateMapping {
        pattern: String,
        existing: String,
        handler: String,
    },

    #[error("pattern `{pattern}` maps to handler `{handler}`, which is not defined")]
    UnknownHandler { pattern: String, handler: String },

    #[error("filter `{0}` is registered but not defined")]
    UnknownFilter(String),

    #[error("handler `{0}` is defined more than once")]
    DuplicateHandler(String),

    #[error("filter `{0}` is defined more than once")]
    DuplicateFilter(String),

    #[error("`{name}` is not a valid {what}: {reason}")]
    Invalid {
        what: &'static str,
        name: String,
        reason: String,
    },
}

/// What one fragment adds to the deployment once its position is known.
#[derive(Debug, Clone, Default)]
pub struct FragmentContribution {
    pub fragment: Fragment,
    /// `(pattern, handler name)` pairs.
    pub mappings: Vec<(String, String)>,
    pub filters: Vec<FilterEntry>,
}

impl FragmentContribution {
    pub fn new(fragment: Fragment) -> Self {
        Self {
            fragment,
            ..Default::default()
        }
    }

    pub fn mapping(mut self, pattern: impl Into<String>, handler: impl Into<String>) -> Self {
        self.mappings.push((pattern.into(), handler.into()));
        self
    }

    pub fn filter(mut self, entry: FilterEntry) -> Self {
        self.filters.push(entry);
        self
    }
}

pub struct DeploymentBuilder {
    name: String,
    table: PatternTable,
    index: FilterIndex,
    handlers: HashMap<String, Arc<dyn Handler>>,
    filters: HashMap<String, Arc<dyn Filter>>,
    error_pages: Arc<dyn ErrorPageLookup>,
    settings: DispatchSettings,
    reject_duplicate_mappings: bool,
    fragment_order: Vec<String>,
}

impl DeploymentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: PatternTable::new(),
            index: FilterIndex::new(),
            handlers: HashMap::new(),
            filters: HashMap::new(),
            error_pages: Arc::new(ErrorPages::new()),
            settings: DispatchSettings::default(),
            reject_duplicate_mappings: false,
            fragment_order: Vec::new(),
        }
    }

    pub fn settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Fail instead of overwriting when a literal pattern is registered for a second handler.
    pub fn reject_duplicate_mappings(mut self, reject: bool) -> Self {
        self.reject_duplicate_mappings = reject;
        self
    }

    pub fn error_pages(mut self, pages: impl ErrorPageLookup + 'static) -> Self {
        self.error_pages = Arc::new(pages);
        self
    }

    pub fn handler(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Result<Self, DeploymentError> {
        self.add_handler(name, handler)?;
        Ok(self)
    }

    pub fn filter(mut self, name: impl Into<String>, filter: Arc<dyn Filter>) -> Result<Self, DeploymentError> {
        self.add_filter(name, filter)?;
        Ok(self)
    }

    pub fn add_handler(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Result<(), DeploymentError> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(DeploymentError::DuplicateHandler(name));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn add_filter(&mut self, name: impl Into<String>, filter: Arc<dyn Filter>) -> Result<(), DeploymentError> {
        let name = name.into();
        if self.filters.contains_key(&name) {
            return Err(DeploymentError::DuplicateFilter(name));
        }
        self.filters.insert(name, filter);
        Ok(())
    }

    /// Map `pattern` to `handler`. Returns the handler it displaced, if any.
    pub fn register_mapping(&mut self, pattern: &str, handler: &str) -> Result<Option<String>, DeploymentError> {
        if self.reject_duplicate_mappings {
            if let Some(existing) = self.table.get(pattern)? {
                if existing.handler_name != handler {
                    return Err(DeploymentError::DuplicateMapping {
                        pattern: pattern.to_string(),
                        existing: existing.handler_name.clone(),
                        handler: handler.to_string(),
                    });
                }
            }
        }

        let displaced = self.table.register(pattern, handler)?;
        match &displaced {
            Some(previous) => tracing::warn!(
                pattern = %pattern,
                previous = %previous,
                handler = %handler,
                "Mapping overrides an earlier registration"
            ),
            None => tracing::debug!(pattern = %pattern, handler = %handler, "Mapping registered"),
        }
        Ok(displaced)
    }

    pub fn register_filter(&mut self, entry: FilterEntry) -> Result<(), DeploymentError> {
        self.index.register(entry)?;
        Ok(())
    }

    /// Order the fragments and apply each contribution in that order.
    ///
    /// Contributions left out of an absolute ordering are dropped. Returns the
    /// applied order.
    pub fn register_fragments(
        &mut self,
        contributions: Vec<FragmentContribution>,
        absolute_order: Option<&[OrderingEntry]>,
    ) -> Result<Vec<String>, DeploymentError> {
        let fragments: Vec<Fragment> = contributions.iter().map(|c| c.fragment.clone()).collect();
        let ordered = fragment::order(&fragments, absolute_order)?;
        tracing::info!(order = ?ordered, "Fragment order resolved");

        let mut by_name: HashMap<String, FragmentContribution> = contributions
            .into_iter()
            .map(|c| (c.fragment.name.clone(), c))
            .collect();

        for name in &ordered {
            let Some(contribution) = by_name.remove(name) else {
                continue;
            };
            for (pattern, handler) in &contribution.mappings {
                self.register_mapping(pattern, handler)?;
            }
            for entry in contribution.filters {
                self.register_filter(entry)?;
            }
        }
        for name in by_name.keys() {
            tracing::info!(fragment = %name, "Fragment excluded by absolute ordering");
        }

        self.fragment_order.extend(ordered.iter().cloned());
        Ok(ordered)
    }

    /// Check references and freeze the tables.
    pub fn build(self) -> Result<Deployment, DeploymentError> {
        for entry in self.table.entries() {
            if !self.handlers.contains_key(&entry.handler_name) {
                return Err(DeploymentError::UnknownHandler {
                    pattern: entry.literal.clone(),
                    handler: entry.handler_name.clone(),
                });
            }
        }
        for registered in self.index.filters() {
            if !self.filters.contains_key(&registered.name) {
                return Err(DeploymentError::UnknownFilter(registered.name.clone()));
            }
            for target in &registered.target_handler_names {
                if target != ANY_HANDLER && !self.handlers.contains_key(target) {
                    tracing::warn!(
                        filter = %registered.name,
                        handler = %target,
                        "Filter targets a handler that is not defined"
                    );
                }
            }
        }

        tracing::info!(
            deployment = %self.name,
            patterns = self.table.len(),
            filters = self.index.len(),
            handlers = self.handlers.len(),
            "Deployment built"
        );
        metrics::record_deployment(self.table.len(), self.index.len());

        Ok(Deployment {
            name: self.name,
            table: self.table,
            chains: ChainBuilder::new(self.index),
            handlers: self.handlers,
            filters: self.filters,
            error_pages: self.error_pages,
            settings: self.settings,
            fragment_order: self.fragment_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{filter_fn, handler_fn, FilterAction};

    fn noop() -> Arc<dyn Handler> {
        handler_fn(|_, _| Ok(()))
    }

    #[test]
    fn test_duplicate_mapping_overwrites_by_default() {
        let mut builder = DeploymentBuilder::new("app");
        assert_eq!(builder.register_mapping("/a", "h1").unwrap(), None);
        assert_eq!(builder.register_mapping("/a", "h2").unwrap(), Some("h1".to_string()));

        let deployment = builder
            .handler("h1", noop())
            .unwrap()
            .handler("h2", noop())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(deployment.resolve("/a").unwrap().handler_name, "h2");
    }

    #[test]
    fn test_strict_mode_rejects_duplicate_mapping() {
        let mut builder = DeploymentBuilder::new("app").reject_duplicate_mappings(true);
        builder.register_mapping("/a/*", "h1").unwrap();
        builder.register_mapping("/a/*", "h1").unwrap();
        let err = builder.register_mapping("/a/*", "h2").unwrap_err();
        assert!(matches!(
            err,
            DeploymentError::DuplicateMapping { ref existing, ref handler, .. }
                if existing == "h1" && handler == "h2"
        ));
    }

    #[test]
    fn test_build_rejects_undefined_names() {
        let mut builder = DeploymentBuilder::new("app");
        builder.register_mapping("/a", "missing").unwrap();
        assert!(matches!(
            builder.build(),
            Err(DeploymentError::UnknownHandler { ref handler, .. }) if handler == "missing"
        ));

        let mut builder = DeploymentBuilder::new("app");
        builder.register_filter(FilterEntry::new("ghost").url_pattern("/*")).unwrap();
        assert!(matches!(builder.build(), Err(DeploymentError::UnknownFilter(ref f)) if f == "ghost"));
    }

    #[test]
    fn test_duplicate_implementation_rejected() {
        let mut builder = DeploymentBuilder::new("app");
        builder.add_handler("h", noop()).unwrap();
        assert!(matches!(
            builder.add_handler("h", noop()),
            Err(DeploymentError::DuplicateHandler(_))
        ));
        builder
            .add_filter("f", filter_fn(|_, _| Ok(FilterAction::Continue)))
            .unwrap();
        assert!(matches!(
            builder.add_filter("f", filter_fn(|_, _| Ok(FilterAction::Continue))),
            Err(DeploymentError::DuplicateFilter(_))
        ));
    }

    #[test]
    fn test_fragments_applied_in_order() {
        let mut builder = DeploymentBuilder::new("app");
        let contributions = vec![
            FragmentContribution::new(Fragment::new("late").after("early")).mapping("/x", "late"),
            FragmentContribution::new(Fragment::new("early")).mapping("/x", "early"),
        ];
        let order = builder.register_fragments(contributions, None).unwrap();
        assert_eq!(order, vec!["early", "late"]);

        let deployment = builder
            .handler("early", noop())
            .unwrap()
            .handler("late", noop())
            .unwrap()
            .build()
            .unwrap();
        // The later fragment's registration wins.
        assert_eq!(deployment.resolve("/x").unwrap().handler_name, "late");
        assert_eq!(deployment.fragment_order(), ["early", "late"]);
    }

    #[test]
    fn test_absolute_order_drops_unlisted_fragment() {
        let mut builder = DeploymentBuilder::new("app");
        let contributions = vec![
            FragmentContribution::new(Fragment::new("kept")).mapping("/kept", "h"),
            FragmentContribution::new(Fragment::new("dropped")).mapping("/dropped", "h"),
        ];
        let absolute = [OrderingEntry::named("kept")];
        builder.register_fragments(contributions, Some(&absolute)).unwrap();

        let deployment = builder.handler("h", noop()).unwrap().build().unwrap();
        assert!(deployment.resolve("/kept").is_some());
        assert!(deployment.resolve("/dropped").is_none());
    }

    #[test]
    fn test_ordering_cycle_is_fatal() {
        let mut builder = DeploymentBuilder::new("app");
        let contributions = vec![
            FragmentContribution::new(Fragment::new("a").before("b")),
            FragmentContribution::new(Fragment::new("b").before("a")),
        ];
        assert!(matches!(
            builder.register_fragments(contributions, None),
            Err(DeploymentError::Ordering(OrderingError::Cycle { .. }))
        ));
    }
}
