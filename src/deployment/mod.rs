//! Deployment subsystem.
//!
//! # Data Flow
//! ```text
//! Deployment phase (single-threaded):
//!     descriptor (config) or code
//!     → builder.rs: fragments ordered, contributions applied in order,
//!       mappings → PatternTable, filters → FilterIndex,
//!       handler / filter implementations, error pages
//!     → build(): reference checks → frozen Deployment
//!
//! Serving:
//!     handle.rs (ArcSwap<Deployment>)
//!     → each request loads one snapshot, dispatches against it
//!     → redeploy = build a new Deployment, swap it in
//! ```
//!
//! # Design Decisions
//! - Nothing in a `Deployment` is mutable except the chain cache
//! - Redeployment is the only way a cached chain is invalidated

pub mod builder;
pub mod descriptor;
pub mod handle;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dispatch::{ErrorPageLookup, Exchange, Filter, Handler, Request, DEFAULT_BUFFER_SIZE};
use crate::filter::{Chain, ChainBuilder, DispatchType, FilterIndex};
use crate::routing::{PatternTable, ResolvedMapping};

pub use builder::{DeploymentBuilder, DeploymentError, FragmentContribution};
pub use descriptor::build_deployment;
pub use handle::DeploymentHandle;

/// Per-deployment dispatch limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Maximum nesting of forward / include dispatches.
    pub max_depth: usize,
    /// Response bytes buffered before the response commits.
    pub buffer_size: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_depth: 16,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// One running application: its frozen routing tables and implementations.
pub struct Deployment {
    name: String,
    pub(crate) table: PatternTable,
    pub(crate) chains: ChainBuilder,
    pub(crate) handlers: HashMap<String, Arc<dyn Handler>>,
    pub(crate) filters: HashMap<String, Arc<dyn Filter>>,
    pub(crate) error_pages: Arc<dyn ErrorPageLookup>,
    pub(crate) settings: DispatchSettings,
    fragment_order: Vec<String>,
}

impl Deployment {
    pub fn builder(name: impl Into<String>) -> DeploymentBuilder {
        DeploymentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Best mapping for `path`, or `None` for NotFound.
    pub fn resolve(&self, path: &str) -> Option<ResolvedMapping> {
        self.table.resolve(path)
    }

    pub fn build_chain(
        &self,
        mapping: Option<&ResolvedMapping>,
        path: &str,
        dispatch: DispatchType,
    ) -> Arc<Chain> {
        self.chains.build_chain(mapping, path, dispatch)
    }

    /// A fresh exchange using this deployment's buffer size.
    pub fn exchange(&self, request: Request) -> Exchange {
        Exchange::with_buffer_size(request, self.settings.buffer_size)
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    pub fn filter_index(&self) -> &FilterIndex {
        self.chains.index()
    }

    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    /// Fragments in the order their contributions were applied.
    pub fn fragment_order(&self) -> &[String] {
        &self.fragment_order
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn cached_chains(&self) -> usize {
        self.chains.cached_chains()
    }
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<&String> = self.handlers.keys().collect();
        handlers.sort();
        let mut filters: Vec<&String> = self.filters.keys().collect();
        filters.sort();
        f.debug_struct("Deployment")
            .field("name", &self.name)
            .field("patterns", &self.table.len())
            .field("handlers", &handlers)
            .field("filters", &filters)
            .field("error_pages", &self.error_pages)
            .field("settings", &self.settings)
            .field("fragment_order", &self.fragment_order)
            .finish()
    }
}
