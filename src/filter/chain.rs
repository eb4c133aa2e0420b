//! Chain assembly and caching.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::filter::entry::DispatchType;
use crate::filter::index::FilterIndex;
use crate::observability::metrics;
use crate::routing::ResolvedMapping;

/// The ordered invocation list for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chain {
    pub ordered_filter_names: Vec<String>,
    /// `None` when the path resolved to no handler.
    pub terminal_handler_name: Option<String>,
}

impl Chain {
    /// Number of invocable elements, counting the terminal handler.
    pub fn len(&self) -> usize {
        self.ordered_filter_names.len() + usize::from(self.terminal_handler_name.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChainKey {
    handler: String,
    pattern: String,
    dispatch: DispatchType,
}

/// Builds chains from a frozen filter index and memoises them.
#[derive(Debug)]
pub struct ChainBuilder {
    index: FilterIndex,
    cache: DashMap<ChainKey, Arc<Chain>>,
}

impl ChainBuilder {
    pub fn new(index: FilterIndex) -> Self {
        Self {
            index,
            cache: DashMap::new(),
        }
    }

    /// Chain for a resolved mapping, or for an unmapped `path` when `mapping` is `None`.
    ///
    /// Mapped chains are cached by handler, matched pattern and dispatch type.
    /// Concurrent misses may compute the same chain twice; either result is
    /// identical since the index never changes.
    pub fn build_chain(
        &self,
        mapping: Option<&ResolvedMapping>,
        path: &str,
        dispatch: DispatchType,
    ) -> Arc<Chain> {
        let Some(mapping) = mapping else {
            return Arc::new(Chain {
                ordered_filter_names: self.index.matching(path, None, dispatch),
                terminal_handler_name: None,
            });
        };

        let key = ChainKey {
            handler: mapping.handler_name.clone(),
            pattern: mapping.matched_pattern.clone(),
            dispatch,
        };
        if let Some(chain) = self.cache.get(&key) {
            return chain.value().clone();
        }

        metrics::record_chain_cache_miss(dispatch);
        let chain = Arc::new(Chain {
            ordered_filter_names: self.index.matching(
                &mapping.matched_pattern,
                Some(&mapping.handler_name),
                dispatch,
            ),
            terminal_handler_name: Some(mapping.handler_name.clone()),
        });
        tracing::debug!(
            handler = %mapping.handler_name,
            pattern = %mapping.matched_pattern,
            dispatch = %dispatch,
            filters = ?chain.ordered_filter_names,
            "Chain built"
        );
        self.cache.insert(key, chain.clone());
        chain
    }

    pub fn index(&self) -> &FilterIndex {
        &self.index
    }

    pub fn cached_chains(&self) -> usize {
        self.cache.len()
    }
}
