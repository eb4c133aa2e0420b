//! Ordered filter registrations.
//!
//! # Responsibilities
//! - Hold every filter entry in insertion order
//! - Answer "which filters apply" for one dispatch
//!
//! # Design Decisions
//! - Written only during the deployment phase, read-only afterwards
//! - URL-pattern matches are listed before handler-name matches
//! - A filter name appears once per chain, at its first matching position

use std::collections::HashSet;

use crate::filter::entry::{DispatchType, FilterEntry, RegisteredFilter};
use crate::routing::PatternError;

#[derive(Debug, Default, Clone)]
pub struct FilterIndex {
    filters: Vec<RegisteredFilter>,
}

impl FilterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration. Its position in the index is its chain order.
    pub fn register(&mut self, entry: FilterEntry) -> Result<(), PatternError> {
        let order = self.filters.len() as u64;
        let compiled = RegisteredFilter::compile(entry, order)?;
        tracing::debug!(
            filter = %compiled.name,
            order = compiled.order,
            dispatch = ?compiled.dispatch_types.iter().collect::<Vec<_>>(),
            "Filter registered"
        );
        self.filters.push(compiled);
        Ok(())
    }

    /// Names of the filters that apply to one dispatch, in chain order.
    ///
    /// `path_target` is the matched pattern of the current mapping, or the
    /// request path when no handler was found. `handler` is the resolved
    /// handler name, if any.
    pub fn matching(
        &self,
        path_target: &str,
        handler: Option<&str>,
        dispatch: DispatchType,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        let applicable = move || self.filters.iter().filter(move |f| f.applies_to(dispatch));

        for filter in applicable() {
            if filter.matches_path(path_target) && seen.insert(filter.name.as_str()) {
                names.push(filter.name.clone());
            }
        }

        if let Some(handler) = handler {
            for filter in applicable() {
                if filter.matches_handler(handler) && seen.insert(filter.name.as_str()) {
                    names.push(filter.name.clone());
                }
            }
        }

        names
    }

    pub fn filters(&self) -> &[RegisteredFilter] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
