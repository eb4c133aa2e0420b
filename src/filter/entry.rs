//! Filter registrations and dispatch types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::routing::{PatternError, UrlPattern};

/// Target-handler name that applies a filter to every handler.
pub const ANY_HANDLER: &str = "*";

/// The reason a routing pass is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatchType {
    Request,
    Forward,
    Include,
    Async,
    Error,
}

impl DispatchType {
    pub const ALL: [DispatchType; 5] = [
        DispatchType::Request,
        DispatchType::Forward,
        DispatchType::Include,
        DispatchType::Async,
        DispatchType::Error,
    ];

    fn bit(self) -> u8 {
        match self {
            DispatchType::Request => 1,
            DispatchType::Forward => 1 << 1,
            DispatchType::Include => 1 << 2,
            DispatchType::Async => 1 << 3,
            DispatchType::Error => 1 << 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DispatchType::Request => "REQUEST",
            DispatchType::Forward => "FORWARD",
            DispatchType::Include => "INCLUDE",
            DispatchType::Async => "ASYNC",
            DispatchType::Error => "ERROR",
        }
    }
}

impl fmt::Display for DispatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispatchType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown dispatch type `{}`", s))
    }
}

/// A set of dispatch types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DispatchTypes(u8);

impl DispatchTypes {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn only(ty: DispatchType) -> Self {
        Self(ty.bit())
    }

    pub fn all() -> Self {
        DispatchType::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, ty: DispatchType) {
        self.0 |= ty.bit();
    }

    pub fn contains(self, ty: DispatchType) -> bool {
        self.0 & ty.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = DispatchType> {
        DispatchType::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl FromIterator<DispatchType> for DispatchTypes {
    fn from_iter<I: IntoIterator<Item = DispatchType>>(iter: I) -> Self {
        let mut set = DispatchTypes::empty();
        for ty in iter {
            set.insert(ty);
        }
        set
    }
}

/// A filter registration as supplied by the deployment collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    pub name: String,
    pub url_patterns: Vec<String>,
    pub target_handler_names: Vec<String>,
    /// Empty means `{REQUEST}`.
    pub dispatch_types: DispatchTypes,
}

impl FilterEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_patterns: Vec::new(),
            target_handler_names: Vec::new(),
            dispatch_types: DispatchTypes::empty(),
        }
    }

    pub fn url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_patterns.push(pattern.into());
        self
    }

    pub fn target_handler(mut self, handler: impl Into<String>) -> Self {
        self.target_handler_names.push(handler.into());
        self
    }

    pub fn dispatch(mut self, ty: DispatchType) -> Self {
        self.dispatch_types.insert(ty);
        self
    }
}

/// A filter entry after pattern parsing, stamped with its insertion order.
#[derive(Debug, Clone)]
pub struct RegisteredFilter {
    pub name: String,
    pub url_patterns: Vec<UrlPattern>,
    pub target_handler_names: Vec<String>,
    pub dispatch_types: DispatchTypes,
    pub order: u64,
}

impl RegisteredFilter {
    pub(crate) fn compile(entry: FilterEntry, order: u64) -> Result<Self, PatternError> {
        let url_patterns = entry
            .url_patterns
            .iter()
            .map(|p| UrlPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        let dispatch_types = if entry.dispatch_types.is_empty() {
            DispatchTypes::only(DispatchType::Request)
        } else {
            entry.dispatch_types
        };
        Ok(Self {
            name: entry.name,
            url_patterns,
            target_handler_names: entry.target_handler_names,
            dispatch_types,
            order,
        })
    }

    pub fn applies_to(&self, dispatch: DispatchType) -> bool {
        self.dispatch_types.contains(dispatch)
    }

    /// True if any URL pattern matches `target`, which is either the matched
    /// pattern of the current mapping or the raw path when nothing is mapped.
    pub fn matches_path(&self, target: &str) -> bool {
        self.url_patterns.iter().any(|p| match p {
            // `/*`-style filters also cover the mapping patterns they enclose.
            UrlPattern::Exact(exact) => exact == target,
            UrlPattern::Default => target == "/",
            UrlPattern::Prefix(prefix) if prefix.is_empty() => true,
            other => other.to_string() == target || other.matches(target).is_some(),
        })
    }

    pub fn matches_handler(&self, handler_name: &str) -> bool {
        self.target_handler_names
            .iter()
            .any(|n| n == ANY_HANDLER || n == handler_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_type_parsing() {
        assert_eq!("forward".parse::<DispatchType>().unwrap(), DispatchType::Forward);
        assert_eq!("ERROR".parse::<DispatchType>().unwrap(), DispatchType::Error);
        assert!("bogus".parse::<DispatchType>().is_err());
    }

    #[test]
    fn test_dispatch_type_set() {
        let set: DispatchTypes = [DispatchType::Request, DispatchType::Error].into_iter().collect();
        assert!(set.contains(DispatchType::Request));
        assert!(set.contains(DispatchType::Error));
        assert!(!set.contains(DispatchType::Forward));
        assert_eq!(set.iter().count(), 2);
        assert_eq!(DispatchTypes::all().iter().count(), 5);
    }

    #[test]
    fn test_empty_dispatch_defaults_to_request() {
        let f = RegisteredFilter::compile(FilterEntry::new("f").url_pattern("/*"), 0).unwrap();
        assert!(f.applies_to(DispatchType::Request));
        assert!(!f.applies_to(DispatchType::Forward));
    }

    #[test]
    fn test_matches_mapping_patterns() {
        let f = RegisteredFilter::compile(FilterEntry::new("f").url_pattern("/*"), 0).unwrap();
        assert!(f.matches_path("/echo/*"));
        assert!(f.matches_path("*.echo"));
        assert!(f.matches_path("/"));
        assert!(f.matches_path("*.jsp"));

        let f = RegisteredFilter::compile(FilterEntry::new("f").url_pattern("*.echo"), 0).unwrap();
        assert!(f.matches_path("*.echo"));
        assert!(f.matches_path("/a.echo"));
        assert!(!f.matches_path("/echo/*"));

        let f = RegisteredFilter::compile(FilterEntry::new("f").url_pattern("/echo"), 0).unwrap();
        assert!(f.matches_path("/echo"));
        assert!(!f.matches_path("/echo/*"));
    }

    #[test]
    fn test_wildcard_handler_name() {
        let f = RegisteredFilter::compile(FilterEntry::new("f").target_handler("*"), 0).unwrap();
        assert!(f.matches_handler("anything"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(RegisteredFilter::compile(FilterEntry::new("f").url_pattern("nope"), 0).is_err());
    }
}
