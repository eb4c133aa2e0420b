//! Pattern table and mapping resolution.
//!
//! # Responsibilities
//! - Store registered patterns, one entry per literal pattern string
//! - Report the handler displaced by a re-registration
//! - Resolve a request path to the single best mapping
//!
//! # Design Decisions
//! - Immutable after the deployment phase (thread-safe without locks)
//! - O(1) exact lookup via HashMap
//! - Prefix lookup walks the path's ancestors from longest to shortest,
//!   so the longest prefix wins without scanning every registration
//! - Explicit `None` (NotFound) rather than a silent fallback

use std::collections::HashMap;

use serde::Serialize;

use crate::routing::matcher::{last_segment, match_prefix, PatternError, PatternKind, UrlPattern};

/// A single registration in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    pub pattern: UrlPattern,
    /// The literal pattern string as registered.
    pub literal: String,
    pub handler_name: String,
    /// Registration sequence number; later registrations have larger values.
    pub seq: u64,
}

impl PatternEntry {
    pub fn kind(&self) -> PatternKind {
        self.pattern.kind()
    }
}

/// The best mapping for a request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMapping {
    pub handler_name: String,
    pub matched_pattern: String,
    pub kind: PatternKind,
    /// The part of the path consumed by the matched pattern.
    pub servlet_path: String,
    /// The remainder after a prefix match.
    pub extra_path_info: Option<String>,
}

/// Index of URL patterns to handler names.
#[derive(Debug, Default, Clone)]
pub struct PatternTable {
    exact: HashMap<String, PatternEntry>,
    prefix: HashMap<String, PatternEntry>,
    extension: HashMap<String, PatternEntry>,
    default: Option<PatternEntry>,
    next_seq: u64,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern` for `handler_name`.
    ///
    /// Re-registering an identical literal pattern overwrites it. The handler
    /// previously assigned to that literal is returned, unless it was the same
    /// handler.
    pub fn register(
        &mut self,
        pattern: &str,
        handler_name: &str,
    ) -> Result<Option<String>, PatternError> {
        let parsed = UrlPattern::parse(pattern)?;
        let entry = PatternEntry {
            pattern: parsed.clone(),
            literal: pattern.to_string(),
            handler_name: handler_name.to_string(),
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let previous = match parsed {
            UrlPattern::Exact(p) => self.exact.insert(p, entry),
            UrlPattern::Prefix(p) => self.prefix.insert(p, entry),
            UrlPattern::Extension(s) => self.extension.insert(s, entry),
            UrlPattern::Default => self.default.replace(entry),
        };

        Ok(previous
            .map(|prev| prev.handler_name)
            .filter(|prev| prev != handler_name))
    }

    /// The registration for a literal pattern, if any.
    pub fn get(&self, pattern: &str) -> Result<Option<&PatternEntry>, PatternError> {
        Ok(match UrlPattern::parse(pattern)? {
            UrlPattern::Exact(p) => self.exact.get(&p),
            UrlPattern::Prefix(p) => self.prefix.get(&p),
            UrlPattern::Extension(s) => self.extension.get(&s),
            UrlPattern::Default => self.default.as_ref(),
        })
    }

    /// Resolve a request path using exact, longest-prefix, extension, then default.
    pub fn resolve(&self, path: &str) -> Option<ResolvedMapping> {
        let path = if path.is_empty() { "/" } else { path };

        if let Some(entry) = self.exact.get(path) {
            return Some(mapping(entry, path, None));
        }

        if let Some((entry, servlet_path, path_info)) = self.longest_prefix(path) {
            return Some(mapping(entry, servlet_path, path_info));
        }

        if let Some(entry) = self.extension_for(path) {
            return Some(mapping(entry, path, None));
        }

        self.default.as_ref().map(|entry| mapping(entry, path, None))
    }

    /// Find the registered prefix covering the most path segments.
    fn longest_prefix<'p>(&self, path: &'p str) -> Option<(&PatternEntry, &'p str, Option<&'p str>)> {
        if self.prefix.is_empty() {
            return None;
        }
        let mut candidate = path.trim_end_matches('/');
        loop {
            if let Some(entry) = self.prefix.get(candidate) {
                if let Some(m) = match_prefix(candidate, path) {
                    return Some((entry, m.servlet_path, m.path_info));
                }
            }
            match candidate.rfind('/') {
                Some(idx) => candidate = &candidate[..idx],
                None => return None,
            }
        }
    }

    /// Longest registered suffix matching the final segment.
    fn extension_for(&self, path: &str) -> Option<&PatternEntry> {
        if self.extension.is_empty() {
            return None;
        }
        let segment = last_segment(path);
        // The first dot is skipped only when it starts the segment (`.hidden`).
        segment
            .char_indices()
            .filter(|(idx, c)| *c == '.' && *idx > 0)
            .find_map(|(idx, _)| self.extension.get(&segment[idx..]))
    }

    /// All registrations, ordered by registration sequence.
    pub fn entries(&self) -> Vec<&PatternEntry> {
        let mut all: Vec<&PatternEntry> = self
            .exact
            .values()
            .chain(self.prefix.values())
            .chain(self.extension.values())
            .chain(self.default.iter())
            .collect();
        all.sort_by_key(|e| e.seq);
        all
    }

    /// Literal patterns currently bound to `handler_name`.
    pub fn patterns_for(&self, handler_name: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.handler_name == handler_name)
            .map(|e| e.literal.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefix.len() + self.extension.len() + usize::from(self.default.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn mapping(entry: &PatternEntry, servlet_path: &str, path_info: Option<&str>) -> ResolvedMapping {
    ResolvedMapping {
        handler_name: entry.handler_name.clone(),
        matched_pattern: entry.literal.clone(),
        kind: entry.kind(),
        servlet_path: servlet_path.to_string(),
        extra_path_info: path_info.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str)]) -> PatternTable {
        let mut t = PatternTable::new();
        for (pattern, handler) in entries {
            t.register(pattern, handler).unwrap();
        }
        t
    }

    #[test]
    fn test_scenario_four_kinds() {
        let t = table(&[("/echo", "H1"), ("/echo/*", "H2"), ("*.echo", "H3"), ("/", "H4")]);

        let m = t.resolve("/echo").unwrap();
        assert_eq!(m.handler_name, "H1");
        assert_eq!(m.kind, PatternKind::Exact);

        let m = t.resolve("/echo/x").unwrap();
        assert_eq!(m.handler_name, "H2");
        assert_eq!(m.servlet_path, "/echo");
        assert_eq!(m.extra_path_info.as_deref(), Some("/x"));

        assert_eq!(t.resolve("/a.echo").unwrap().handler_name, "H3");
        assert_eq!(t.resolve("/other").unwrap().handler_name, "H4");
    }

    #[test]
    fn test_exact_wins_regardless_of_registration_order() {
        let t = table(&[("/", "D"), ("*.do", "E"), ("/a/*", "P"), ("/a/b.do", "X")]);
        assert_eq!(t.resolve("/a/b.do").unwrap().handler_name, "X");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let t = table(&[("/a/b/*", "P2"), ("/a/*", "P1")]);
        assert_eq!(t.resolve("/a/b/c").unwrap().handler_name, "P2");
        assert_eq!(t.resolve("/a/c").unwrap().handler_name, "P1");

        let t = table(&[("/a/*", "P1"), ("/a/b/*", "P2")]);
        let m = t.resolve("/a/b/c").unwrap();
        assert_eq!(m.handler_name, "P2");
        assert_eq!(m.matched_pattern, "/a/b/*");
        assert_eq!(m.extra_path_info.as_deref(), Some("/c"));
    }

    #[test]
    fn test_prefix_beats_extension() {
        let t = table(&[("*.jsp", "E"), ("/app/*", "P")]);
        assert_eq!(t.resolve("/app/index.jsp").unwrap().handler_name, "P");
        assert_eq!(t.resolve("/other/index.jsp").unwrap().handler_name, "E");
    }

    #[test]
    fn test_prefix_path_without_trailing_segment() {
        let t = table(&[("/a/*", "P")]);
        let m = t.resolve("/a").unwrap();
        assert_eq!(m.servlet_path, "/a");
        assert_eq!(m.extra_path_info, None);

        let m = t.resolve("/a/").unwrap();
        assert_eq!(m.servlet_path, "/a");
        assert_eq!(m.extra_path_info.as_deref(), Some("/"));

        assert!(t.resolve("/ab").is_none());
    }

    #[test]
    fn test_root_prefix() {
        let t = table(&[("/*", "ALL"), ("/", "D")]);
        let m = t.resolve("/x/y").unwrap();
        assert_eq!(m.handler_name, "ALL");
        assert_eq!(m.servlet_path, "");
        assert_eq!(m.extra_path_info.as_deref(), Some("/x/y"));

        let m = t.resolve("/").unwrap();
        assert_eq!(m.handler_name, "ALL");
        assert_eq!(m.extra_path_info.as_deref(), Some("/"));
    }

    #[test]
    fn test_root_path_reaches_default() {
        let t = table(&[("/a", "A"), ("/", "D")]);
        let m = t.resolve("/").unwrap();
        assert_eq!(m.handler_name, "D");
        assert_eq!(m.servlet_path, "/");
        assert_eq!(t.resolve("").unwrap().handler_name, "D");
    }

    #[test]
    fn test_longest_extension_suffix() {
        let t = table(&[("*.gz", "GZ"), ("*.tar.gz", "TGZ")]);
        assert_eq!(t.resolve("/x.tar.gz").unwrap().handler_name, "TGZ");
        assert_eq!(t.resolve("/x.gz").unwrap().handler_name, "GZ");
        assert!(t.resolve("/.gz").is_none());
    }

    #[test]
    fn test_reregistration_overwrites_and_reports() {
        let mut t = PatternTable::new();
        assert_eq!(t.register("/x", "first").unwrap(), None);
        assert_eq!(t.register("/x", "second").unwrap(), Some("first".to_string()));
        assert_eq!(t.resolve("/x").unwrap().handler_name, "second");
        assert_eq!(t.len(), 1);

        // Same handler again displaces nobody.
        assert_eq!(t.register("/x", "second").unwrap(), None);

        assert_eq!(t.register("/", "d1").unwrap(), None);
        assert_eq!(t.register("/", "d2").unwrap(), Some("d1".to_string()));
        assert_eq!(t.resolve("/nothing").unwrap().handler_name, "d2");
    }

    #[test]
    fn test_not_found_without_default() {
        let t = table(&[("/a", "A"), ("*.do", "E")]);
        assert!(t.resolve("/b").is_none());
        assert!(t.resolve("/").is_none());
    }

    #[test]
    fn test_entries_in_registration_order() {
        let t = table(&[("/b", "B"), ("/a/*", "A"), ("/", "D"), ("*.x", "X")]);
        let literals: Vec<_> = t.entries().iter().map(|e| e.literal.clone()).collect();
        assert_eq!(literals, vec!["/b", "/a/*", "/", "*.x"]);
        assert_eq!(t.patterns_for("A"), vec!["/a/*".to_string()]);
    }
}
