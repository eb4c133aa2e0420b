//! URL pattern kinds and their match rules.
//!
//! # Responsibilities
//! - Classify a pattern string into one of four kinds (exact, prefix, extension, default)
//! - Reject malformed patterns at registration time
//! - Evaluate a single pattern against a request path
//!
//! # Design Decisions
//! - The kind is derived purely from the pattern's shape
//! - Closed enum instead of trait objects: resolution logic matches exhaustively
//! - Matching is case-sensitive and never allocates

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors produced when a pattern string has no valid kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern `{0}` must start with `/` or `*.`")]
    MissingLeadingSlash(String),

    #[error("extension pattern `{0}` has an empty or nested suffix")]
    InvalidExtension(String),

    #[error("pattern `{0}` uses `*` outside a trailing `/*` or leading `*.`")]
    MisplacedWildcard(String),
}

/// Which of the four pattern classes a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Exact,
    Prefix,
    Extension,
    Default,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatternKind::Exact => "exact",
            PatternKind::Prefix => "prefix",
            PatternKind::Extension => "extension",
            PatternKind::Default => "default",
        };
        f.write_str(s)
    }
}

/// A parsed URL pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UrlPattern {
    /// Matches only the identical path.
    Exact(String),
    /// `/foo/*`; stores the prefix without the trailing `/*` (`""` for `/*`).
    Prefix(String),
    /// `*.ext`; stores the suffix including the dot (`.ext`).
    Extension(String),
    /// `/`
    Default,
}

/// The outcome of matching one pattern against a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch<'p> {
    /// The part of the path consumed by the pattern.
    pub servlet_path: &'p str,
    /// What remains after a prefix match, if anything.
    pub path_info: Option<&'p str>,
}

impl UrlPattern {
    /// Parse a pattern string into its kind.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern == "/" {
            return Ok(UrlPattern::Default);
        }
        if let Some(suffix) = pattern.strip_prefix('*') {
            if !suffix.starts_with('.')
                || suffix.len() < 2
                || suffix.contains('/')
                || suffix.contains('*')
            {
                return Err(PatternError::InvalidExtension(pattern.to_string()));
            }
            return Ok(UrlPattern::Extension(suffix.to_string()));
        }
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            if prefix.contains('*') {
                return Err(PatternError::MisplacedWildcard(pattern.to_string()));
            }
            return Ok(UrlPattern::Prefix(prefix.to_string()));
        }
        if pattern.contains('*') {
            return Err(PatternError::MisplacedWildcard(pattern.to_string()));
        }
        Ok(UrlPattern::Exact(pattern.to_string()))
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            UrlPattern::Exact(_) => PatternKind::Exact,
            UrlPattern::Prefix(_) => PatternKind::Prefix,
            UrlPattern::Extension(_) => PatternKind::Extension,
            UrlPattern::Default => PatternKind::Default,
        }
    }

    /// Evaluate this pattern against `path` in isolation.
    ///
    /// Returns `None` when the pattern does not apply. Precedence between
    /// patterns is the router's concern, not this function's.
    pub fn matches<'p>(&self, path: &'p str) -> Option<PatternMatch<'p>> {
        match self {
            UrlPattern::Exact(exact) => (exact == path).then_some(PatternMatch {
                servlet_path: path,
                path_info: None,
            }),
            UrlPattern::Prefix(prefix) => match_prefix(prefix, path),
            UrlPattern::Extension(suffix) => {
                let segment = last_segment(path);
                // `*.ext` must leave a file name in front of the suffix
                (segment.len() > suffix.len() && segment.ends_with(suffix.as_str())).then_some(
                    PatternMatch {
                        servlet_path: path,
                        path_info: None,
                    },
                )
            }
            UrlPattern::Default => Some(PatternMatch {
                servlet_path: path,
                path_info: None,
            }),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Exact(p) => f.write_str(p),
            UrlPattern::Prefix(p) => write!(f, "{}/*", p),
            UrlPattern::Extension(s) => write!(f, "*{}", s),
            UrlPattern::Default => f.write_str("/"),
        }
    }
}

/// Prefix match at a path-segment boundary.
pub(crate) fn match_prefix<'p>(prefix: &str, path: &'p str) -> Option<PatternMatch<'p>> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some(PatternMatch {
            servlet_path: path,
            path_info: None,
        });
    }
    if !rest.starts_with('/') {
        return None;
    }
    Some(PatternMatch {
        servlet_path: &path[..prefix.len()],
        path_info: Some(rest),
    })
}

/// The final `/`-separated segment of a path.
pub(crate) fn last_segment(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(UrlPattern::parse("/").unwrap(), UrlPattern::Default);
        assert_eq!(
            UrlPattern::parse("/echo").unwrap(),
            UrlPattern::Exact("/echo".into())
        );
        assert_eq!(
            UrlPattern::parse("/echo/*").unwrap(),
            UrlPattern::Prefix("/echo".into())
        );
        assert_eq!(UrlPattern::parse("/*").unwrap(), UrlPattern::Prefix("".into()));
        assert_eq!(
            UrlPattern::parse("*.echo").unwrap(),
            UrlPattern::Extension(".echo".into())
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(UrlPattern::parse(""), Err(PatternError::Empty));
        assert!(matches!(
            UrlPattern::parse("echo"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            UrlPattern::parse("*."),
            Err(PatternError::InvalidExtension(_))
        ));
        assert!(matches!(
            UrlPattern::parse("*.a/b"),
            Err(PatternError::InvalidExtension(_))
        ));
        assert!(matches!(
            UrlPattern::parse("/a/*/b"),
            Err(PatternError::MisplacedWildcard(_))
        ));
        assert!(matches!(
            UrlPattern::parse("/a*"),
            Err(PatternError::MisplacedWildcard(_))
        ));
    }

    #[test]
    fn test_display_round_trips_shape() {
        for p in ["/", "/a", "/a/*", "/*", "*.jsp"] {
            assert_eq!(UrlPattern::parse(p).unwrap().to_string(), p);
        }
    }

    #[test]
    fn test_prefix_segment_boundary() {
        let pattern = UrlPattern::parse("/a/*").unwrap();
        let m = pattern.matches("/a/b/c").unwrap();
        assert_eq!(m.servlet_path, "/a");
        assert_eq!(m.path_info, Some("/b/c"));

        let m = pattern.matches("/a").unwrap();
        assert_eq!(m.servlet_path, "/a");
        assert_eq!(m.path_info, None);

        assert!(pattern.matches("/ab").is_none());
    }

    #[test]
    fn test_root_prefix_matches_everything() {
        let pattern = UrlPattern::parse("/*").unwrap();
        let m = pattern.matches("/x/y").unwrap();
        assert_eq!(m.servlet_path, "");
        assert_eq!(m.path_info, Some("/x/y"));
        assert!(pattern.matches("/").is_some());
    }

    #[test]
    fn test_extension_only_last_segment() {
        let pattern = UrlPattern::parse("*.jsp").unwrap();
        assert!(pattern.matches("/a/index.jsp").is_some());
        assert!(pattern.matches("/a.jsp/index").is_none());
        assert!(pattern.matches("/a/.jsp").is_none());
        assert!(pattern.matches("/index.jsp/").is_none());
    }

    #[test]
    fn test_exact_is_literal() {
        let pattern = UrlPattern::parse("/echo").unwrap();
        assert!(pattern.matches("/echo").is_some());
        assert!(pattern.matches("/echo/").is_none());
    }
}
