//! Error-page lookup.

use std::collections::HashMap;

use axum::http::StatusCode;

/// Source of error-page paths for the coordinator.
pub trait ErrorPageLookup: Send + Sync + std::fmt::Debug {
    /// Page for an exact status code.
    fn for_status(&self, status: StatusCode) -> Option<&str>;

    /// Page for the most specific type in `failure_types` (most specific first).
    fn for_failure(&self, failure_types: &[String]) -> Option<&str>;

    /// Catch-all page used when neither lookup matched.
    fn default_page(&self) -> Option<&str> {
        None
    }
}

/// In-memory error-page registry.
#[derive(Debug, Default, Clone)]
pub struct ErrorPages {
    by_status: HashMap<u16, String>,
    by_failure_type: HashMap<String, String>,
    default_page: Option<String>,
}

impl ErrorPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: u16, path: impl Into<String>) -> Self {
        self.by_status.insert(status, path.into());
        self
    }

    pub fn failure_type(mut self, failure_type: impl Into<String>, path: impl Into<String>) -> Self {
        self.by_failure_type.insert(failure_type.into(), path.into());
        self
    }

    pub fn default_path(mut self, path: impl Into<String>) -> Self {
        self.default_page = Some(path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.by_status.is_empty() && self.by_failure_type.is_empty() && self.default_page.is_none()
    }
}

impl ErrorPageLookup for ErrorPages {
    fn for_status(&self, status: StatusCode) -> Option<&str> {
        self.by_status.get(&status.as_u16()).map(String::as_str)
    }

    fn for_failure(&self, failure_types: &[String]) -> Option<&str> {
        failure_types
            .iter()
            .find_map(|t| self.by_failure_type.get(t))
            .map(String::as_str)
    }

    fn default_page(&self) -> Option<&str> {
        self.default_page.as_deref()
    }
}

/// Failure-type pages win over status pages; the default page comes last.
pub(crate) fn select<'a>(
    lookup: &'a dyn ErrorPageLookup,
    status: StatusCode,
    failure_types: &[String],
) -> Option<&'a str> {
    lookup
        .for_failure(failure_types)
        .or_else(|| lookup.for_status(status))
        .or_else(|| lookup.default_page())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_specific_failure_type_wins() {
        let pages = ErrorPages::new()
            .failure_type("IoError", "/errors/io")
            .failure_type("Error", "/errors/any");
        let chain = vec!["TimeoutError".to_string(), "IoError".to_string(), "Error".to_string()];
        assert_eq!(pages.for_failure(&chain), Some("/errors/io"));
        assert_eq!(pages.for_failure(&["Other".to_string()]), None);
    }

    #[test]
    fn test_select_order() {
        let pages = ErrorPages::new()
            .status(404, "/errors/404")
            .failure_type("Boom", "/errors/boom")
            .default_path("/errors/default");

        assert_eq!(
            select(&pages, StatusCode::NOT_FOUND, &["Boom".to_string()]),
            Some("/errors/boom")
        );
        assert_eq!(select(&pages, StatusCode::NOT_FOUND, &[]), Some("/errors/404"));
        assert_eq!(
            select(&pages, StatusCode::BAD_GATEWAY, &[]),
            Some("/errors/default")
        );
        assert_eq!(select(&ErrorPages::new(), StatusCode::BAD_GATEWAY, &[]), None);
    }
}
