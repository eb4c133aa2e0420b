//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (mappings reference defined handlers)
//! - Validate pattern shapes, status codes and addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before a deployment is built from the config

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::schema::{AppConfig, ErrorPageConfig, FilterConfig, HandlerConfig, HandlerKind, FilterKind};
use crate::routing::UrlPattern;

/// One semantic problem, located by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("`{}` is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }
    if config.dispatch.max_depth == 0 {
        errors.push(ValidationError::new("dispatch.max_depth", "must be greater than 0"));
    }
    if config.dispatch.buffer_size == 0 {
        errors.push(ValidationError::new("dispatch.buffer_size", "must be greater than 0"));
    }

    let mut handler_names = HashSet::new();
    for (i, handler) in config.all_handlers().enumerate() {
        if !handler_names.insert(handler.name.as_str()) {
            errors.push(ValidationError::new(
                format!("handlers[{}].name", i),
                format!("handler `{}` defined more than once", handler.name),
            ));
        }
        validate_handler(i, handler, &mut errors);
    }

    for (i, mapping) in config.all_mappings().enumerate() {
        if let Err(e) = UrlPattern::parse(&mapping.pattern) {
            errors.push(ValidationError::new(format!("mappings[{}].pattern", i), e.to_string()));
        }
        if !handler_names.contains(mapping.handler.as_str()) {
            errors.push(ValidationError::new(
                format!("mappings[{}].handler", i),
                format!("handler `{}` is not defined", mapping.handler),
            ));
        }
    }

    let mut filter_names = HashSet::new();
    for (i, filter) in config.all_filters().enumerate() {
        if !filter_names.insert(filter.name.as_str()) {
            errors.push(ValidationError::new(
                format!("filters[{}].name", i),
                format!("filter `{}` defined more than once", filter.name),
            ));
        }
        validate_filter(i, filter, &mut errors);
    }

    for (i, page) in config.error_pages.iter().enumerate() {
        validate_error_page(i, page, &mut errors);
    }

    let mut fragment_names = HashSet::new();
    for (i, fragment) in config.fragments.iter().enumerate() {
        if fragment.name.is_empty() {
            errors.push(ValidationError::new(format!("fragments[{}].name", i), "must not be empty"));
        } else if !fragment_names.insert(fragment.name.as_str()) {
            errors.push(ValidationError::new(
                format!("fragments[{}].name", i),
                format!("fragment `{}` declared more than once", fragment.name),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_status(field: String, status: u16, errors: &mut Vec<ValidationError>) {
    if StatusCode::from_u16(status).is_err() {
        errors.push(ValidationError::new(field, format!("`{}` is not a status code", status)));
    }
}

fn validate_handler(i: usize, handler: &HandlerConfig, errors: &mut Vec<ValidationError>) {
    let field = |name: &str| format!("handlers[{}].{}", i, name);
    match &handler.kind {
        HandlerKind::Static { status, .. } => validate_status(field("status"), *status, errors),
        HandlerKind::Fail { status, .. } | HandlerKind::SendError { status, .. } => {
            validate_status(field("status"), *status, errors)
        }
        HandlerKind::Forward { target } => {
            if !target.starts_with('/') {
                errors.push(ValidationError::new(field("target"), "must start with `/`"));
            }
        }
        HandlerKind::Include { targets } => {
            if targets.iter().any(|t| !t.starts_with('/')) {
                errors.push(ValidationError::new(field("targets"), "every target must start with `/`"));
            }
        }
        HandlerKind::Echo => {}
    }
}

fn validate_filter(i: usize, filter: &FilterConfig, errors: &mut Vec<ValidationError>) {
    let field = |name: &str| format!("filters[{}].{}", i, name);
    if filter.url_patterns.is_empty() && filter.handlers.is_empty() {
        errors.push(ValidationError::new(
            field("url_patterns"),
            format!("filter `{}` applies to no pattern and no handler", filter.name),
        ));
    }
    for pattern in &filter.url_patterns {
        if let Err(e) = UrlPattern::parse(pattern) {
            errors.push(ValidationError::new(field("url_patterns"), e.to_string()));
        }
    }
    match &filter.kind {
        FilterKind::Reject { status, .. } => validate_status(field("status"), *status, errors),
        FilterKind::Header { header, .. } => {
            if axum::http::HeaderName::from_bytes(header.as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    field("header"),
                    format!("`{}` is not a header name", header),
                ));
            }
        }
        FilterKind::Trace | FilterKind::Defer => {}
    }
}

fn validate_error_page(i: usize, page: &ErrorPageConfig, errors: &mut Vec<ValidationError>) {
    if !page.path.starts_with('/') {
        errors.push(ValidationError::new(format!("error_pages[{}].path", i), "must start with `/`"));
    }
    if let Some(status) = page.status {
        if !(400..=599).contains(&status) {
            errors.push(ValidationError::new(
                format!("error_pages[{}].status", i),
                format!("`{}` is not an error status", status),
            ));
        }
    }
    if page.status.is_some() && page.failure_type.is_some() {
        errors.push(ValidationError::new(
            format!("error_pages[{}]", i),
            "set either `status` or `failure_type`, not both",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ErrorPageConfig, MappingConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.server.bind_address = "nowhere".to_string();
        config.dispatch.max_depth = 0;
        config.mappings.push(MappingConfig {
            pattern: "/a*b".to_string(),
            handler: "missing".to_string(),
        });
        config.error_pages.push(ErrorPageConfig {
            status: Some(200),
            failure_type: None,
            path: "oops".to_string(),
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "dispatch.max_depth",
                "mappings[0].pattern",
                "mappings[0].handler",
                "error_pages[0].path",
                "error_pages[0].status",
            ]
        );
    }

    #[test]
    fn test_filter_needs_a_target() {
        let mut config = AppConfig::default();
        config.filters.push(FilterConfig {
            name: "lonely".to_string(),
            kind: FilterKind::Trace,
            url_patterns: Vec::new(),
            handlers: Vec::new(),
            dispatch: Vec::new(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("lonely"));
    }
}
