//! Configuration schema definitions.
//!
//! This module defines the deployment descriptor: the server settings plus
//! the handlers, mappings, filters, error pages and fragments of one
//! application. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};

use crate::deployment::DispatchSettings;
use crate::filter::{DispatchType, DispatchTypes, FilterEntry};
use crate::fragment::{Fragment, OrderingEntry};

/// Root configuration: one deployed application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name for logging.
    pub name: String,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,

    /// Re-dispatch depth and response buffering.
    pub dispatch: DispatchSettings,

    /// Fail the deployment when a literal pattern is mapped twice to different handlers.
    pub reject_duplicate_mappings: bool,

    /// Explicit fragment order; `others` expands to the unlisted fragments.
    pub absolute_ordering: Option<Vec<OrderingEntry>>,

    pub handlers: Vec<HandlerConfig>,

    pub mappings: Vec<MappingConfig>,

    pub filters: Vec<FilterConfig>,

    pub error_pages: Vec<ErrorPageConfig>,

    pub fragments: Vec<FragmentConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            dispatch: DispatchSettings::default(),
            reject_duplicate_mappings: false,
            absolute_ordering: None,
            handlers: Vec::new(),
            mappings: Vec::new(),
            filters: Vec::new(),
            error_pages: Vec::new(),
            fragments: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Handlers of the application and of every fragment.
    pub fn all_handlers(&self) -> impl Iterator<Item = &HandlerConfig> {
        self.handlers
            .iter()
            .chain(self.fragments.iter().flat_map(|f| f.handlers.iter()))
    }

    /// Filters of the application and of every fragment.
    pub fn all_filters(&self) -> impl Iterator<Item = &FilterConfig> {
        self.filters
            .iter()
            .chain(self.fragments.iter().flat_map(|f| f.filters.iter()))
    }

    /// Mappings of the application and of every fragment.
    pub fn all_mappings(&self) -> impl Iterator<Item = &MappingConfig> {
        self.mappings
            .iter()
            .chain(self.fragments.iter().flat_map(|f| f.mappings.iter()))
    }
}

/// HTTP host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed per request, in seconds.
    pub request_timeout_secs: u64,

    /// Redeploy when the descriptor file changes.
    pub watch: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            watch: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A named handler and the built-in kind implementing it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlerConfig {
    pub name: String,

    #[serde(flatten)]
    pub kind: HandlerKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerKind {
    /// Fixed response body.
    Static {
        body: String,
        #[serde(default = "default_ok")]
        status: u16,
        #[serde(default = "default_content_type")]
        content_type: String,
    },
    /// Writes back what the dispatch saw (path, mapping, dispatch type, attributes).
    Echo,
    /// Forwards to another path.
    Forward { target: String },
    /// Includes each target's output in turn.
    Include { targets: Vec<String> },
    /// Fails with a handler error.
    Fail {
        #[serde(default = "default_server_error")]
        status: u16,
        #[serde(default)]
        failure_types: Vec<String>,
        #[serde(default)]
        message: String,
    },
    /// Records an error status for error-page handling.
    SendError {
        status: u16,
        #[serde(default)]
        message: Option<String>,
    },
}

fn default_ok() -> u16 {
    200
}

fn default_server_error() -> u16 {
    500
}

fn default_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

/// One pattern → handler mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MappingConfig {
    pub pattern: String,
    pub handler: String,
}

/// A filter definition together with what it applies to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    pub name: String,

    #[serde(flatten)]
    pub kind: FilterKind,

    #[serde(default)]
    pub url_patterns: Vec<String>,

    /// Handler names this filter wraps regardless of path; `*` for all.
    #[serde(default)]
    pub handlers: Vec<String>,

    /// Empty means REQUEST only.
    #[serde(default)]
    pub dispatch: Vec<DispatchType>,
}

impl FilterConfig {
    pub fn entry(&self) -> FilterEntry {
        FilterEntry {
            name: self.name.clone(),
            url_patterns: self.url_patterns.clone(),
            target_handler_names: self.handlers.clone(),
            dispatch_types: self.dispatch.iter().copied().collect::<DispatchTypes>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// Sets a response header, then continues.
    Header { header: String, value: String },
    /// Short-circuits with an error status.
    Reject {
        status: u16,
        #[serde(default)]
        message: Option<String>,
    },
    /// Records entry and exit in the `filter.trace` request attribute.
    Trace,
    /// Suspends the chain; the host resumes it on a worker thread.
    Defer,
}

/// Error page by status, by failure type, or (neither given) the default page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorPageConfig {
    #[serde(default)]
    pub status: Option<u16>,

    #[serde(default)]
    pub failure_type: Option<String>,

    pub path: String,
}

/// A partial descriptor contributed by a plugin or module.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FragmentConfig {
    pub name: String,
    pub before: Vec<OrderingEntry>,
    pub after: Vec<OrderingEntry>,
    pub handlers: Vec<HandlerConfig>,
    pub mappings: Vec<MappingConfig>,
    pub filters: Vec<FilterConfig>,
}

impl FragmentConfig {
    pub fn fragment(&self) -> Fragment {
        Fragment {
            name: self.name.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}
