//! Built-in handler and filter kinds.
//!
//! # Data Flow
//! ```text
//! HandlerKind / FilterKind (from the descriptor)
//!     → handler() / filter() (status, header and path checks)
//!     → Arc<dyn Handler> / Arc<dyn Filter>
//!     → DeploymentBuilder::add_handler / add_filter
//! ```
//!
//! Applications embedding the engine register their own `Handler` and
//! `Filter` implementations directly; these kinds make a descriptor-only
//! deployment servable.

pub mod filters;
pub mod handlers;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};

use crate::config::schema::{FilterKind, HandlerKind};
use crate::deployment::DeploymentError;
use crate::dispatch::{Filter, Handler};

pub use filters::{DeferFilter, HeaderFilter, RejectFilter, TraceFilter, TRACE_ATTRIBUTE};
pub use handlers::{EchoHandler, FailHandler, ForwardHandler, IncludeHandler, SendErrorHandler, StaticHandler};

pub fn handler(name: &str, kind: &HandlerKind) -> Result<Arc<dyn Handler>, DeploymentError> {
    let handler: Arc<dyn Handler> = match kind {
        HandlerKind::Static {
            body,
            status,
            content_type,
        } => Arc::new(StaticHandler {
            status: status_code("handler", name, *status)?,
            content_type: HeaderValue::from_str(content_type)
                .map_err(|e| invalid("handler", name, e))?,
            body: body.clone(),
        }),
        HandlerKind::Echo => Arc::new(EchoHandler),
        HandlerKind::Forward { target } => Arc::new(ForwardHandler {
            target: target.clone(),
        }),
        HandlerKind::Include { targets } => Arc::new(IncludeHandler {
            targets: targets.clone(),
        }),
        HandlerKind::Fail {
            status,
            failure_types,
            message,
        } => Arc::new(FailHandler {
            status: status_code("handler", name, *status)?,
            failure_types: failure_types.clone(),
            message: message.clone(),
        }),
        HandlerKind::SendError { status, message } => Arc::new(SendErrorHandler {
            status: status_code("handler", name, *status)?,
            message: message.clone(),
        }),
    };
    Ok(handler)
}

pub fn filter(name: &str, kind: &FilterKind) -> Result<Arc<dyn Filter>, DeploymentError> {
    let filter: Arc<dyn Filter> = match kind {
        FilterKind::Header { header, value } => Arc::new(HeaderFilter {
            name: HeaderName::from_bytes(header.as_bytes()).map_err(|e| invalid("filter", name, e))?,
            value: HeaderValue::from_str(value).map_err(|e| invalid("filter", name, e))?,
        }),
        FilterKind::Reject { status, message } => Arc::new(RejectFilter {
            status: status_code("filter", name, *status)?,
            message: message.clone(),
        }),
        FilterKind::Trace => Arc::new(TraceFilter {
            name: name.to_string(),
        }),
        FilterKind::Defer => Arc::new(DeferFilter),
    };
    Ok(filter)
}

fn status_code(what: &'static str, name: &str, status: u16) -> Result<StatusCode, DeploymentError> {
    StatusCode::from_u16(status).map_err(|e| invalid(what, name, e))
}

fn invalid(what: &'static str, name: &str, err: impl std::fmt::Display) -> DeploymentError {
    DeploymentError::Invalid {
        what,
        name: name.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_status_rejected() {
        let kind = HandlerKind::SendError {
            status: 42,
            message: None,
        };
        assert!(matches!(
            handler("broken", &kind),
            Err(DeploymentError::Invalid { what: "handler", ref name, .. }) if name == "broken"
        ));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let kind = FilterKind::Header {
            header: "bad header".to_string(),
            value: "x".to_string(),
        };
        assert!(filter("hdr", &kind).is_err());
    }
}
