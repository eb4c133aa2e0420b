//! Built-in filter kinds.

use axum::http::{HeaderName, HeaderValue, StatusCode};

use crate::dispatch::{DispatchContext, Exchange, Filter, FilterAction, HandlerError};

/// Request attribute the trace filter appends to.
pub const TRACE_ATTRIBUTE: &str = "filter.trace";

#[derive(Debug, Clone)]
pub struct HeaderFilter {
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl Filter for HeaderFilter {
    fn before(&self, exchange: &mut Exchange, _cx: &DispatchContext<'_>) -> Result<FilterAction, HandlerError> {
        exchange.response.set_header(self.name.clone(), self.value.clone());
        Ok(FilterAction::Continue)
    }
}

/// Short-circuits the chain with an error status.
#[derive(Debug, Clone)]
pub struct RejectFilter {
    pub status: StatusCode,
    pub message: Option<String>,
}

impl Filter for RejectFilter {
    fn before(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<FilterAction, HandlerError> {
        tracing::debug!(path = %cx.path(), status = %self.status, "Request rejected by filter");
        exchange
            .response
            .send_error(self.status, self.message.as_deref())?;
        Ok(FilterAction::Respond)
    }
}

/// Appends `+name` on entry and `-name` on exit to `filter.trace`.
#[derive(Debug, Clone)]
pub struct TraceFilter {
    pub name: String,
}

impl TraceFilter {
    fn mark(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>, sign: char) {
        let mark = format!("{}{}", sign, self.name);
        let trace = match exchange.request.attribute(TRACE_ATTRIBUTE) {
            Some(existing) => format!("{} {}", existing, mark),
            None => mark,
        };
        tracing::trace!(filter = %self.name, dispatch = %cx.dispatch_type(), trace = %trace, "Filter trace");
        exchange.request.set_attribute(TRACE_ATTRIBUTE, trace);
    }
}

impl Filter for TraceFilter {
    fn before(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<FilterAction, HandlerError> {
        self.mark(exchange, cx, '+');
        Ok(FilterAction::Continue)
    }

    fn after(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        self.mark(exchange, cx, '-');
        Ok(())
    }
}

/// Suspends the chain; it resumes at the next element.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferFilter;

impl Filter for DeferFilter {
    fn before(&self, _exchange: &mut Exchange, _cx: &DispatchContext<'_>) -> Result<FilterAction, HandlerError> {
        Ok(FilterAction::Suspend)
    }
}
