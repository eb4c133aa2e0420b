//! Application-facing traits for handlers and filters.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;

use crate::dispatch::coordinator::{DispatchContext, DispatchError};
use crate::dispatch::exchange::Exchange;

/// A failure raised by application code.
///
/// `failure_types` runs from the most specific type to its most general
/// ancestor; error pages are looked up along it in that order.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub status: StatusCode,
    pub failure_types: Vec<String>,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            failure_types: Vec::new(),
            message: message.into(),
            source: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Append the next, more general, failure type.
    pub fn with_failure_type(mut self, failure_type: impl Into<String>) -> Self {
        self.failure_types.push(failure_type.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn failure_type(&self) -> Option<&str> {
        self.failure_types.first().map(String::as_str)
    }
}

impl From<DispatchError> for HandlerError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Handler(inner) => inner,
            other => {
                let status = match other {
                    DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                HandlerError::new(status, other.to_string())
                    .with_failure_type(other.failure_type())
                    .with_failure_type("DispatchError")
                    .with_source(other)
            }
        }
    }
}

/// What a filter decided in its `before` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Run the next chain element.
    Continue,
    /// Stop here; the filter produced the response.
    Respond,
    /// Suspend the chain; it resumes after this filter.
    Suspend,
}

/// The terminal element of a chain.
pub trait Handler: Send + Sync {
    fn handle(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<(), HandlerError>;
}

/// A cross-cutting element wrapping a handler.
pub trait Filter: Send + Sync {
    fn before(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<FilterAction, HandlerError>;

    /// Runs while the chain unwinds, innermost filter first.
    fn after(&self, _exchange: &mut Exchange, _cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }
}

struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Exchange, &DispatchContext<'_>) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        (self.0)(exchange, cx)
    }
}

/// Wrap a closure as a handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Exchange, &DispatchContext<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

struct FnFilter<F>(F);

impl<F> Filter for FnFilter<F>
where
    F: Fn(&mut Exchange, &DispatchContext<'_>) -> Result<FilterAction, HandlerError> + Send + Sync,
{
    fn before(&self, exchange: &mut Exchange, cx: &DispatchContext<'_>) -> Result<FilterAction, HandlerError> {
        (self.0)(exchange, cx)
    }
}

/// Wrap a closure as a filter with no `after` hook.
pub fn filter_fn<F>(f: F) -> Arc<dyn Filter>
where
    F: Fn(&mut Exchange, &DispatchContext<'_>) -> Result<FilterAction, HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnFilter(f))
}
