//! Request dispatch: resolve, build the chain, run it, re-dispatch.
//!
//! # Responsibilities
//! - Drive one exchange through RESOLVING → FILTERING → HANDLING
//! - Forward / include as nested dispatches into the same tables
//! - Convert failures into error-page dispatches (ERROR), once
//! - Suspend and resume asynchronous chains
//!
//! # Design Decisions
//! - Re-dispatch is an explicit recursive call with a depth bound
//! - An ERROR dispatch that fails is fatal for the request; it never
//!   triggers another error-page lookup
//! - Tables are read-only here, so nested and concurrent dispatches
//!   need no locking

use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderValue, StatusCode};
use thiserror::Error;

use crate::deployment::Deployment;
use crate::dispatch::attributes;
use crate::dispatch::error_page;
use crate::dispatch::exchange::Exchange;
use crate::dispatch::handler::{Filter, FilterAction, Handler, HandlerError};
use crate::filter::{Chain, DispatchType};
use crate::observability::metrics;
use crate::routing::ResolvedMapping;

/// Per-request dispatch failures.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("no handler mapped for `{path}`")]
    NotFound { path: String },

    #[error("response already committed")]
    ResponseCommitted,

    #[error("re-dispatch depth {depth} exceeded at `{path}`")]
    DepthExceeded { depth: usize, path: String },

    #[error("asynchronous processing cannot start inside a nested dispatch")]
    AsyncInNestedDispatch,

    #[error("request aborted")]
    Aborted,

    #[error("handler `{0}` has no implementation")]
    UnknownHandler(String),

    #[error("filter `{0}` has no implementation")]
    UnknownFilter(String),

    /// The error page itself failed. Fatal for the request.
    #[error("error page `{page}` failed: {source}")]
    ErrorPageFailed {
        page: String,
        #[source]
        source: Box<DispatchError>,
    },
}

impl DispatchError {
    /// Failure-type name used for error-page lookup.
    pub fn failure_type(&self) -> &'static str {
        match self {
            DispatchError::Handler(_) => "HandlerError",
            DispatchError::NotFound { .. } => "NotFound",
            DispatchError::ResponseCommitted => "ResponseCommitted",
            DispatchError::DepthExceeded { .. } => "DepthExceeded",
            DispatchError::AsyncInNestedDispatch => "AsyncInNestedDispatch",
            DispatchError::Aborted => "Aborted",
            DispatchError::UnknownHandler(_) => "UnknownHandler",
            DispatchError::UnknownFilter(_) => "UnknownFilter",
            DispatchError::ErrorPageFailed { .. } => "ErrorPageFailed",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::ErrorPageFailed { .. })
    }
}

/// How a dispatch ended.
#[derive(Debug)]
pub enum Outcome {
    /// The response in the exchange is final.
    Completed,
    /// Processing continues later through `Deployment::resume`.
    Suspended(AsyncContinuation),
    /// The transport cancelled the exchange.
    Aborted,
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Suspended(_) => "suspended",
            Outcome::Aborted => "aborted",
        }
    }
}

/// A suspended chain. `Send`, so it may resume on another worker.
#[derive(Debug)]
pub struct AsyncContinuation {
    path: String,
    mapping: Option<ResolvedMapping>,
    chain: Arc<Chain>,
    dispatch: DispatchType,
    resume_at: usize,
    entered: Vec<usize>,
    in_error: bool,
}

impl AsyncContinuation {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dispatch_type(&self) -> DispatchType {
        self.dispatch
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn mapping(&self) -> Option<&ResolvedMapping> {
        self.mapping.as_ref()
    }
}

/// What the current chain element can see of its dispatch.
pub struct DispatchContext<'a> {
    deployment: &'a Deployment,
    dispatch: DispatchType,
    path: &'a str,
    mapping: Option<&'a ResolvedMapping>,
    chain: &'a Arc<Chain>,
    depth: usize,
    in_error: bool,
}

impl<'a> DispatchContext<'a> {
    pub fn dispatch_type(&self) -> DispatchType {
        self.dispatch
    }

    /// Path this dispatch resolved.
    pub fn path(&self) -> &str {
        self.path
    }

    pub fn mapping(&self) -> Option<&ResolvedMapping> {
        self.mapping
    }

    pub fn handler_name(&self) -> Option<&str> {
        self.mapping.map(|m| m.handler_name.as_str())
    }

    pub fn servlet_path(&self) -> &str {
        self.mapping.map_or(self.path, |m| m.servlet_path.as_str())
    }

    pub fn path_info(&self) -> Option<&str> {
        self.mapping.and_then(|m| m.extra_path_info.as_deref())
    }

    pub fn chain(&self) -> &Chain {
        self.chain
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_error_dispatch(&self) -> bool {
        self.in_error
    }

    pub fn deployment(&self) -> &Deployment {
        self.deployment
    }

    /// Hand the exchange to whatever `path` maps to, discarding buffered output.
    ///
    /// Fails if the response is already committed. The response is committed
    /// once the target returns.
    pub fn forward(&self, exchange: &mut Exchange, path: &str) -> Result<(), DispatchError> {
        exchange.response.reset_buffer()?;

        let set_attributes = exchange.request.attribute(attributes::FORWARD_REQUEST_URI).is_none();
        if set_attributes {
            let req = &mut exchange.request;
            req.set_attribute(attributes::FORWARD_REQUEST_URI, self.path);
            req.set_attribute(attributes::FORWARD_SERVLET_PATH, self.servlet_path());
            if let Some(info) = self.path_info() {
                req.set_attribute(attributes::FORWARD_PATH_INFO, info);
            }
        }

        let original = std::mem::replace(&mut exchange.request.path, path.to_string());
        let result = self.deployment.dispatch(
            exchange,
            path,
            DispatchType::Forward,
            self.depth + 1,
            self.in_error,
        );
        exchange.request.path = original;
        if set_attributes {
            for key in attributes::FORWARD_KEYS {
                exchange.request.remove_attribute(key);
            }
        }

        match result? {
            Outcome::Completed => {
                if exchange.response.pending_error().is_none() {
                    exchange.response.flush();
                }
                Ok(())
            }
            Outcome::Suspended(_) => Err(DispatchError::AsyncInNestedDispatch),
            Outcome::Aborted => Err(DispatchError::Aborted),
        }
    }

    /// Append the output of whatever `path` maps to.
    ///
    /// Status and headers cannot change during the include.
    pub fn include(&self, exchange: &mut Exchange, path: &str) -> Result<(), DispatchError> {
        let saved: Vec<(&str, Option<String>)> = attributes::INCLUDE_KEYS
            .iter()
            .map(|key| (*key, exchange.request.remove_attribute(key)))
            .collect();

        exchange.response.begin_include();
        let result = self.deployment.dispatch(
            exchange,
            path,
            DispatchType::Include,
            self.depth + 1,
            self.in_error,
        );
        exchange.response.end_include();

        for (key, value) in saved {
            exchange.request.remove_attribute(key);
            if let Some(value) = value {
                exchange.request.set_attribute(key, value);
            }
        }

        match result? {
            Outcome::Completed => Ok(()),
            Outcome::Suspended(_) => Err(DispatchError::AsyncInNestedDispatch),
            Outcome::Aborted => Err(DispatchError::Aborted),
        }
    }
}

enum ChainRun {
    Completed { reached_end: bool },
    Suspended { resume_at: usize, entered: Vec<usize> },
    Aborted,
}

impl Deployment {
    /// Serve one request from the top: a REQUEST dispatch of the exchange's path.
    ///
    /// Per-request failures become an error response. `Err` is returned only
    /// when the error page itself failed.
    pub fn service(&self, exchange: &mut Exchange) -> Result<Outcome, DispatchError> {
        let path = exchange.request.path.clone();
        let span = tracing::debug_span!(
            "dispatch",
            path = %path,
            request_id = exchange.request_id().unwrap_or("-")
        );
        let _enter = span.enter();

        let started = Instant::now();
        let result = self.dispatch(exchange, &path, DispatchType::Request, 0, false);
        let result = self.complete(exchange, &path, result);
        record(DispatchType::Request, &result, started);
        result
    }

    /// Continue a suspended chain after the element that suspended it.
    pub fn resume(
        &self,
        continuation: AsyncContinuation,
        exchange: &mut Exchange,
    ) -> Result<Outcome, DispatchError> {
        let AsyncContinuation {
            path,
            mapping,
            chain,
            dispatch,
            resume_at,
            entered,
            in_error,
        } = continuation;
        let span = tracing::debug_span!("resume", path = %path, dispatch = %dispatch);
        let _enter = span.enter();

        let started = Instant::now();
        let cx = DispatchContext {
            deployment: self,
            dispatch,
            path: &path,
            mapping: mapping.as_ref(),
            chain: &chain,
            depth: 0,
            in_error,
        };
        let result = self
            .run_chain(exchange, &cx, resume_at, entered)
            .and_then(|run| self.settle(exchange, &cx, run));

        let result = if in_error {
            result.map_err(|source| DispatchError::ErrorPageFailed {
                page: path.clone(),
                source: Box::new(source),
            })
        } else {
            self.complete(exchange, &path, result)
        };
        record(dispatch, &result, started);
        result
    }

    /// Abandon a suspended chain and dispatch `path` as ASYNC.
    pub fn dispatch_async(
        &self,
        continuation: AsyncContinuation,
        exchange: &mut Exchange,
        path: &str,
    ) -> Result<Outcome, DispatchError> {
        tracing::debug!(from = %continuation.path, to = %path, "Async dispatch");
        drop(continuation);

        let started = Instant::now();
        exchange.request.path = path.to_string();
        let result = self.dispatch(exchange, path, DispatchType::Async, 0, false);
        let result = self.complete(exchange, path, result);
        record(DispatchType::Async, &result, started);
        result
    }

    /// One RESOLVING → FILTERING → HANDLING pass.
    pub(crate) fn dispatch(
        &self,
        exchange: &mut Exchange,
        path: &str,
        dispatch: DispatchType,
        depth: usize,
        in_error: bool,
    ) -> Result<Outcome, DispatchError> {
        if depth > self.settings.max_depth {
            return Err(DispatchError::DepthExceeded {
                depth,
                path: path.to_string(),
            });
        }

        let mapping = self.table.resolve(path);
        match &mapping {
            Some(m) => tracing::debug!(
                dispatch = %dispatch,
                handler = %m.handler_name,
                pattern = %m.matched_pattern,
                "Mapping resolved"
            ),
            None => {
                tracing::debug!(dispatch = %dispatch, path = %path, "No mapping");
                metrics::record_not_found(dispatch);
            }
        }

        if dispatch == DispatchType::Include {
            let req = &mut exchange.request;
            req.set_attribute(attributes::INCLUDE_REQUEST_URI, path);
            if let Some(m) = &mapping {
                req.set_attribute(attributes::INCLUDE_SERVLET_PATH, m.servlet_path.as_str());
                if let Some(info) = &m.extra_path_info {
                    req.set_attribute(attributes::INCLUDE_PATH_INFO, info.as_str());
                }
            }
        }

        let chain = self.chains.build_chain(mapping.as_ref(), path, dispatch);
        let cx = DispatchContext {
            deployment: self,
            dispatch,
            path,
            mapping: mapping.as_ref(),
            chain: &chain,
            depth,
            in_error,
        };
        let run = self.run_chain(exchange, &cx, 0, Vec::new())?;
        self.settle(exchange, &cx, run)
    }

    fn run_chain(
        &self,
        exchange: &mut Exchange,
        cx: &DispatchContext<'_>,
        start: usize,
        mut entered: Vec<usize>,
    ) -> Result<ChainRun, DispatchError> {
        let filters = &cx.chain.ordered_filter_names;

        for (position, name) in filters.iter().enumerate().skip(start) {
            if exchange.is_aborted() {
                tracing::debug!(filter = %name, "Exchange aborted before filter");
                return Ok(ChainRun::Aborted);
            }
            match self.filter(name)?.before(exchange, cx)? {
                FilterAction::Continue => entered.push(position),
                FilterAction::Respond => {
                    tracing::debug!(filter = %name, "Chain short-circuited");
                    if !self.unwind(exchange, cx, &entered)? {
                        return Ok(ChainRun::Aborted);
                    }
                    return Ok(ChainRun::Completed { reached_end: false });
                }
                FilterAction::Suspend => {
                    tracing::debug!(filter = %name, "Chain suspended by filter");
                    entered.push(position);
                    return Ok(ChainRun::Suspended {
                        resume_at: position + 1,
                        entered,
                    });
                }
            }
        }

        if start <= filters.len() {
            if let Some(name) = &cx.chain.terminal_handler_name {
                if exchange.is_aborted() {
                    tracing::debug!(handler = %name, "Exchange aborted before handler");
                    return Ok(ChainRun::Aborted);
                }
                self.handler(name)?.handle(exchange, cx)?;
                if exchange.is_aborted() {
                    tracing::debug!(handler = %name, "Exchange aborted by handler");
                    return Ok(ChainRun::Aborted);
                }
                if exchange.take_async_started() {
                    tracing::debug!(handler = %name, "Chain suspended by handler");
                    return Ok(ChainRun::Suspended {
                        resume_at: filters.len() + 1,
                        entered,
                    });
                }
            }
        }

        if !self.unwind(exchange, cx, &entered)? {
            return Ok(ChainRun::Aborted);
        }
        Ok(ChainRun::Completed { reached_end: true })
    }

    /// Run `after` hooks of entered filters, innermost first.
    ///
    /// Returns `false` when the exchange was aborted before every hook ran.
    fn unwind(
        &self,
        exchange: &mut Exchange,
        cx: &DispatchContext<'_>,
        entered: &[usize],
    ) -> Result<bool, DispatchError> {
        for &position in entered.iter().rev() {
            if exchange.is_aborted() {
                tracing::debug!(filter = %cx.chain.ordered_filter_names[position], "Exchange aborted during unwind");
                return Ok(false);
            }
            let name = &cx.chain.ordered_filter_names[position];
            self.filter(name)?.after(exchange, cx)?;
        }
        Ok(!exchange.is_aborted())
    }

    fn settle(
        &self,
        exchange: &mut Exchange,
        cx: &DispatchContext<'_>,
        run: ChainRun,
    ) -> Result<Outcome, DispatchError> {
        match run {
            ChainRun::Completed { reached_end } => {
                if reached_end && cx.mapping.is_none() {
                    match cx.dispatch {
                        DispatchType::Request | DispatchType::Async => {
                            if !exchange.response.is_committed() {
                                exchange.response.send_error(StatusCode::NOT_FOUND, None)?;
                            }
                        }
                        _ => {
                            return Err(DispatchError::NotFound {
                                path: cx.path.to_string(),
                            })
                        }
                    }
                }
                Ok(Outcome::Completed)
            }
            ChainRun::Suspended { resume_at, entered } => {
                if cx.depth > 0 {
                    return Err(DispatchError::AsyncInNestedDispatch);
                }
                Ok(Outcome::Suspended(AsyncContinuation {
                    path: cx.path.to_string(),
                    mapping: cx.mapping.cloned(),
                    chain: cx.chain.clone(),
                    dispatch: cx.dispatch,
                    resume_at,
                    entered,
                    in_error: cx.in_error,
                }))
            }
            ChainRun::Aborted => Ok(Outcome::Aborted),
        }
    }

    /// Turn the result of a top-level pass into the request's outcome.
    fn complete(
        &self,
        exchange: &mut Exchange,
        path: &str,
        result: Result<Outcome, DispatchError>,
    ) -> Result<Outcome, DispatchError> {
        match result {
            Ok(Outcome::Completed) => match exchange.response.take_pending_error() {
                Some(pending) => {
                    let message = pending.message.unwrap_or_else(|| {
                        pending.status.canonical_reason().unwrap_or("error").to_string()
                    });
                    self.error_dispatch(exchange, path, HandlerError::new(pending.status, message))
                }
                None => Ok(Outcome::Completed),
            },
            Ok(other) => Ok(other),
            Err(err) if exchange.is_aborted() => {
                tracing::debug!(error = %err, "Dispatch ended by abort");
                Ok(Outcome::Aborted)
            }
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "Dispatch failed");
                self.error_dispatch(exchange, path, HandlerError::from(err))
            }
        }
    }

    /// ERROR dispatch to the configured page, or a plain error body.
    fn error_dispatch(
        &self,
        exchange: &mut Exchange,
        path: &str,
        failure: HandlerError,
    ) -> Result<Outcome, DispatchError> {
        let status = failure.status;
        if exchange.response.is_committed() {
            tracing::error!(
                status = %status,
                error = %failure,
                "Response already committed, error page skipped"
            );
            return Ok(Outcome::Completed);
        }

        exchange.response.reset()?;
        exchange.response.set_status(status);

        let page = error_page::select(self.error_pages.as_ref(), status, &failure.failure_types)
            .map(str::to_string);
        let Some(page) = page else {
            exchange.response.set_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            exchange.response.write_str(&default_error_body(status));
            return Ok(Outcome::Completed);
        };

        let req = &mut exchange.request;
        req.set_attribute(attributes::ERROR_STATUS_CODE, status.as_u16().to_string());
        req.set_attribute(attributes::ERROR_REQUEST_URI, path);
        req.set_attribute(attributes::ERROR_MESSAGE, failure.message.as_str());
        if let Some(failure_type) = failure.failure_type() {
            req.set_attribute(attributes::ERROR_FAILURE_TYPE, failure_type);
        }
        tracing::debug!(status = %status, page = %page, "Error dispatch");

        let started = Instant::now();
        let original = std::mem::replace(&mut exchange.request.path, page.clone());
        let result = self.dispatch(exchange, &page, DispatchType::Error, 0, true);
        exchange.request.path = original;
        record(DispatchType::Error, &result, started);

        match result {
            Ok(Outcome::Completed) => {
                if let Some(pending) = exchange.response.take_pending_error() {
                    tracing::warn!(
                        page = %page,
                        status = %pending.status,
                        "Error page reported an error; not handled further"
                    );
                }
                Ok(Outcome::Completed)
            }
            Ok(other) => Ok(other),
            Err(source) => {
                tracing::error!(page = %page, error = %source, "Error page dispatch failed");
                Err(DispatchError::ErrorPageFailed {
                    page,
                    source: Box::new(source),
                })
            }
        }
    }

    fn filter(&self, name: &str) -> Result<&dyn Filter, DispatchError> {
        self.filters
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| DispatchError::UnknownFilter(name.to_string()))
    }

    fn handler(&self, name: &str) -> Result<&dyn Handler, DispatchError> {
        self.handlers
            .get(name)
            .map(|h| h.as_ref())
            .ok_or_else(|| DispatchError::UnknownHandler(name.to_string()))
    }
}

fn default_error_body(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

fn record(dispatch: DispatchType, result: &Result<Outcome, DispatchError>, started: Instant) {
    let outcome = match result {
        Ok(outcome) => outcome.label(),
        Err(err) if err.is_fatal() => "fatal",
        Err(_) => "failed",
    };
    metrics::record_dispatch(dispatch, outcome, started);
}
