//! Per-request state shared by every element of a chain.
//!
//! # Responsibilities
//! - Carry the request view (method, path, headers, attributes)
//! - Buffer the response and track whether it is committed
//! - Enforce include rules (no status/header changes while including)
//! - Expose the async and abort flags the coordinator checks
//!
//! # Design Decisions
//! - One `Exchange` per in-flight request; never shared between requests
//! - The body is buffered; committing freezes status and headers

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::dispatch::coordinator::DispatchError;

/// Default response buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Request-side view of an exchange.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path being dispatched; changes for the duration of a forward.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub attributes: HashMap<String, String>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Split `path?query` into its parts.
    pub fn from_uri(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (uri, None),
        };
        let mut req = Self::new(method, if path.is_empty() { "/" } else { path });
        req.query = query;
        req
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        self.attributes.remove(key)
    }
}

/// An error status recorded by `send_error`, handled after the chain unwinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingError {
    pub status: StatusCode,
    pub message: Option<String>,
}

/// Buffered response.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    committed: bool,
    buffer_size: usize,
    include_depth: usize,
    pending_error: Option<PendingError>,
}

impl Response {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            committed: false,
            buffer_size,
            include_depth: 0,
            pending_error: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Ignored once committed or while inside an include.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.metadata_locked() {
            tracing::debug!(status = %status, "Status change ignored");
            return;
        }
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Ignored once committed or while inside an include.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.metadata_locked() {
            tracing::debug!(header = %name, "Header change ignored");
            return;
        }
        self.headers.insert(name, value);
    }

    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.metadata_locked() {
            tracing::debug!(header = %name, "Header change ignored");
            return;
        }
        self.headers.append(name, value);
    }

    /// Append body bytes; commits once the buffer size is exceeded.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
        if self.body.len() > self.buffer_size {
            self.committed = true;
        }
    }

    pub fn write_str(&mut self, s: &str) {
        self.write(s.as_bytes());
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn flush(&mut self) {
        self.committed = true;
    }

    /// Discard buffered body content.
    pub fn reset_buffer(&mut self) -> Result<(), DispatchError> {
        if self.committed {
            return Err(DispatchError::ResponseCommitted);
        }
        self.body.clear();
        Ok(())
    }

    /// Discard status, headers and body.
    pub fn reset(&mut self) -> Result<(), DispatchError> {
        self.reset_buffer()?;
        self.status = StatusCode::OK;
        self.headers.clear();
        Ok(())
    }

    /// Record an error status for the coordinator's error-page handling.
    ///
    /// Ignored inside an include.
    pub fn send_error(&mut self, status: StatusCode, message: Option<&str>) -> Result<(), DispatchError> {
        if self.include_depth > 0 {
            tracing::debug!(status = %status, "send_error ignored during include");
            return Ok(());
        }
        if self.committed {
            return Err(DispatchError::ResponseCommitted);
        }
        self.body.clear();
        self.status = status;
        self.pending_error = Some(PendingError {
            status,
            message: message.map(str::to_string),
        });
        Ok(())
    }

    pub fn pending_error(&self) -> Option<&PendingError> {
        self.pending_error.as_ref()
    }

    pub(crate) fn take_pending_error(&mut self) -> Option<PendingError> {
        self.pending_error.take()
    }

    pub(crate) fn begin_include(&mut self) {
        self.include_depth += 1;
    }

    pub(crate) fn end_include(&mut self) {
        self.include_depth = self.include_depth.saturating_sub(1);
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }

    fn metadata_locked(&self) -> bool {
        self.committed || self.include_depth > 0
    }
}

/// Cancellation flag raised by the transport when the client goes away.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One request/response pair moving through the engine.
#[derive(Debug)]
pub struct Exchange {
    pub request: Request,
    pub response: Response,
    request_id: Option<String>,
    abort: AbortSignal,
    async_started: bool,
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Self::with_buffer_size(request, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(request: Request, buffer_size: usize) -> Self {
        Self {
            request,
            response: Response::new(buffer_size),
            request_id: None,
            abort: AbortSignal::default(),
            async_started: false,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Request::from_uri(Method::GET, path))
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Handle the transport keeps to cancel this exchange.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Defer completion past the current chain element.
    pub fn start_async(&mut self) {
        self.async_started = true;
    }

    pub fn is_async_started(&self) -> bool {
        self.async_started
    }

    pub(crate) fn take_async_started(&mut self) -> bool {
        std::mem::take(&mut self.async_started)
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_uri_splits_query() {
        let req = Request::from_uri(Method::GET, "/a/b?x=1");
        assert_eq!(req.path, "/a/b");
        assert_eq!(req.query.as_deref(), Some("x=1"));
        assert_eq!(Request::from_uri(Method::GET, "").path, "/");
    }

    #[test]
    fn test_buffer_overflow_commits() {
        let mut res = Response::new(4);
        res.write(b"abcd");
        assert!(!res.is_committed());
        res.write(b"e");
        assert!(res.is_committed());

        res.set_status(StatusCode::NOT_FOUND);
        assert_eq!(res.status(), StatusCode::OK);
        assert!(matches!(res.reset_buffer(), Err(DispatchError::ResponseCommitted)));
    }

    #[test]
    fn test_include_locks_metadata_but_not_body() {
        let mut res = Response::new(DEFAULT_BUFFER_SIZE);
        res.begin_include();
        res.set_status(StatusCode::CREATED);
        res.set_header(
            HeaderName::from_static("x-test"),
            HeaderValue::from_static("1"),
        );
        res.write_str("included");
        res.send_error(StatusCode::INTERNAL_SERVER_ERROR, None).unwrap();
        res.end_include();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().is_empty());
        assert_eq!(res.body(), b"included");
        assert!(res.pending_error().is_none());
    }

    #[test]
    fn test_send_error_records_pending() {
        let mut res = Response::new(DEFAULT_BUFFER_SIZE);
        res.write_str("partial");
        res.send_error(StatusCode::FORBIDDEN, Some("nope")).unwrap();
        assert!(res.body().is_empty());
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let pending = res.take_pending_error().unwrap();
        assert_eq!(pending.message.as_deref(), Some("nope"));
    }

    #[test]
    fn test_abort_signal_shared() {
        let ex = Exchange::get("/");
        let signal = ex.abort_signal();
        assert!(!ex.is_aborted());
        signal.abort();
        assert!(ex.is_aborted());
    }
}
