//! Request identification and translation into an `Exchange`.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the client sent one
//! - Turn an HTTP request into the engine's `Request`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The query string never becomes part of the dispatched path

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::dispatch::Request;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Stamps requests with a random UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

pub fn into_request(parts: Parts, body: Bytes) -> Request {
    let mut request = Request::from_uri(parts.method, parts.uri.path());
    request.query = parts.uri.query().map(str::to_string);
    request.headers = parts.headers;
    request.body = body.to_vec();
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_into_request() {
        let (parts, _) = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/a/b.jsp?x=1")
            .header("x-test", "yes")
            .body(())
            .unwrap()
            .into_parts();

        let request = into_request(parts, Bytes::from_static(b"payload"));
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/a/b.jsp");
        assert_eq!(request.query.as_deref(), Some("x=1"));
        assert_eq!(request.headers["x-test"], "yes");
        assert_eq!(request.body, b"payload");
    }

    #[test]
    fn test_uuid_request_ids_are_unique() {
        let request = axum::http::Request::new(());
        let mut make = MakeRequestUuidV4;
        let a = make.make_request_id(&request).unwrap();
        let b = make.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
        assert!(Uuid::parse_str(a.header_value().to_str().unwrap()).is_ok());
    }
}
