//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange (request path, dispatch type REQUEST)
//!     → coordinator.rs RESOLVING   (PatternTable::resolve)
//!     → coordinator.rs FILTERING   (ChainBuilder::build_chain, filter `before` hooks)
//!     → coordinator.rs HANDLING    (terminal handler)
//!         forward / include  → nested dispatch, depth + 1
//!         start_async / Suspend → AsyncContinuation, resumed later
//!     → unwind `after` hooks
//!     → pending error or failure → error_page.rs → ERROR dispatch (once)
//!     → Outcome
//! ```

pub mod coordinator;
pub mod error_page;
pub mod exchange;
pub mod handler;

pub use coordinator::{AsyncContinuation, DispatchContext, DispatchError, Outcome};
pub use error_page::{ErrorPageLookup, ErrorPages};
pub use exchange::{AbortSignal, Exchange, PendingError, Request, Response, DEFAULT_BUFFER_SIZE};
pub use handler::{filter_fn, handler_fn, Filter, FilterAction, Handler, HandlerError};

/// Request attributes set by re-dispatch.
pub mod attributes {
    pub const FORWARD_REQUEST_URI: &str = "dispatch.forward.request_uri";
    pub const FORWARD_SERVLET_PATH: &str = "dispatch.forward.servlet_path";
    pub const FORWARD_PATH_INFO: &str = "dispatch.forward.path_info";

    pub const INCLUDE_REQUEST_URI: &str = "dispatch.include.request_uri";
    pub const INCLUDE_SERVLET_PATH: &str = "dispatch.include.servlet_path";
    pub const INCLUDE_PATH_INFO: &str = "dispatch.include.path_info";

    pub const ERROR_STATUS_CODE: &str = "dispatch.error.status_code";
    pub const ERROR_REQUEST_URI: &str = "dispatch.error.request_uri";
    pub const ERROR_FAILURE_TYPE: &str = "dispatch.error.failure_type";
    pub const ERROR_MESSAGE: &str = "dispatch.error.message";

    pub(crate) const FORWARD_KEYS: [&str; 3] =
        [FORWARD_REQUEST_URI, FORWARD_SERVLET_PATH, FORWARD_PATH_INFO];
    pub(crate) const INCLUDE_KEYS: [&str; 3] =
        [INCLUDE_REQUEST_URI, INCLUDE_SERVLET_PATH, INCLUDE_PATH_INFO];
}
