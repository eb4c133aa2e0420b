//! HTTP hosting subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, timeout)
//!     → request.rs (HTTP request → engine Request)
//!     → DeploymentHandle::load() snapshot
//!     → Deployment::service on a blocking worker
//!         Suspended → Deployment::resume on a blocking worker, repeat
//!     → buffered Response → HTTP response
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
