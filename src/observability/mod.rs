//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / filter / dispatch / deployment produce:
//!     → tracing events and spans (request id, path, dispatch type)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, text or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows into the dispatch span
//! - Metrics are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
