//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Deployment phase:
//!     (pattern, handler name) pairs
//!     → matcher.rs (classify: exact / prefix / extension / default)
//!     → router.rs (insert; report displaced handler)
//!     → Freeze inside the Deployment
//!
//! Per request:
//!     request path
//!     → router.rs (exact → longest prefix → extension → default)
//!     → Return: ResolvedMapping or NotFound
//! ```
//!
//! # Design Decisions
//! - Tables built once, immutable while serving
//! - No regex in hot path
//! - Deterministic: precedence never depends on registration order

pub mod matcher;
pub mod router;

pub use matcher::{PatternError, PatternKind, UrlPattern};
pub use router::{PatternEntry, PatternTable, ResolvedMapping};
