//! Filter subsystem.
//!
//! # Data Flow
//! ```text
//! Deployment phase:
//!     FilterEntry (name, url patterns, handler names, dispatch types)
//!     → entry.rs (parse patterns, default dispatch = REQUEST)
//!     → index.rs (append in registration order)
//!
//! Per dispatch:
//!     ResolvedMapping | unmapped path, DispatchType
//!     → chain.rs (cache lookup by handler/pattern/dispatch)
//!     → index.rs on miss (url matches, then name matches)
//!     → Chain (filters + terminal handler)
//! ```

pub mod chain;
pub mod entry;
pub mod index;

pub use chain::{Chain, ChainBuilder};
pub use entry::{DispatchType, DispatchTypes, FilterEntry, RegisteredFilter, ANY_HANDLER};
pub use index::FilterIndex;
