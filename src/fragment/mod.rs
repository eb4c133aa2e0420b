//! Fragment ordering subsystem.
//!
//! # Data Flow
//! ```text
//! Deployment descriptors (main + fragments)
//!     → Fragment { name, before, after } in discovery order
//!     → ordering.rs
//!         absolute list given: expand `others` in place, drop unlisted
//!         otherwise: expand `others` into edges → stable topological sort
//!     → ordered fragment names (or OrderingError)
//!     → deployment builder applies each fragment's contributions in order
//! ```
//!
//! # Design Decisions
//! - Runs once per deployment, single-threaded
//! - Cycles are reported, never broken
//! - Ties resolve to discovery order, so the output is deterministic

pub mod ordering;

use serde::{Deserialize, Serialize};

pub use ordering::{order, OrderingError};

/// The `others` sentinel as written in configuration.
pub const OTHERS: &str = "others";

/// One item of a `before`, `after` or absolute ordering list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderingEntry {
    Named(String),
    /// Every fragment not named elsewhere.
    Others,
}

impl OrderingEntry {
    pub fn named(name: impl Into<String>) -> Self {
        OrderingEntry::Named(name.into())
    }

    pub fn is_others(&self) -> bool {
        matches!(self, OrderingEntry::Others)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            OrderingEntry::Named(name) => Some(name),
            OrderingEntry::Others => None,
        }
    }
}

impl From<String> for OrderingEntry {
    fn from(s: String) -> Self {
        if s == OTHERS {
            OrderingEntry::Others
        } else {
            OrderingEntry::Named(s)
        }
    }
}

impl From<OrderingEntry> for String {
    fn from(entry: OrderingEntry) -> Self {
        match entry {
            OrderingEntry::Named(name) => name,
            OrderingEntry::Others => OTHERS.to_string(),
        }
    }
}

/// A partial configuration unit and its ordering constraints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    pub name: String,
    pub before: Vec<OrderingEntry>,
    pub after: Vec<OrderingEntry>,
}

impl Fragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.before.push(OrderingEntry::named(name));
        self
    }

    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.after.push(OrderingEntry::named(name));
        self
    }

    pub fn before_others(mut self) -> Self {
        self.before.push(OrderingEntry::Others);
        self
    }

    pub fn after_others(mut self) -> Self {
        self.after.push(OrderingEntry::Others);
        self
    }
}
