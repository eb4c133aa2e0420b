//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! deployment descriptor (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, every error reported)
//!     → AppConfig (validated, immutable)
//!     → deployment::build_deployment → Deployment
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads and builds a new Deployment
//!     → DeploymentHandle swaps it in atomically
//!     → in-flight requests finish on the old snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full redeploy
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_deployment, parse_config, ConfigError};
pub use schema::{
    AppConfig, ErrorPageConfig, FilterConfig, FilterKind, FragmentConfig, HandlerConfig, HandlerKind,
    MappingConfig, ObservabilityConfig, ServerConfig,
};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
