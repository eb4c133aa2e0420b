//! Request routing and dispatch engine for hosted web applications.

// Engine
pub mod dispatch;
pub mod filter;
pub mod fragment;
pub mod routing;

// Deployment and hosting
pub mod builtin;
pub mod config;
pub mod deployment;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use deployment::{Deployment, DeploymentBuilder, DeploymentHandle};
pub use dispatch::{Exchange, Outcome};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
