//! webapp-router: request routing and dispatch for hosted web applications.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────────┐
//!                        │                    WEBAPP ROUTER                       │
//!                        │                                                        │
//!   Client Request       │  ┌─────────┐    ┌──────────────┐    ┌──────────────┐   │
//!   ─────────────────────┼─▶│  http   │───▶│   dispatch   │───▶│   routing    │   │
//!                        │  │ server  │    │ coordinator  │    │ PatternTable │   │
//!                        │  └─────────┘    └──────┬───────┘    └──────────────┘   │
//!                        │                        │                               │
//!                        │                        ▼                               │
//!                        │                 ┌──────────────┐                       │
//!                        │                 │    filter    │                       │
//!                        │                 │ chain + cache│                       │
//!                        │                 └──────┬───────┘                       │
//!                        │                        ▼                               │
//!   Client Response      │  ┌─────────┐    ┌──────────────┐                       │
//!   ◀────────────────────┼──│ buffered│◀───│ filters then │  forward / include /  │
//!                        │  │response │    │   handler    │  error re-dispatch    │
//!                        │  └─────────┘    └──────────────┘                       │
//!                        │                                                        │
//!                        │  ┌──────────────────────────────────────────────────┐  │
//!                        │  │ deployment (builder, fragment order, ArcSwap)    │  │
//!                        │  │ config (TOML, validation, watcher)               │  │
//!                        │  │ observability · lifecycle                        │  │
//!                        │  └──────────────────────────────────────────────────┘  │
//!                        └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use webapp_router::config::{load_config, load_deployment, FragmentConfig};
use webapp_router::filter::DispatchType;
use webapp_router::fragment::{self, Fragment};

#[derive(Parser)]
#[command(name = "webapp-router")]
#[command(about = "Request routing and dispatch engine for hosted web applications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the application described by a deployment descriptor
    Serve {
        #[arg(short, long, default_value = "deploy.toml")]
        config: PathBuf,
    },
    /// Show the mapping and filter chain each path resolves to
    Resolve {
        #[arg(short, long, default_value = "deploy.toml")]
        config: PathBuf,

        #[arg(short, long, default_value = "REQUEST")]
        dispatch: DispatchType,

        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print the order in which fragments are applied
    Order {
        #[arg(short, long, default_value = "deploy.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            webapp_router::lifecycle::serve(&config).await?;
        }
        Commands::Resolve {
            config,
            dispatch,
            paths,
        } => {
            let (_, deployment) = load_deployment(&config)?;
            for path in paths {
                let mapping = deployment.resolve(&path);
                let chain = deployment.build_chain(mapping.as_ref(), &path, dispatch);
                let report = json!({
                    "path": path,
                    "dispatch": dispatch,
                    "mapping": mapping,
                    "chain": chain.as_ref(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Order { config } => {
            let config = load_config(&config)?;
            let fragments: Vec<Fragment> = config.fragments.iter().map(FragmentConfig::fragment).collect();
            let order = fragment::order(&fragments, config.absolute_ordering.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
    }

    Ok(())
}
