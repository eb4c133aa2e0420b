//! Configuration file watcher for hot redeployment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::load_deployment;
use crate::deployment::DeploymentHandle;

/// Monitors the descriptor file and swaps in a rebuilt deployment on change.
pub struct ConfigWatcher {
    path: PathBuf,
    handle: DeploymentHandle,
}

impl ConfigWatcher {
    pub fn new(path: &Path, handle: DeploymentHandle) -> Self {
        Self {
            path: path.to_path_buf(),
            handle,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let handle = self.handle;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Descriptor change detected, redeploying");
                        match load_deployment(&path) {
                            Ok((_, deployment)) => {
                                handle.redeploy(deployment);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "Redeploy failed, keeping current deployment"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
