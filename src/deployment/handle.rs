//! Hot-swappable reference to the live deployment.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::deployment::Deployment;

/// Shared, lock-free pointer to the current `Deployment`.
///
/// Each request loads one snapshot and keeps it for its whole dispatch, so a
/// redeploy never changes tables under an in-flight request.
#[derive(Debug, Clone)]
pub struct DeploymentHandle {
    current: Arc<ArcSwap<Deployment>>,
}

impl DeploymentHandle {
    pub fn new(deployment: Deployment) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(deployment)),
        }
    }

    pub fn load(&self) -> Arc<Deployment> {
        self.current.load_full()
    }

    /// Publish a new deployment; returns the one it replaced.
    pub fn redeploy(&self, deployment: Deployment) -> Arc<Deployment> {
        let previous = self.current.swap(Arc::new(deployment));
        tracing::info!(
            deployment = %previous.name(),
            chains_dropped = previous.cached_chains(),
            "Deployment replaced"
        );
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handler_fn;

    fn deployment(handler: &str) -> Deployment {
        let mut builder = Deployment::builder("app");
        builder.register_mapping("/", handler).unwrap();
        builder
            .handler(handler, handler_fn(|_, _| Ok(())))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_snapshot_survives_redeploy() {
        let handle = DeploymentHandle::new(deployment("old"));
        let snapshot = handle.load();

        let previous = handle.redeploy(deployment("new"));
        assert!(Arc::ptr_eq(&snapshot, &previous));
        assert_eq!(snapshot.resolve("/x").unwrap().handler_name, "old");
        assert_eq!(handle.load().resolve("/x").unwrap().handler_name, "new");
    }
}
