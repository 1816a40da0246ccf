use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use kubedeck_types::NamespaceSelector;

/// The namespace reads and writes default to
///
/// Shared by every hook built from the same [`crate::Hooks`]. Changing it
/// notifies namespace-following queries so they move to the new key.
#[derive(Clone, Debug)]
pub struct ClusterContext {
    preferred: Arc<watch::Sender<NamespaceSelector>>,
}

impl ClusterContext {
    pub fn new(preferred: NamespaceSelector) -> Self {
        let (tx, _) = watch::channel(preferred);
        Self {
            preferred: Arc::new(tx),
        }
    }

    pub fn preferred_namespace(&self) -> NamespaceSelector {
        self.preferred.borrow().clone()
    }

    /// Returns true when the selection changed
    pub fn set_preferred_namespace(&self, selector: NamespaceSelector) -> bool {
        let changed = self.preferred.send_if_modified(|current| {
            if *current == selector {
                return false;
            }
            *current = selector.clone();
            true
        });

        if changed {
            info!(namespace = %selector, "preferred namespace changed");
        }
        changed
    }

    /// An explicit namespace wins over the preferred one
    pub fn resolve(&self, explicit: Option<&NamespaceSelector>) -> NamespaceSelector {
        match explicit {
            Some(selector) => selector.clone(),
            None => self.preferred_namespace(),
        }
    }

    pub fn watch(&self) -> watch::Receiver<NamespaceSelector> {
        self.preferred.subscribe()
    }
}

impl Default for ClusterContext {
    fn default() -> Self {
        Self::new(NamespaceSelector::Named("default".to_string()))
    }
}
