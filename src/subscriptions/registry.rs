//! Observer registry and destroy handles.

use crate::types::ObserverId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

use super::types::Observer;

/// Registered observers keyed by id. Ids grow monotonically, so key order
/// is registration order.
pub(crate) struct Registry {
    observers: RwLock<BTreeMap<ObserverId, Arc<dyn Observer>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            observers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub(crate) fn insert(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.observers.write().insert(id, observer);
        trace!(observer = %id, "observer registered");
        id
    }

    /// Returns whether an observer was actually removed.
    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let removed = self.observers.write().remove(&id);
        match removed {
            Some(observer) => {
                observer.detach();
                trace!(observer = %id, "observer destroyed");
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: ObserverId) -> bool {
        self.observers.read().contains_key(&id)
    }

    /// Point-in-time copy in registration order.
    pub(crate) fn snapshot(&self) -> Vec<(ObserverId, Arc<dyn Observer>)> {
        self.observers
            .read()
            .iter()
            .map(|(id, obs)| (*id, Arc::clone(obs)))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.read().len()
    }
}

/// Removes one observer from its registry.
///
/// Calling [`destroy`](Self::destroy) more than once, or after the store
/// is gone, does nothing.
#[derive(Clone)]
pub struct DestroyHandle {
    id: ObserverId,
    registry: Weak<Registry>,
}

impl DestroyHandle {
    pub(crate) fn new(id: ObserverId, registry: &Arc<Registry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// Registry key of the observer this handle removes.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Remove the observer from its registry.
    pub fn destroy(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for DestroyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestroyHandle").field("id", &self.id).finish()
    }
}

/// Destroy a batch of observers. No ordering between them.
pub fn destroy_all<I>(handles: I)
where
    I: IntoIterator<Item = DestroyHandle>,
{
    for handle in handles {
        handle.destroy();
    }
}
