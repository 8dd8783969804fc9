//! Broadcaster: observer registry plus concurrent fan-out.

use crate::error::{Result, StoreError};
use crate::store::StoreConfig;
use crate::types::{ObserverId, OperationId, State};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::ledger::{BroadcastHandle, PendingLedger};
use super::registry::{DestroyHandle, Registry};
use super::types::{DefaultObserverFactory, Observer, ObserverFactory, Selector};

/// Owns the observers of one store and delivers state to them.
pub struct Broadcaster {
    registry: Arc<Registry>,
    ledger: Arc<PendingLedger>,
    selector: Arc<dyn Selector>,
    factory: Arc<dyn ObserverFactory>,
    props_required: bool,
}

impl Broadcaster {
    /// Create a broadcaster with an empty registry and ledger.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            registry: Registry::new(),
            ledger: PendingLedger::new(),
            selector: Arc::clone(&config.selector),
            factory: config
                .observer_factory
                .clone()
                .unwrap_or_else(|| Arc::new(DefaultObserverFactory)),
            props_required: config.props_required,
        }
    }

    /// Create an observer through the configured factory and register it.
    ///
    /// Fails with [`StoreError::Configuration`] when params are required
    /// but missing; nothing is registered in that case.
    pub fn subscribe<F>(
        &self,
        callback: F,
        params: Option<Value>,
    ) -> Result<(DestroyHandle, Arc<dyn Observer>)>
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        self.check_params(params.as_ref())?;
        let observer = self.factory.create(Arc::new(callback), params);
        let handle = self.register(Arc::clone(&observer))?;
        Ok((handle, observer))
    }

    /// Register an already constructed observer.
    pub fn register(&self, observer: Arc<dyn Observer>) -> Result<DestroyHandle> {
        self.check_params(observer.params())?;
        let id = self.registry.insert(observer);
        Ok(DestroyHandle::new(id, &self.registry))
    }

    fn check_params(&self, params: Option<&Value>) -> Result<()> {
        if self.props_required && params.is_none() {
            return Err(StoreError::Configuration(
                "this store requires subscription params".to_string(),
            ));
        }
        Ok(())
    }

    /// Observers that should receive `state`, in registration order.
    pub fn select_targets(&self, state: &State) -> Vec<Arc<dyn Observer>> {
        self.targets(state).into_iter().map(|(_, obs)| obs).collect()
    }

    fn targets(&self, state: &State) -> Vec<(ObserverId, Arc<dyn Observer>)> {
        self.registry
            .snapshot()
            .into_iter()
            .filter(|(_, obs)| self.selector.accepts(state, obs.as_ref()))
            .collect()
    }

    /// Deliver `state` to every selected observer.
    ///
    /// With no targets this returns an already settled handle and leaves the
    /// ledger untouched. Otherwise the operation is tracked until every
    /// delivery has settled; failures are logged, never propagated.
    pub fn broadcast(&self, state: Arc<State>) -> BroadcastHandle {
        let targets = self.targets(&state);
        if targets.is_empty() {
            trace!("broadcast skipped: no targets");
            return BroadcastHandle::settled();
        }

        let operation = self.ledger.allocate();
        debug!(operation = %operation, observers = targets.len(), "broadcast issued");
        let registry = Arc::downgrade(&self.registry);
        let deliveries = targets
            .into_iter()
            .map(|(id, observer)| {
                deliver(
                    Weak::clone(&registry),
                    id,
                    Some(operation),
                    observer,
                    Arc::clone(&state),
                )
                .boxed()
            })
            .collect();
        self.ledger.track(operation, deliveries)
    }

    /// Deliver `state` to one observer outside any broadcast operation.
    /// Skipped if the observer is no longer registered.
    pub(crate) fn deliver_one(
        &self,
        id: ObserverId,
        observer: Arc<dyn Observer>,
        state: Arc<State>,
    ) -> impl Future<Output = ()> + Send + 'static {
        deliver(Arc::downgrade(&self.registry), id, None, observer, state)
    }

    /// Resolves once every broadcast pending at call time has settled.
    pub fn pending_settled(&self) -> impl Future<Output = ()> + Send + 'static {
        self.ledger.settled()
    }

    /// Run `callback` once every broadcast pending at call time has settled.
    pub fn run_after_pending_settled<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let barrier = self.ledger.settled();
        tokio::spawn(async move {
            barrier.await;
            callback();
        })
    }

    /// Destroy a batch of observers.
    pub fn destroy_all<I>(&self, handles: I)
    where
        I: IntoIterator<Item = DestroyHandle>,
    {
        super::registry::destroy_all(handles);
    }

    /// Whether `id` is still in the registry.
    pub fn is_registered(&self, id: ObserverId) -> bool {
        self.registry.contains(id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of broadcasts that have not yet settled.
    pub fn pending_count(&self) -> usize {
        self.ledger.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

/// Deliver one state to one observer, isolating errors and panics.
///
/// An observer destroyed after the delivery was scheduled is skipped,
/// whatever its `detach` does.
async fn deliver(
    registry: Weak<Registry>,
    id: ObserverId,
    operation: Option<OperationId>,
    observer: Arc<dyn Observer>,
    state: Arc<State>,
) {
    let live = registry.upgrade().is_some_and(|r| r.contains(id));
    if !live {
        trace!(observer = %id, operation = ?operation, "delivery skipped: destroyed");
        return;
    }
    let outcome = AssertUnwindSafe(observer.update(state)).catch_unwind().await;
    let err = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => crate::error::DeliveryError::from_panic(payload),
    };
    warn!(
        observer = %id,
        operation = ?operation,
        error = err.as_label(),
        "delivery failed: {err}"
    );
}
