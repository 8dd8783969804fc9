//! Main Store struct tying state, actions and subscriptions together.

use crate::actions::{ActionMap, BoundActions};
use crate::error::{Result, StoreError};
use crate::state::{apply_partial, StateUpdate};
use crate::subscriptions::{
    selector_fn, BroadcastHandle, Broadcaster, DestroyHandle, Observer, ObserverFactory,
    SelectAll, Selector,
};
use crate::types::State;
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Store configuration.
#[derive(Clone)]
pub struct StoreConfig {
    /// Reject subscriptions that come without params.
    pub props_required: bool,

    /// Replaces the default observer construction (None = [`CallbackObserver`](crate::CallbackObserver)).
    pub observer_factory: Option<Arc<dyn ObserverFactory>>,

    /// Chooses the targets of each broadcast.
    /// Default: every registered observer.
    pub selector: Arc<dyn Selector>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            props_required: false,
            observer_factory: None,
            selector: Arc::new(SelectAll),
        }
    }
}

impl StoreConfig {
    /// Require params on every subscription.
    pub fn with_props_required(mut self, required: bool) -> Self {
        self.props_required = required;
        self
    }

    /// Build observers with `factory` instead of the default.
    pub fn with_observer_factory(mut self, factory: Arc<dyn ObserverFactory>) -> Self {
        self.observer_factory = Some(factory);
        self
    }

    /// Replace the broadcast target selector.
    pub fn with_selector(mut self, selector: Arc<dyn Selector>) -> Self {
        self.selector = selector;
        self
    }

    /// Use a closure as the broadcast target selector.
    pub fn with_selector_fn<F>(self, f: F) -> Self
    where
        F: Fn(&State, &dyn Observer) -> bool + Send + Sync + 'static,
    {
        self.with_selector(selector_fn(f))
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("props_required", &self.props_required)
            .field("custom_observer_factory", &self.observer_factory.is_some())
            .finish_non_exhaustive()
    }
}

struct StoreInner {
    state: RwLock<Arc<State>>,
    broadcaster: Broadcaster,
}

/// An observable state container.
///
/// Cloning is cheap; clones share the same state and observers.
///
/// Commits are not serialized against each other: two actions invoked
/// back to back without awaiting may both read the same prior state, and
/// the later commit wins on the fields they share. Callers that need
/// ordering must await each [`Dispatch`](crate::Dispatch) before the next call.
///
/// Anything that delivers or commits spawns onto the current Tokio runtime.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store holding `initial`.
    pub fn new(initial: State, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(Arc::new(initial)),
                broadcaster: Broadcaster::new(&config),
            }),
        }
    }

    /// Create a store from any value that serializes to a JSON object.
    pub fn from_serializable<T: Serialize>(initial: &T, config: StoreConfig) -> Result<Self> {
        Ok(Self::new(to_state(initial)?, config))
    }

    /// Start building a store together with its actions.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    // --- State ---

    /// Current state snapshot.
    pub fn state(&self) -> Arc<State> {
        Arc::clone(&self.inner.state.read())
    }

    /// Current state deserialized into `T`.
    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T> {
        let snapshot = self.state();
        Ok(serde_json::from_value(Value::Object((*snapshot).clone()))?)
    }

    /// Merge `partial` into the state and broadcast if anything changed.
    ///
    /// Returns `None` for a no-op; nothing is committed or broadcast then.
    ///
    /// The broadcast is issued before another commit can take the state
    /// lock, so broadcasts go out in commit order.
    pub fn apply(&self, partial: State) -> Option<BroadcastHandle> {
        let mut current = self.inner.state.write();
        let Some(merged) = apply_partial(&current, partial) else {
            trace!("update was a no-op");
            return None;
        };
        let next = Arc::new(merged);
        *current = Arc::clone(&next);

        // Readers may proceed; writers wait until the broadcast is issued.
        let _issuing = RwLockWriteGuard::downgrade(current);
        debug!(fields = next.len(), "state committed");
        Some(self.inner.broadcaster.broadcast(next))
    }

    // --- Actions ---

    /// Bind every transition in `actions` to this store.
    pub fn create_actions(&self, actions: ActionMap) -> BoundActions {
        actions.bind(self)
    }

    // --- Subscriptions ---

    /// The broadcaster that owns this store's observers.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    /// Register a callback without an initial delivery.
    pub fn subscribe<F>(
        &self,
        callback: F,
        params: Option<Value>,
    ) -> Result<(DestroyHandle, Arc<dyn Observer>)>
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        self.inner.broadcaster.subscribe(callback, params)
    }

    /// Register a callback and, if `deliver_immediately`, hand it the
    /// current state once every broadcast pending now has settled.
    ///
    /// The initial delivery bypasses the selector. It is skipped if the
    /// observer is destroyed before it happens.
    pub fn observe<F>(
        &self,
        callback: F,
        params: Option<Value>,
        deliver_immediately: bool,
    ) -> Result<DestroyHandle>
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        let (handle, observer) = self.inner.broadcaster.subscribe(callback, params)?;

        if deliver_immediately {
            let barrier = self.inner.broadcaster.pending_settled();
            let store = Arc::downgrade(&self.inner);
            let id = handle.id();
            tokio::spawn(async move {
                barrier.await;
                let Some(inner) = store.upgrade() else {
                    return;
                };
                let state = Arc::clone(&inner.state.read());
                let delivery = inner.broadcaster.deliver_one(id, observer, state);
                drop(inner);
                delivery.await;
            });
        }

        Ok(handle)
    }

    /// Resolves once every broadcast pending at call time has settled.
    pub fn pending_settled(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.broadcaster.pending_settled()
    }

    /// Run `callback` once every broadcast pending at call time has settled.
    pub fn run_after_pending_settled<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.broadcaster.run_after_pending_settled(callback)
    }

    /// Destroy a batch of observers.
    pub fn destroy_all<I>(&self, handles: I)
    where
        I: IntoIterator<Item = DestroyHandle>,
    {
        self.inner.broadcaster.destroy_all(handles)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.broadcaster.observer_count()
    }

    /// Number of broadcasts that have not yet settled.
    pub fn pending_count(&self) -> usize {
        self.inner.broadcaster.pending_count()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state())
            .field("observers", &self.observer_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn to_state<T: Serialize>(value: &T) -> Result<State> {
    match serde_json::to_value(value)? {
        Value::Object(state) => Ok(state),
        other => Err(StoreError::InvalidState(format!(
            "initial state must be an object, got {other}"
        ))),
    }
}

/// A store together with its bound actions.
#[derive(Clone, Debug)]
pub struct StoreBundle {
    pub store: Store,
    pub actions: BoundActions,
}

/// Builds a ready-to-use store and its actions in one expression.
///
/// ```ignore
/// let StoreBundle { store, actions } = Store::builder()
///     .initial_state(&json!({"count": 0}))
///     .action("inc", |s: &State, by: i64| {
///         json!({"count": s["count"].as_i64().unwrap_or(0) + by}).into()
///     })
///     .build()?;
/// ```
#[derive(Default)]
pub struct StoreBuilder {
    initial: Option<Result<State>>,
    actions: ActionMap,
    config: StoreConfig,
}

impl StoreBuilder {
    /// Builder with an empty initial state and no actions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state; must serialize to an object. Defaults to empty.
    pub fn initial_state<T: Serialize>(mut self, initial: &T) -> Self {
        self.initial = Some(to_state(initial));
        self
    }

    /// Register one named transition. See [`ActionMap::action`].
    pub fn action<A, F>(mut self, name: impl Into<String>, transition: F) -> Self
    where
        A: DeserializeOwned + 'static,
        F: Fn(&State, A) -> StateUpdate + Send + Sync + 'static,
    {
        self.actions = self.actions.action(name, transition);
        self
    }

    /// Add every transition in `actions`.
    pub fn actions(mut self, actions: ActionMap) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Replace the whole store configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// See [`StoreConfig::props_required`].
    pub fn props_required(mut self, required: bool) -> Self {
        self.config.props_required = required;
        self
    }

    /// See [`StoreConfig::observer_factory`].
    pub fn observer_factory(mut self, factory: Arc<dyn ObserverFactory>) -> Self {
        self.config.observer_factory = Some(factory);
        self
    }

    /// See [`StoreConfig::selector`].
    pub fn selector(mut self, selector: Arc<dyn Selector>) -> Self {
        self.config.selector = selector;
        self
    }

    /// Create the store and bind its actions.
    ///
    /// Fails with [`StoreError::InvalidState`] if the initial state did not
    /// serialize to an object.
    pub fn build(self) -> Result<StoreBundle> {
        let initial = self.initial.unwrap_or_else(|| Ok(State::new()))?;
        let store = Store::new(initial, self.config);
        let actions = store.create_actions(self.actions);
        Ok(StoreBundle { store, actions })
    }
}
