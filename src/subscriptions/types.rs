//! Observer capability and the pluggable pieces around it.

use crate::error::DeliveryError;
use crate::types::State;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Subscriber callback invoked with the full new state.
pub type Callback = Arc<dyn Fn(&State) + Send + Sync>;

/// Something that can receive state updates.
///
/// ### Implementation requirements
/// - `update` must not run the user callback synchronously inside the
///   broadcast call; yield to the scheduler first.
/// - Errors and panics are isolated per observer by the broadcaster.
#[async_trait]
pub trait Observer: Send + Sync + 'static {
    /// Deliver one state value. Resolves once the callback has run.
    async fn update(&self, state: Arc<State>) -> Result<(), DeliveryError>;

    /// Filter parameters supplied at subscription time.
    fn params(&self) -> Option<&Value> {
        None
    }

    /// Called once the observer leaves the registry. Deliveries already in
    /// flight should drop their callback after this.
    fn detach(&self) {}
}

/// Default observer: yields once, then runs the callback.
pub struct CallbackObserver {
    callback: Callback,
    params: Option<Value>,
    detached: AtomicBool,
}

impl CallbackObserver {
    pub fn new(callback: Callback, params: Option<Value>) -> Self {
        Self {
            callback,
            params,
            detached: AtomicBool::new(false),
        }
    }
}

impl fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Observer for CallbackObserver {
    async fn update(&self, state: Arc<State>) -> Result<(), DeliveryError> {
        tokio::task::yield_now().await;
        if self.detached.load(Ordering::SeqCst) {
            return Ok(());
        }
        std::panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(&state)))
            .map_err(DeliveryError::from_panic)
    }

    fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

/// Builds the observer for each new subscription.
pub trait ObserverFactory: Send + Sync {
    fn create(&self, callback: Callback, params: Option<Value>) -> Arc<dyn Observer>;
}

/// Produces [`CallbackObserver`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultObserverFactory;

impl ObserverFactory for DefaultObserverFactory {
    fn create(&self, callback: Callback, params: Option<Value>) -> Arc<dyn Observer> {
        Arc::new(CallbackObserver::new(callback, params))
    }
}

impl<F> ObserverFactory for F
where
    F: Fn(Callback, Option<Value>) -> Arc<dyn Observer> + Send + Sync,
{
    fn create(&self, callback: Callback, params: Option<Value>) -> Arc<dyn Observer> {
        self(callback, params)
    }
}

/// Decides which registered observers receive a given state.
///
/// Must not have side effects; it runs against a point-in-time copy of
/// the registry.
pub trait Selector: Send + Sync {
    fn accepts(&self, state: &State, observer: &dyn Observer) -> bool;
}

/// Every registered observer is a target.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectAll;

impl Selector for SelectAll {
    fn accepts(&self, _state: &State, _observer: &dyn Observer) -> bool {
        true
    }
}

impl<F> Selector for F
where
    F: Fn(&State, &dyn Observer) -> bool + Send + Sync,
{
    fn accepts(&self, state: &State, observer: &dyn Observer) -> bool {
        self(state, observer)
    }
}

/// Box a closure as a selector, letting the compiler infer its argument types.
pub fn selector_fn<F>(f: F) -> Arc<dyn Selector>
where
    F: Fn(&State, &dyn Observer) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}
