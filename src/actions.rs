//! Named state transitions bound to a store.
//!
//! ## Pipeline
//! ```text
//! call(args)
//!   ├─► transition(&snapshot, args)          (synchronous, at call time)
//!   │     ├─ Immediate(non-object) ─► ContractViolation, nothing spawned
//!   │     └─ otherwise ─► spawn one commit attempt
//!   │
//! commit attempt
//!   ├─► await Deferred result (if any)
//!   ├─► shallow merge over current state
//!   ├─► equal to prior? ─► settle Ok(false)
//!   └─► commit + broadcast ─► settle Ok(true)
//! ```
//!
//! The commit attempt runs whether or not the returned [`Dispatch`] is
//! awaited. `Ok(true)` means the broadcast was issued; use
//! [`Store::pending_settled`] to wait for its deliveries.

use crate::error::{Result, StoreError};
use crate::state::{into_partial, StateUpdate};
use crate::store::Store;
use crate::types::State;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, trace};

type Transition = Arc<dyn Fn(&State, Value) -> Result<StateUpdate> + Send + Sync>;

/// Named transition functions, not yet tied to a store.
#[derive(Clone, Default)]
pub struct ActionMap {
    transitions: HashMap<String, Transition>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transition. Arguments arrive as JSON and are deserialized into
    /// `A`; use `()` for none and a tuple for several.
    pub fn action<A, F>(mut self, name: impl Into<String>, transition: F) -> Self
    where
        A: DeserializeOwned + 'static,
        F: Fn(&State, A) -> StateUpdate + Send + Sync + 'static,
    {
        let name = name.into();
        let label = name.clone();
        let erased: Transition =
            Arc::new(move |state: &State, args: Value| -> Result<StateUpdate> {
                let args = serde_json::from_value::<A>(args).map_err(|e| {
                    StoreError::InvalidArguments {
                        action: label.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(transition(state, args))
            });
        self.transitions.insert(name, erased);
        self
    }

    /// Merge in another map; entries in `other` win on name clashes.
    pub fn extend(&mut self, other: ActionMap) {
        self.transitions.extend(other.transitions);
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub(crate) fn bind(self, store: &Store) -> BoundActions {
        let actions = self
            .transitions
            .into_iter()
            .map(|(name, transition)| {
                let bound = BoundAction {
                    name: Arc::from(name.as_str()),
                    transition,
                    store: store.clone(),
                };
                (name, bound)
            })
            .collect();
        BoundActions {
            actions: Arc::new(actions),
        }
    }
}

impl fmt::Debug for ActionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.transitions.keys().collect();
        names.sort();
        f.debug_struct("ActionMap").field("actions", &names).finish()
    }
}

/// One transition bound to a store.
#[derive(Clone)]
pub struct BoundAction {
    name: Arc<str>,
    transition: Transition,
    store: Store,
}

impl BoundAction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the transition and start its commit attempt.
    pub fn call<A: Serialize>(&self, args: A) -> Dispatch {
        let args = match serde_json::to_value(args) {
            Ok(args) => args,
            Err(e) => {
                return Dispatch::rejected(StoreError::InvalidArguments {
                    action: self.name.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let snapshot = self.store.state();
        let update = match (self.transition)(&snapshot, args) {
            Ok(update) => update,
            Err(e) => return Dispatch::rejected(e),
        };

        let resolved: BoxFuture<'static, Result<State>> = match update {
            StateUpdate::Immediate(value) => match into_partial(&self.name, value) {
                Ok(partial) => future::ready(Ok(partial)).boxed(),
                Err(e) => return Dispatch::rejected(e),
            },
            StateUpdate::Deferred(pending) => {
                let name = Arc::clone(&self.name);
                async move {
                    let value = pending.await.map_err(|source| StoreError::Rejected {
                        action: name.to_string(),
                        source,
                    })?;
                    into_partial(&name, value)
                }
                .boxed()
            }
        };

        let attempt = tokio::spawn(commit(self.store.clone(), Arc::clone(&self.name), resolved));
        Dispatch::spawned(attempt)
    }
}

/// The asynchronous half of an action call.
async fn commit(
    store: Store,
    name: Arc<str>,
    resolved: BoxFuture<'static, Result<State>>,
) -> Result<bool> {
    let partial = resolved.await?;
    match store.apply(partial) {
        Some(broadcast) => {
            debug!(action = %name, operation = ?broadcast.id(), "action committed");
            Ok(true)
        }
        None => {
            trace!(action = %name, "action was a no-op");
            Ok(false)
        }
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction").field("name", &self.name).finish()
    }
}

/// All actions of one store, by name.
#[derive(Clone)]
pub struct BoundActions {
    actions: Arc<HashMap<String, BoundAction>>,
}

impl BoundActions {
    pub fn get(&self, name: &str) -> Option<&BoundAction> {
        self.actions.get(name)
    }

    /// Invoke the action called `name`. An unknown name settles with
    /// [`StoreError::UnknownAction`].
    pub fn call<A: Serialize>(&self, name: &str, args: A) -> Dispatch {
        match self.get(name) {
            Some(action) => action.call(args),
            None => Dispatch::rejected(StoreError::UnknownAction(name.to_string())),
        }
    }

    /// Sorted action names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Debug for BoundActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundActions")
            .field("actions", &self.names())
            .finish()
    }
}

/// Settlement of one action call.
///
/// Resolves to `Ok(true)` once a change was committed and its broadcast
/// issued, `Ok(false)` for a no-op, or the error that stopped the commit.
/// Dropping it does not cancel the commit attempt.
pub struct Dispatch {
    inner: BoxFuture<'static, Result<bool>>,
}

impl Dispatch {
    fn rejected(err: StoreError) -> Self {
        debug!(error = err.as_label(), "action rejected: {err}");
        Self {
            inner: future::ready(Err(err)).boxed(),
        }
    }

    fn spawned(commit: tokio::task::JoinHandle<Result<bool>>) -> Self {
        Self {
            inner: async move { commit.await? }.boxed(),
        }
    }
}

impl Future for Dispatch {
    type Output = Result<bool>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dispatch(..)")
    }
}
