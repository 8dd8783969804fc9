//! Transition results and the merge step.

use crate::error::{Result, StoreError};
use crate::types::{BoxError, State};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;

/// What a transition function hands back: a partial state that is either
/// ready now or resolves later.
pub enum StateUpdate {
    /// Partial state available immediately.
    Immediate(Value),
    /// Partial state that resolves asynchronously.
    Deferred(BoxFuture<'static, std::result::Result<Value, BoxError>>),
}

impl StateUpdate {
    /// Wrap a future producing the partial state.
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = std::result::Result<Value, BoxError>> + Send + 'static,
    {
        StateUpdate::Deferred(fut.boxed())
    }
}

impl From<Value> for StateUpdate {
    fn from(value: Value) -> Self {
        StateUpdate::Immediate(value)
    }
}

impl From<State> for StateUpdate {
    fn from(partial: State) -> Self {
        StateUpdate::Immediate(Value::Object(partial))
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateUpdate::Immediate(v) => f.debug_tuple("Immediate").field(v).finish(),
            StateUpdate::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Check that a resolved transition value is a partial state.
pub fn into_partial(action: &str, value: Value) -> Result<State> {
    match value {
        Value::Object(partial) => Ok(partial),
        other => Err(StoreError::ContractViolation {
            action: action.to_string(),
            reason: format!("expected an object, got {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Shallow merge: fields present in `partial` replace those in `prior`,
/// absent fields are kept.
pub fn merge(prior: &State, partial: State) -> State {
    let mut merged = prior.clone();
    for (key, value) in partial {
        merged.insert(key, value);
    }
    merged
}

/// Merge `partial` over `prior` and return the result only if the whole
/// merged map differs from `prior`.
pub fn apply_partial(prior: &State, partial: State) -> Option<State> {
    let merged = merge(prior, partial);
    if merged == *prior {
        None
    } else {
        Some(merged)
    }
}
