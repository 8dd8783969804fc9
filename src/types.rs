//! Core types for the observable store.

use std::fmt;

/// A full state value: named fields mapped to arbitrary JSON values.
///
/// Snapshots are shared as `Arc<State>`; a commit always installs a new
/// map rather than editing the current one.
pub type State = serde_json::Map<String, serde_json::Value>;

/// Boxed error returned by deferred transitions and custom observers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unique key of a registered observer.
///
/// Keys are handed out in increasing order, so ordering by key is
/// registration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub u64);

impl fmt::Debug for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObserverId({})", self.0)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token of a pending broadcast operation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub u64);

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
