//! State values and how partial updates are folded into them.
//!
//! A transition produces a [`StateUpdate`]; once resolved, the partial
//! state is shallow-merged over the current state and the whole merged
//! map is compared with the prior one to decide whether anything changed.

mod operations;

pub use operations::{apply_partial, into_partial, merge, StateUpdate};
