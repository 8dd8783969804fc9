//! Observer registry and broadcast engine.
//!
//! This module provides in-process subscriptions to state changes:
//! - Observers registered under unique keys, removed via idempotent
//!   [`DestroyHandle`]s
//! - Pluggable target selection ([`Selector`]) and observer construction
//!   ([`ObserverFactory`])
//! - Concurrent fan-out where each delivery is isolated from the others
//! - A ledger of pending broadcasts plus a drain barrier over it
//!
//! # Example
//!
//! ```ignore
//! let broadcaster = Broadcaster::default();
//!
//! let (handle, _observer) = broadcaster.subscribe(
//!     |state: &State| println!("now: {:?}", state),
//!     None,
//! )?;
//!
//! // Deliver to every registered observer, then wait for it to settle.
//! broadcaster.broadcast(Arc::new(state)).await;
//!
//! handle.destroy();
//! ```

mod ledger;
mod manager;
mod registry;
mod types;

pub use ledger::BroadcastHandle;
pub use manager::Broadcaster;
pub use registry::{destroy_all, DestroyHandle};
pub use types::{
    selector_fn, Callback, CallbackObserver, DefaultObserverFactory, Observer, ObserverFactory,
    SelectAll, Selector,
};
