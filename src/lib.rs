//! # Observable Store
//!
//! A state container that notifies a dynamic set of observers whenever its
//! value changes, with asynchronous delivery and no-op suppression.
//!
//! ## Core Concepts
//!
//! - **State**: A JSON object, replaced (never edited) on every commit
//! - **Actions**: Named transitions whose partial results are merged into state
//! - **Observers**: Callbacks registered under unique keys, filtered by a selector
//! - **Broadcasts**: Concurrent fan-out tracked until every delivery settles
//!
//! ## Example
//!
//! ```ignore
//! use statecast::{State, Store, StoreBundle};
//! use serde_json::json;
//!
//! let StoreBundle { store, actions } = Store::builder()
//!     .initial_state(&json!({ "items": [] }))
//!     .action("add", |state: &State, label: String| {
//!         let mut items = state["items"].as_array().cloned().unwrap_or_default();
//!         items.push(json!({ "label": label, "checked": false }));
//!         json!({ "items": items }).into()
//!     })
//!     .build()?;
//!
//! // Receive the current state now and every change after it
//! let handle = store.observe(|state: &State| println!("{:?}", state), None, true)?;
//!
//! // `true`: committed and broadcast, `false`: nothing changed
//! let changed = actions.call("add", "milk").await?;
//!
//! // Wait for in-flight deliveries
//! store.pending_settled().await;
//! handle.destroy();
//! ```

pub mod actions;
pub mod error;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use actions::{ActionMap, BoundAction, BoundActions, Dispatch};
pub use error::{DeliveryError, Result, StoreError};
pub use state::{apply_partial, merge, StateUpdate};
pub use store::{Store, StoreBuilder, StoreBundle, StoreConfig};
pub use subscriptions::{
    destroy_all, selector_fn, BroadcastHandle, Broadcaster, Callback, CallbackObserver,
    DefaultObserverFactory, DestroyHandle, Observer, ObserverFactory, SelectAll, Selector,
};
pub use types::*;
