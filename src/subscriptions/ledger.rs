//! Pending broadcast operations.
//!
//! Every non-empty broadcast is tracked here from the moment it is issued
//! until all of its deliveries have settled. Drain barriers await a
//! snapshot of the entries present when the barrier was taken.

use crate::types::OperationId;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

type Settle = Shared<BoxFuture<'static, ()>>;

pub(crate) struct PendingLedger {
    operations: Mutex<HashMap<OperationId, Settle>>,
    next_id: AtomicU64,
}

impl PendingLedger {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            operations: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub(crate) fn allocate(&self) -> OperationId {
        OperationId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register operation `id` over `deliveries` and start driving it.
    ///
    /// The entry is inserted before the operation is spawned, so removal
    /// on settle can never race ahead of insertion.
    pub(crate) fn track(
        self: &Arc<Self>,
        id: OperationId,
        deliveries: Vec<BoxFuture<'static, ()>>,
    ) -> BroadcastHandle {
        let count = deliveries.len();
        let ledger = Arc::downgrade(self);

        let settle = async move {
            join_all(deliveries).await;
            if let Some(ledger) = ledger.upgrade() {
                ledger.operations.lock().remove(&id);
            }
            debug!(operation = %id, observers = count, "broadcast settled");
        }
        .boxed()
        .shared();

        self.operations.lock().insert(id, settle.clone());
        tokio::spawn(settle.clone());

        BroadcastHandle {
            id: Some(id),
            settle: Some(settle),
        }
    }

    /// Future that resolves once every operation pending right now has
    /// settled. Operations issued later are not awaited.
    pub(crate) fn settled(&self) -> impl Future<Output = ()> + Send + 'static {
        let snapshot: Vec<Settle> = self.operations.lock().values().cloned().collect();
        debug!(pending = snapshot.len(), "drain barrier taken");
        async move {
            join_all(snapshot).await;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.operations.lock().len()
    }
}

/// Completion signal of one broadcast.
///
/// Resolves once every targeted delivery has succeeded or failed. It never
/// reports failure.
pub struct BroadcastHandle {
    id: Option<OperationId>,
    settle: Option<Settle>,
}

impl BroadcastHandle {
    /// Handle for a broadcast that had no targets.
    pub(crate) fn settled() -> Self {
        Self {
            id: None,
            settle: None,
        }
    }

    /// Ledger token, `None` when nothing was targeted.
    pub fn id(&self) -> Option<OperationId> {
        self.id
    }
}

impl Future for BroadcastHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.settle.as_mut() {
            Some(settle) => settle.poll_unpin(cx),
            None => Poll::Ready(()),
        }
    }
}

impl std::fmt::Debug for BroadcastHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHandle").field("id", &self.id).finish()
    }
}
