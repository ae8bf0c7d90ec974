//! Registry of continuous-mode observers.
//!
//! Observers are invoked synchronously on the read-loop task, in the order
//! they subscribed. A slow observer therefore delays every later frame; keep
//! callbacks short and hand heavy work to another task (see
//! [`Engine::good_reads`](crate::Engine::good_reads)).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::metrics::metric_defs;

/// Callback receiving each decoded barcode in continuous mode.
pub type GoodReadHandler = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(SubscriptionHandle, GoodReadHandler)>,
}

/// Ordered, thread-safe set of observers.
#[derive(Default)]
pub struct ObserverRegistry {
    inner: Mutex<Registry>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer; it receives every barcode delivered after this call.
    pub fn subscribe(&self, handler: GoodReadHandler) -> SubscriptionHandle {
        let mut inner = self.inner.lock();
        let handle = SubscriptionHandle(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((handle, handler));
        metrics::gauge!(metric_defs::OBSERVERS.name).set(inner.entries.len() as f64);
        handle
    }

    /// Remove an observer. Returns `false` if the handle was not registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|(h, _)| *h != handle);
        metrics::gauge!(metric_defs::OBSERVERS.name).set(inner.entries.len() as f64);
        inner.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `text` to every observer registered at the time of the call.
    ///
    /// The lock is not held while callbacks run, so an observer may subscribe
    /// or unsubscribe from inside its callback. A panicking observer is logged
    /// and skipped. Returns the number of observers that completed.
    pub fn notify(&self, text: &str) -> usize {
        let snapshot: Vec<(SubscriptionHandle, GoodReadHandler)> =
            self.inner.lock().entries.clone();

        let mut delivered = 0;
        for (handle, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(text))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    metrics::counter!(metric_defs::OBSERVER_PANICS.name).increment(1);
                    warn!("observer {:?} panicked while handling a good read", handle);
                }
            }
        }
        delivered
    }
}
