use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::trace;

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Synchronous pub/sub. Handlers run on the dispatching thread, in
/// subscription order.
pub struct EventBus<T> {
    subscribers: RwLock<Vec<(SubscriptionHandle, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((handle, Arc::new(handler)));
        handle
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut guard = self.subscribers.write();
        let before = guard.len();
        guard.retain(|(existing, _)| *existing != handle);
        guard.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn dispatch(&self, payload: &T) {
        // Snapshot first: handlers may subscribe or unsubscribe re-entrantly,
        // and late subscribers must not see this payload.
        let handlers: Vec<Handler<T>> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(payload);
        }
    }
}

/// Throttles an update bus: the first `dispatch` in a window schedules one
/// deferred emission, later calls in the same window only keep it pending.
#[derive(Clone)]
pub struct RapidUpdateDispatcher {
    inner: Arc<RapidInner>,
}

struct RapidInner {
    target: Arc<EventBus<()>>,
    window: Duration,
    pending: AtomicBool,
    runtime: Handle,
}

impl RapidInner {
    fn emit_pending(&self) -> bool {
        if self.pending.swap(false, Ordering::AcqRel) {
            self.target.dispatch(&());
            true
        } else {
            false
        }
    }
}

/// Owned by the flush task. A task dropped before its timer fires (the
/// runtime shut down) releases the pending flag so later updates reschedule.
struct TimerGuard {
    inner: Arc<RapidInner>,
    armed: bool,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if self.armed {
            self.inner.pending.store(false, Ordering::Release);
            trace!("Coalescing timer dropped before firing");
        }
    }
}

impl RapidUpdateDispatcher {
    pub fn new(target: Arc<EventBus<()>>, window: Duration, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(RapidInner {
                target,
                window,
                pending: AtomicBool::new(false),
                runtime,
            }),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    pub fn dispatch(&self) {
        if self.inner.pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut timer = TimerGuard {
            inner: Arc::clone(&self.inner),
            armed: true,
        };
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(timer.inner.window).await;
            timer.armed = false;
            if timer.inner.emit_pending() {
                trace!("Coalesced update flushed by timer");
            }
        });
    }

    /// Emits the pending update now, if there is one. The scheduled timer
    /// then finds nothing left to do.
    pub fn flush(&self) -> bool {
        self.inner.emit_pending()
    }

    /// Drops a pending update without emitting it.
    pub fn cancel(&self) {
        self.inner.pending.store(false, Ordering::Release);
    }
}
