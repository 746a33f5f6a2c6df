// ── Listener registries ──
//
// Copy-on-write lists of callbacks. Registration swaps in a new list;
// dispatch walks whatever list was current when it started, so listeners
// may (un)register from inside a callback without disturbing the event
// being delivered.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::error;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by registration; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: ListenerId,
    callback: Callback<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Ordered listeners for one event type.
pub(crate) struct Registry<T> {
    name: &'static str,
    entries: ArcSwap<Vec<Entry<T>>>,
    closed: AtomicBool,
}

impl<T> Registry<T> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: ArcSwap::from_pointee(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn register<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let entry = Entry {
            id: ListenerId::next(),
            callback: Arc::new(callback),
        };
        let id = entry.id;
        self.entries.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(entry.clone());
            next
        });
        id
    }

    /// Returns `false` if `id` was not registered.
    pub(crate) fn unregister(&self, id: ListenerId) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            let next: Vec<_> = current.iter().filter(|e| e.id != id).cloned().collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    /// Drop every listener and refuse to invoke any more, including the
    /// rest of a snapshot another thread is currently dispatching.
    /// A callback already running when this is called is not interrupted.
    pub(crate) fn clear(&self) {
        self.closed.store(true, Ordering::Release);
        self.entries.store(Arc::new(Vec::new()));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Deliver `event` to every listener registered right now, in
    /// registration order. A panicking listener is logged and skipped.
    /// Stops between callbacks once the registry has been cleared.
    pub(crate) fn dispatch(&self, event: &T) {
        let snapshot = self.entries.load_full();
        for entry in snapshot.iter() {
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.callback)(event)));
            if outcome.is_err() {
                error!(
                    registry = self.name,
                    listener = %entry.id,
                    "listener panicked; continuing with the rest"
                );
            }
        }
    }
}
