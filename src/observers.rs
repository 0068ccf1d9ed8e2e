//! Subscription-handle based observer registry.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Token returned on subscribe, required for unsubscribe.
///
/// Handles make unsubscription explicit and keep double-registration harmless: every
/// subscribe call registers a distinct observer with a distinct handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A set of observers notified in subscription order.
///
/// Notification snapshots the observer list before invoking callbacks, so observers may
/// subscribe or unsubscribe reentrantly without deadlocking.
pub struct ObserverSet<T> {
    next_id: AtomicU64,
    observers: Mutex<Vec<(u64, Observer<T>)>>,
}

impl<T> Default for ObserverSet<T> {
    fn default() -> ObserverSet<T> {
        ObserverSet {
            next_id: AtomicU64::new(1),
            observers: Mutex::new(Vec::new()),
        }
    }
}

impl<T> ObserverSet<T> {
    /// Create an empty observer set.
    pub fn new() -> ObserverSet<T> {
        ObserverSet::default()
    }

    /// Register an observer, returning the handle that removes it again.
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionHandle {
        self.subscribe_arc(Arc::new(observer))
    }

    /// Register an already-shared observer.
    pub fn subscribe_arc(&self, observer: Observer<T>) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, observer));
        SubscriptionHandle(id)
    }

    /// Remove the observer registered under `handle`. Idempotent.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.lock().retain(|(id, _)| *id != handle.0);
    }

    /// Whether no observers are currently registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Notify all observers, in subscription order.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = self
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            observer(value);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Observer<T>)>> {
        self.observers
            .lock()
            .expect("thread holding observer lock should not panic")
    }
}
