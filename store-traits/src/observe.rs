//! Mutation-observer registry shared by content store implementations.
//!
//! The catalog announces external mutations per target; stores fan those
//! announcements out to registered listeners. Deregistration must be
//! synchronous so a consumer that drops its subscription can rely on the
//! listener being gone before the drop returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Callback invoked once per external mutation announcement. Carries no
/// payload; it only means "re-query, the target may have changed".
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    listeners: HashMap<String, HashMap<u64, ChangeListener>>,
}

/// Listener table keyed by target. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener for a target and return its cancel token.
    pub fn register(&self, target: &str, listener: ChangeListener) -> CancelToken {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .listeners
            .entry(target.to_string())
            .or_default()
            .insert(id, listener);
        CancelToken {
            inner: Arc::downgrade(&self.inner),
            target: target.to_string(),
            id,
        }
    }

    /// Invoke every listener currently registered for a target.
    ///
    /// Listeners run outside the registry lock, so a listener may cancel
    /// itself or register new listeners without deadlocking.
    pub fn notify(&self, target: &str) {
        let snapshot: Vec<ChangeListener> = {
            let inner = self.lock();
            inner
                .listeners
                .get(target)
                .map(|entries| entries.values().cloned().collect())
                .unwrap_or_default()
        };
        for listener in snapshot {
            listener();
        }
    }

    /// Number of listeners currently registered for a target.
    pub fn listener_count(&self, target: &str) -> usize {
        self.lock()
            .listeners
            .get(target)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for a registered listener. Cancelling removes the listener
/// synchronously; dropping the token cancels as well, so a forgotten handle
/// can never leak a listener.
pub struct CancelToken {
    inner: Weak<Mutex<Inner>>,
    target: String,
    id: u64,
}

impl CancelToken {
    /// Remove the listener. Idempotent; a no-op once the registry is gone.
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entries) = inner.listeners.get_mut(&self.target) {
                entries.remove(&self.id);
                if entries.is_empty() {
                    inner.listeners.remove(&self.target);
                }
            }
        }
    }
}

impl Drop for CancelToken {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener() -> (ChangeListener, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let listener_hits = hits.clone();
        let listener: ChangeListener = Arc::new(move || {
            listener_hits.fetch_add(1, Ordering::SeqCst);
        });
        (listener, hits)
    }

    #[test]
    fn notify_reaches_registered_listener() {
        let registry = ObserverRegistry::new();
        let (listener, hits) = counting_listener();
        let _token = registry.register("audio", listener);

        registry.notify("audio");
        registry.notify("audio");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn notify_is_scoped_to_target() {
        let registry = ObserverRegistry::new();
        let (listener, hits) = counting_listener();
        let _token = registry.register("audio", listener);

        registry.notify("album");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_removes_listener_synchronously() {
        let registry = ObserverRegistry::new();
        let (listener, hits) = counting_listener();
        let token = registry.register("audio", listener);
        assert_eq!(registry.listener_count("audio"), 1);

        token.cancel();
        assert_eq!(registry.listener_count("audio"), 0);
        registry.notify("audio");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_cancels_listener() {
        let registry = ObserverRegistry::new();
        let (listener, _hits) = counting_listener();
        {
            let _token = registry.register("audio", listener);
            assert_eq!(registry.listener_count("audio"), 1);
        }
        assert_eq!(registry.listener_count("audio"), 0);
    }

    #[test]
    fn listeners_are_independent() {
        let registry = ObserverRegistry::new();
        let (first, first_hits) = counting_listener();
        let (second, second_hits) = counting_listener();
        let first_token = registry.register("audio", first);
        let _second_token = registry.register("audio", second);

        registry.notify("audio");
        first_token.cancel();
        registry.notify("audio");

        assert_eq!(first_hits.load(Ordering::SeqCst), 1);
        assert_eq!(second_hits.load(Ordering::SeqCst), 2);
    }
}
