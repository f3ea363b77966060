//! Per-algorithm event listeners.

use crate::error::{Result, SearchError};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Receives every event an algorithm emits, in the driving thread.
pub trait Listener<E>: Send + Sync {
    /// Handle one event. Errors are logged and otherwise ignored.
    fn on_event(&self, event: &E) -> Result<()>;
}

impl<E, F> Listener<E> for F
where
    F: Fn(&E) -> Result<()> + Send + Sync,
{
    fn on_event(&self, event: &E) -> Result<()> {
        self(event)
    }
}

/// Handle returned on registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The listener list owned by one algorithm instance.
///
/// Registration and removal may happen from other threads while events are
/// being delivered; delivery works on a snapshot of the list.
pub struct ListenerRegistry<E> {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn Listener<E>>)>>,
    next_id: AtomicU64,
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E> std::fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<E> ListenerRegistry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener.
    pub fn register(&self, listener: Arc<dyn Listener<E>>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True if nobody listens.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver `event` to every listener. A failing or panicking listener is
    /// logged and skipped.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<_> = self.listeners.read().clone();
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(listener = id.0, error = %err, "listener failed"),
                Err(_) => warn!(listener = id.0, "listener panicked"),
            }
        }
    }
}

/// Listener that keeps a copy of every event.
#[derive(Debug)]
pub struct EventCollector<E> {
    events: Mutex<Vec<E>>,
}

impl<E> Default for EventCollector<E> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> EventCollector<E> {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events received so far.
    pub fn events(&self) -> Vec<E> {
        self.events.lock().clone()
    }

    /// Number of events received.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl<E: Clone + Send> Listener<E> for EventCollector<E> {
    fn on_event(&self, event: &E) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Helper for listeners that want to report a failure.
pub fn listener_error(message: impl Into<String>) -> SearchError {
    SearchError::Listener(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn register_and_unregister() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let id = registry.register(Arc::new(|_: &u32| -> Result<()> { Ok(()) }));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn failing_listener_does_not_stop_delivery() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));

        registry.register(Arc::new(|_: &u32| -> Result<()> { Err(listener_error("nope")) }));
        registry.register(Arc::new(|_: &u32| -> Result<()> { panic!("listener bug") }));
        let counter = seen.clone();
        registry.register(Arc::new(move |event: &u32| -> Result<()> {
            counter.fetch_add(*event as usize, Ordering::SeqCst);
            Ok(())
        }));

        registry.publish(&3);
        registry.publish(&4);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn listener_may_register_during_delivery() {
        let registry: Arc<ListenerRegistry<u32>> = Arc::new(ListenerRegistry::new());
        let inner = registry.clone();
        registry.register(Arc::new(move |_: &u32| -> Result<()> {
            inner.register(Arc::new(|_: &u32| -> Result<()> { Ok(()) }));
            Ok(())
        }));
        registry.publish(&1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn collector_keeps_events() {
        let collector: Arc<EventCollector<&'static str>> = Arc::new(EventCollector::new());
        let registry: ListenerRegistry<&'static str> = ListenerRegistry::new();
        registry.register(collector.clone());
        registry.publish(&"a");
        registry.publish(&"b");
        assert_eq!(collector.events(), vec!["a", "b"]);
    }
}
