//! Ordered listener registries.
//!
//! Observers of domain enter/leave transitions are invoked in
//! registration order, and unregistration is idempotent. Emission takes a
//! snapshot of the current listeners so a callback may register or
//! unregister listeners without deadlocking the registry.

use std::sync::{Arc, Mutex};

/// Opaque handle returned by [`ListenerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// An ordered collection of listeners for events of type `E`.
pub struct ListenerRegistry<E> {
    inner: Mutex<RegistryState<E>>,
}

struct RegistryState<E> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<E>)>,
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryState { next_id: 0, entries: Vec::new() }),
        }
    }

    /// Add a listener; it will be invoked after all currently registered
    /// listeners.
    pub fn register(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.entries.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if the id was already removed.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = state.entries.len();
        state.entries.retain(|(entry_id, _)| *entry_id != id);
        state.entries.len() != before
    }

    /// Invoke every listener with `event`, in registration order.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = {
            let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            state.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
