//! The session store: owns the aggregate, serializes mutations, notifies
//! listeners.
//!
//! One store instance is constructed per application root and threaded
//! explicitly to whatever needs it; there is no process-wide singleton.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::session::{Session, Transition};

type Listener = Box<dyn Fn(&Session) + Send + Sync>;

/// Thread-safe container for the [`Session`] aggregate.
///
/// Dispatches are fully serialized: the transition is applied and every
/// listener runs with the new snapshot before the next dispatch starts, so
/// observers always see mutations in application order. Listeners must not
/// dispatch or subscribe from inside the callback.
#[derive(Default)]
pub struct SessionStore {
    state: RwLock<Session>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the session, by value.
    pub fn snapshot(&self) -> Session {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply a transition and synchronously notify every listener.
    pub fn dispatch(&self, transition: Transition) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.apply(transition);
            state.clone()
        };
        for (_, listener) in listeners.iter() {
            listener(&snapshot);
        }
    }

    /// Like [`Self::dispatch`], but refuses when a credential operation is
    /// already in flight. Returns whether the transition was applied. The
    /// busy check and the application are one critical section, so two
    /// overlapping submissions cannot both pass.
    pub fn dispatch_if_idle(&self, transition: Transition) -> bool {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.busy {
                return false;
            }
            state.apply(transition);
            state.clone()
        };
        for (_, listener) in listeners.iter() {
            listener(&snapshot);
        }
        true
    }

    /// Register a listener invoked after every mutation. Dropping the
    /// returned handle unregisters it.
    pub fn subscribe(
        self: &Arc<Self>,
        listener: impl Fn(&Session) + Send + Sync + 'static,
    ) -> StoreSubscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Box::new(listener)));
        StoreSubscription {
            id,
            store: Arc::downgrade(self),
        }
    }
}

/// Listener registration handle; unsubscribes on drop.
pub struct StoreSubscription {
    id: u64,
    store: Weak<SessionStore>,
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
