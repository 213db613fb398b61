//! Kind-keyed listener registry.
//!
//! Dispatch iterates over a snapshot taken under the lock and runs listeners
//! with the lock released, so a listener may subscribe or unsubscribe (itself
//! included) without affecting the dispatch in progress.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use dyad_core::{Envelope, MessageKind};

pub type Listener = Arc<dyn Fn(&Envelope) + Send + Sync>;

#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    listeners: HashMap<MessageKind, Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, kind: MessageKind, listener: Listener) -> Subscription {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.listeners.entry(kind).or_default().push((id, listener));
        Subscription {
            registry: Arc::downgrade(self),
            kind,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Invokes every listener registered for the envelope's kind at the time
    /// of the call. Returns how many ran.
    pub fn dispatch(&self, env: &Envelope) -> usize {
        let snapshot: Vec<Listener> = self
            .lock()
            .listeners
            .get(&env.kind())
            .map(|ls| ls.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in &snapshot {
            listener(env);
        }
        snapshot.len()
    }

    pub fn listener_count(&self, kind: MessageKind) -> usize {
        self.lock().listeners.get(&kind).map_or(0, Vec::len)
    }

    fn remove(&self, kind: MessageKind, id: u64) -> bool {
        let mut inner = self.lock();
        let Some(ls) = inner.listeners.get_mut(&kind) else {
            return false;
        };
        let before = ls.len();
        ls.retain(|(lid, _)| *lid != id);
        let removed = ls.len() != before;
        if ls.is_empty() {
            inner.listeners.remove(&kind);
        }
        removed
    }

    // Listeners never run under the lock, so a poisoned lock only means a
    // panic elsewhere; the map itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for one registration. `unsubscribe` removes exactly that
/// registration and is idempotent. Dropping the handle keeps the listener.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    kind: MessageKind,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.kind, self.id),
            None => false,
        }
    }
}
