use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// Handle returned when a stream is registered.
#[derive(Debug, Clone)]
pub struct StreamTicket {
    pub token: CancellationToken,
    generation: u64,
}

/// In-flight streams of one connection, keyed by session id.
///
/// Each registration gets a generation so a finishing task never removes a
/// newer stream that reused the same session id.
#[derive(Debug, Default)]
pub struct ActiveStreams {
    inner: DashMap<String, (u64, CancellationToken)>,
    next_generation: AtomicU64,
}

impl ActiveStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session_id`. `None` if a stream for it is already running.
    pub fn try_register(&self, session_id: &str) -> Option<StreamTicket> {
        match self.inner.entry(session_id.to_owned()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let token = CancellationToken::new();
                slot.insert((generation, token.clone()));
                Some(StreamTicket { token, generation })
            }
        }
    }

    /// Signals the stream to stop. Returns false if nothing was running.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.inner.get(session_id) {
            Some(entry) => {
                entry.value().1.cancel();
                true
            }
            None => false,
        }
    }

    pub fn finish(&self, session_id: &str, ticket: &StreamTicket) {
        self.inner
            .remove_if(session_id, |_, (generation, _)| *generation == ticket.generation);
    }

    /// Cancels every running stream; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let mut n = 0;
        for entry in self.inner.iter() {
            entry.value().1.cancel();
            n += 1;
        }
        n
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.inner.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
