//! Handler registry — pending reply callbacks and durable type handlers.
//!
//! DESIGN
//! ======
//! Both maps live behind one `std::sync::Mutex` that is never held across
//! an `.await`. The write path has its own lock in `Peer`; neither lock is
//! ever taken while holding the other.
//!
//! Once the peer is torn down the registry latches `closed`: every pending
//! callback is dropped without being invoked and later registrations are
//! refused, so nothing can wait on a reply that will never be routed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;

use crate::packet::Packet;

/// One-shot callback run with the reply to a correlated send.
pub type ReplyCallback = Box<dyn FnOnce(Packet) + Send + 'static>;

/// Durable responder for one packet type. `None` means "send nothing back".
pub type Handler = Arc<dyn Fn(Packet) -> BoxFuture<'static, Option<Packet>> + Send + Sync + 'static>;

#[derive(Default)]
pub(crate) struct Registry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// Correlation id -> callback awaiting the matching reply.
    pending: HashMap<String, ReplyCallback>,
    /// Packet type -> handler.
    handlers: HashMap<String, Handler>,
    closed: bool,
}

impl Registry {
    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `callback` under `correlation_id`. Returns `false` (dropping the
    /// callback) once the registry has been abandoned.
    pub(crate) fn insert_pending(&self, correlation_id: String, callback: ReplyCallback) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        inner.pending.insert(correlation_id, callback);
        true
    }

    /// Remove and return the callback for `correlation_id`. Each entry is
    /// handed out at most once.
    pub(crate) fn take_pending(&self, correlation_id: &str) -> Option<ReplyCallback> {
        self.lock().pending.remove(correlation_id)
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub(crate) fn register(&self, kind: String, handler: Handler) {
        self.lock().handlers.insert(kind, handler);
    }

    pub(crate) fn handler(&self, kind: &str) -> Option<Handler> {
        self.lock().handlers.get(kind).cloned()
    }

    /// Latch closed and drop every pending callback uninvoked. Returns how
    /// many were abandoned.
    pub(crate) fn abandon_all(&self) -> usize {
        let abandoned = {
            let mut inner = self.lock();
            inner.closed = true;
            std::mem::take(&mut inner.pending)
        };
        // Dropped outside the lock: callbacks may own channel senders whose
        // drop wakes other tasks.
        abandoned.len()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
