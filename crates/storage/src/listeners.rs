//! In-process registry of live listeners. Backends publish the full query
//! snapshot to every listener whose query path overlaps a written path;
//! delivery never blocks the writer.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use tokio::sync::mpsc;

use crate::{ListenerGuard, Query, SnapshotResult, StorePath};

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<Mutex<HashMap<u64, Listener>>>,
    next_id: AtomicU64,
}

struct Listener {
    query: Query,
    tx: mpsc::UnboundedSender<SnapshotResult>,
}

impl ListenerRegistry {
    /// Registers a listener, delivers `initial` through its channel, and
    /// returns the receiver plus a guard that deregisters on release.
    pub(crate) fn attach(
        &self,
        query: Query,
        initial: SnapshotResult,
    ) -> (mpsc::UnboundedReceiver<SnapshotResult>, ListenerGuard) {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(initial);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner).insert(id, Listener { query, tx });

        let inner = Arc::clone(&self.inner);
        let guard = ListenerGuard::new(move || {
            lock(&inner).remove(&id);
        });
        (rx, guard)
    }

    /// Listeners whose query overlaps the written path, as (id, query) pairs
    /// the backend resolves snapshots for.
    pub(crate) fn overlapping(&self, changed: &StorePath) -> Vec<(u64, Query)> {
        lock(&self.inner)
            .iter()
            .filter(|(_, listener)| listener.query.path.overlaps(changed))
            .map(|(id, listener)| (*id, listener.query.clone()))
            .collect()
    }

    /// Delivers one snapshot; a closed receiver prunes the listener.
    pub(crate) fn send(&self, id: u64, result: SnapshotResult) {
        let mut listeners = lock(&self.inner);
        let delivered = listeners
            .get(&id)
            .map(|listener| listener.tx.send(result).is_ok())
            .unwrap_or(true);
        if !delivered {
            listeners.remove(&id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
