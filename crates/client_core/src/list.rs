//! List synchronizer: one live subscription to the report collection per
//! mounted list view, republished as render-ready bucket state.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::info;

use shared::{domain::Viewer, error::SyncError};
use storage::{ListenerGuard, RemoteStore};

use crate::{
    cache::SnapshotCache,
    reconcile::{reconcile_list, StatusBuckets},
    repository::ReportRepository,
};

/// Render-ready list state. Loading, empty-but-loaded, and error are three
/// distinct outcomes; an empty collection is `Ready` with empty buckets.
#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Loading,
    Ready(StatusBuckets),
    Failed(String),
}

impl ListState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ListState::Ready(_))
    }
}

/// Owns the subscription and pump task for one mounted list view.
pub struct ListHandle {
    state: watch::Receiver<ListState>,
    live: Arc<AtomicBool>,
    guard: Option<ListenerGuard>,
    pump: JoinHandle<()>,
}

impl ListHandle {
    /// Opens the role-filtered subscription and starts the pump task. The
    /// snapshot cache seeds the initial state when it holds a list snapshot.
    pub async fn attach(
        store: Arc<dyn RemoteStore>,
        viewer: Viewer,
        cache: SnapshotCache,
    ) -> Result<Self, SyncError> {
        let query = ReportRepository::list_query(&viewer);
        let subscription = store.watch(&query).await?;
        let (mut snapshots, guard) = subscription.split();

        let seed = match cache.list() {
            Some(snapshot) => ListState::Ready(reconcile_list(&snapshot)),
            None => ListState::Loading,
        };
        let (tx, rx) = watch::channel(seed);
        let live = Arc::new(AtomicBool::new(true));

        let pump_live = Arc::clone(&live);
        let pump = tokio::spawn(async move {
            while let Some(delivery) = snapshots.recv().await {
                let next = match delivery {
                    Ok(snapshot) => {
                        // Write-through happens even when teardown has already
                        // been requested; only view state is suppressed.
                        cache.put_list(snapshot.clone());
                        ListState::Ready(reconcile_list(&snapshot))
                    }
                    Err(err) => ListState::Failed(err.to_string()),
                };
                if !pump_live.load(Ordering::SeqCst) {
                    break;
                }
                if tx.send(next).is_err() {
                    break;
                }
            }
        });

        info!(admin = viewer.is_admin, "attached report list subscription");
        Ok(Self {
            state: rx,
            live,
            guard: Some(guard),
            pump,
        })
    }

    /// Watch channel of the current list state.
    pub fn state(&self) -> watch::Receiver<ListState> {
        self.state.clone()
    }

    pub fn current(&self) -> ListState {
        self.state.borrow().clone()
    }

    /// Requests teardown: in-flight deliveries become no-ops, the listener is
    /// detached, and the pump is stopped.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(guard) = self.guard.take() {
            guard.detach();
        }
        self.pump.abort();
    }
}

impl Drop for ListHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
