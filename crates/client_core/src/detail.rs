//! Detail synchronizer: one live subscription to a single report, plus the
//! status and comment actions the detail view exposes. Status changes apply
//! optimistically in two phases so a failed write can revert cleanly.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::error;

use shared::{
    domain::{Report, ReportAction, ReportId, Viewer},
    error::{StoreError, SyncError},
};
use storage::{ListenerGuard, RemoteStore, Snapshot};

use crate::{cache::SnapshotCache, reconcile::reconcile_detail, repository::ReportRepository};

/// Progress of the most recent mutating action issued from the detail view.
#[derive(Debug, Clone, PartialEq)]
pub enum WritePhase {
    Idle,
    /// Applied locally; the persistence write is in flight.
    Pending,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    pub report: Report,
    pub write: WritePhase,
}

/// Render-ready detail state. Record contents are never exposed through the
/// access-denied state.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    NotFound,
    AccessDenied,
    Ready(ReportView),
    Failed(String),
}

/// Owns the subscription and pump task for one mounted detail view.
pub struct DetailHandle {
    id: ReportId,
    repo: ReportRepository,
    state_tx: Arc<watch::Sender<DetailState>>,
    state_rx: watch::Receiver<DetailState>,
    live: Arc<AtomicBool>,
    guard: Option<ListenerGuard>,
    pump: JoinHandle<()>,
}

impl DetailHandle {
    /// Opens the single-key subscription and starts the pump task. The
    /// snapshot cache seeds the initial state when it holds this report.
    pub async fn attach(
        store: Arc<dyn RemoteStore>,
        viewer: Viewer,
        cache: SnapshotCache,
        id: ReportId,
    ) -> Result<Self, SyncError> {
        let query = ReportRepository::detail_query(&id);
        let subscription = store.watch(&query).await?;
        let (mut snapshots, guard) = subscription.split();

        let seed = match cache.detail(&id) {
            Some(snapshot) => project(&viewer, &snapshot),
            None => DetailState::Loading,
        };
        let (tx, rx) = watch::channel(seed);
        let tx = Arc::new(tx);
        let live = Arc::new(AtomicBool::new(true));

        let pump_tx = Arc::clone(&tx);
        let pump_live = Arc::clone(&live);
        let pump_viewer = viewer.clone();
        let pump_id = id.clone();
        let pump = tokio::spawn(async move {
            while let Some(delivery) = snapshots.recv().await {
                let next = match delivery {
                    Ok(snapshot) => {
                        cache.put_detail(&pump_id, snapshot.clone());
                        project(&pump_viewer, &snapshot)
                    }
                    Err(err) => DetailState::Failed(err.to_string()),
                };
                if !pump_live.load(Ordering::SeqCst) {
                    break;
                }
                if pump_tx.send(next).is_err() {
                    break;
                }
            }
        });

        let repo = ReportRepository::new(store, viewer);
        Ok(Self {
            id,
            repo,
            state_tx: tx,
            state_rx: rx,
            live,
            guard: Some(guard),
            pump,
        })
    }

    pub fn id(&self) -> &ReportId {
        &self.id
    }

    /// Watch channel of the current detail state.
    pub fn state(&self) -> watch::Receiver<DetailState> {
        self.state_rx.clone()
    }

    pub fn current(&self) -> DetailState {
        self.state_rx.borrow().clone()
    }

    /// Applies a status action with an optimistic two-phase transition: the
    /// local view flips immediately, the persistence write follows, and a
    /// failure reverts to the prior record while surfacing the error.
    ///
    /// `Delete` never writes a status; it removes the record and the empty
    /// snapshot lands the view in `NotFound`.
    pub async fn apply(&self, action: ReportAction) -> Result<(), SyncError> {
        let prior = self.loaded_report()?;

        let (optimistic, outcome) = match action {
            ReportAction::SetStatus(status) => {
                let mut updated = prior.clone();
                updated.status = status;
                self.publish(DetailState::Ready(ReportView {
                    report: updated.clone(),
                    write: WritePhase::Pending,
                }));
                let outcome = self.repo.update(&self.id, &updated).await;
                (Some(updated), outcome)
            }
            ReportAction::Delete => {
                self.publish(DetailState::Ready(ReportView {
                    report: prior.clone(),
                    write: WritePhase::Pending,
                }));
                (None, self.repo.delete(&self.id).await)
            }
        };

        match outcome {
            Ok(()) => {
                if let Some(report) = optimistic {
                    self.publish(DetailState::Ready(ReportView {
                        report,
                        write: WritePhase::Idle,
                    }));
                }
                Ok(())
            }
            Err(err) => {
                error!(id = %self.id, error = %err, "action write failed; reverting optimistic update");
                self.publish(DetailState::Ready(ReportView {
                    report: prior,
                    write: WritePhase::Failed(err.to_string()),
                }));
                Err(err)
            }
        }
    }

    /// Appends a comment through the repository; the updated record arrives
    /// back through the subscription.
    pub async fn add_comment(&self, text: impl Into<String>) -> Result<(), SyncError> {
        self.loaded_report()?;
        self.repo.append_comment(&self.id, text).await
    }

    /// Requests teardown: in-flight deliveries become no-ops, the listener is
    /// detached, and the pump is stopped.
    pub fn detach(mut self) {
        self.release();
    }

    fn loaded_report(&self) -> Result<Report, SyncError> {
        match self.current() {
            DetailState::Ready(view) => Ok(view.report),
            DetailState::Loading => Err(SyncError::NotLoaded(self.id.clone())),
            DetailState::NotFound => Err(SyncError::NotFound(self.id.clone())),
            DetailState::AccessDenied => Err(SyncError::AccessDenied {
                uid: self.repo.viewer().uid().to_owned(),
                id: self.id.clone(),
            }),
            DetailState::Failed(message) => Err(SyncError::Store(StoreError::Backend(message))),
        }
    }

    fn publish(&self, state: DetailState) {
        if self.live.load(Ordering::SeqCst) {
            let _ = self.state_tx.send(state);
        }
    }

    fn release(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(guard) = self.guard.take() {
            guard.detach();
        }
        self.pump.abort();
    }
}

impl Drop for DetailHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Projects one detail snapshot into view state for this viewer.
fn project(viewer: &Viewer, snapshot: &Snapshot) -> DetailState {
    match reconcile_detail(snapshot) {
        None => DetailState::NotFound,
        Some(report) if !viewer.can_view(&report) => DetailState::AccessDenied,
        Some(report) => DetailState::Ready(ReportView {
            report,
            write: WritePhase::Idle,
        }),
    }
}

#[cfg(test)]
#[path = "tests/detail_tests.rs"]
mod tests;
