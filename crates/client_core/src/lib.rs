//! Realtime report synchronization core: the report repository, the list and
//! detail synchronizers, and the pure snapshot reconciler they share.

use std::sync::Arc;

use shared::{
    domain::{ReportId, Viewer},
    error::SyncError,
};
use storage::RemoteStore;

pub mod cache;
pub mod detail;
pub mod list;
pub mod reconcile;
pub mod repository;

pub use cache::SnapshotCache;
pub use detail::{DetailHandle, DetailState, ReportView, WritePhase};
pub use list::{ListHandle, ListState};
pub use reconcile::{reconcile_detail, reconcile_list, StatusBuckets};
pub use repository::{ReportDraft, ReportRepository, REPORTS_PATH};

/// Explicitly constructed client handle: the store, the authenticated viewer,
/// and a snapshot cache shared by every view attached through it.
#[derive(Clone)]
pub struct SyncClient {
    store: Arc<dyn RemoteStore>,
    viewer: Viewer,
    cache: SnapshotCache,
}

impl SyncClient {
    pub fn new(store: Arc<dyn RemoteStore>, viewer: Viewer) -> Self {
        Self {
            store,
            viewer,
            cache: SnapshotCache::new(),
        }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(Arc::clone(&self.store), self.viewer.clone())
    }

    /// Opens the live list view for this viewer.
    pub async fn watch_reports(&self) -> Result<ListHandle, SyncError> {
        ListHandle::attach(
            Arc::clone(&self.store),
            self.viewer.clone(),
            self.cache.clone(),
        )
        .await
    }

    /// Opens the live detail view for one report.
    pub async fn watch_report(&self, id: ReportId) -> Result<DetailHandle, SyncError> {
        DetailHandle::attach(
            Arc::clone(&self.store),
            self.viewer.clone(),
            self.cache.clone(),
            id,
        )
        .await
    }
}
