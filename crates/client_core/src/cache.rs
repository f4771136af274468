//! Write-through cache of the most recent raw snapshots. Read at attach time
//! to seed view state before the first live snapshot arrives, written on
//! every delivery regardless of view liveness.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::ReportId;
use storage::Snapshot;

#[derive(Clone, Default)]
pub struct SnapshotCache {
    inner: Arc<Mutex<CacheInner>>,
}

#[derive(Default)]
struct CacheInner {
    list: Option<Snapshot>,
    details: HashMap<ReportId, Snapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_list(&self, snapshot: Snapshot) {
        self.lock().list = Some(snapshot);
    }

    pub fn list(&self) -> Option<Snapshot> {
        self.lock().list.clone()
    }

    pub fn put_detail(&self, id: &ReportId, snapshot: Snapshot) {
        self.lock().details.insert(id.clone(), snapshot);
    }

    pub fn detail(&self, id: &ReportId) -> Option<Snapshot> {
        self.lock().details.get(id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
