//! Domain operations over the remote report collection.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use shared::{
    domain::{Comment, Report, ReportId, ReportStatus, Viewer},
    error::{StoreError, SyncError},
};
use storage::{Query, RemoteStore, StorePath};

use crate::reconcile::decode_report;

/// Root of the report collection in the remote tree.
pub const REPORTS_PATH: &str = "reports";

/// Field the role-filtered list queries order on.
const OWNER_UID_FIELD: &str = "owner/uid";

/// A new report as captured by the submission form.
#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub title: String,
    pub description: String,
    pub urgency: String,
    pub category: String,
}

#[derive(Clone)]
pub struct ReportRepository {
    store: Arc<dyn RemoteStore>,
    viewer: Viewer,
}

impl ReportRepository {
    pub fn new(store: Arc<dyn RemoteStore>, viewer: Viewer) -> Self {
        Self { store, viewer }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    fn collection() -> StorePath {
        StorePath::new(REPORTS_PATH)
    }

    fn record_path(id: &ReportId) -> StorePath {
        Self::collection().child(id.as_str())
    }

    /// List query for this viewer: admins see every record, everyone else
    /// only records they own. Filtering happens in the query, not client-side.
    pub fn list_query(viewer: &Viewer) -> Query {
        let query = Query::at(REPORTS_PATH).order_by_child(OWNER_UID_FIELD);
        if viewer.is_admin {
            query
        } else {
            query.equal_to(viewer.uid())
        }
    }

    /// Single-record query keyed on the report id.
    pub fn detail_query(id: &ReportId) -> Query {
        Query::at(REPORTS_PATH).order_by_key().equal_to(id.as_str())
    }

    /// Files a new report: one generated key, one write. The description
    /// becomes comment 0, authored by the viewer.
    pub async fn create(&self, draft: ReportDraft) -> Result<ReportId, SyncError> {
        let id = ReportId(self.store.generate_key());
        let now = Utc::now();
        let report = Report {
            id: id.clone(),
            title: draft.title,
            urgency: draft.urgency,
            category: draft.category,
            status: ReportStatus::Awaiting,
            owner: self.viewer.user.clone(),
            comments: vec![Comment {
                author: self.viewer.user.clone(),
                text: draft.description,
                created_at: now,
            }],
            created_at: now,
        };
        self.write(&Self::record_path(&id), &report).await?;
        Ok(id)
    }

    /// Point read of the role-filtered collection, keyed by record id; `None`
    /// when the path holds no data. Malformed records are skipped with a
    /// warning.
    pub async fn get_all(&self) -> Result<Option<BTreeMap<String, Report>>, SyncError> {
        let snapshot = self.store.get(&Self::list_query(&self.viewer)).await?;
        if snapshot.value().is_none() {
            return Ok(None);
        }
        let mut reports = BTreeMap::new();
        for (key, value) in snapshot.entries() {
            match decode_report(key, value) {
                Ok(report) => {
                    reports.insert(key.clone(), report);
                }
                Err(err) => warn!(key = %key, error = %err, "skipping malformed report record"),
            }
        }
        Ok(Some(reports))
    }

    pub async fn get_one(&self, id: &ReportId) -> Result<Option<Report>, SyncError> {
        let snapshot = self.store.get(&Query::at(Self::record_path(id))).await?;
        match snapshot.into_value() {
            None => Ok(None),
            Some(value) => decode_report(id.as_str(), &value).map(Some),
        }
    }

    /// Full overwrite of the record at `id`. Read-modify-write sequencing is
    /// the caller's responsibility.
    pub async fn update(&self, id: &ReportId, report: &Report) -> Result<(), SyncError> {
        self.write(&Self::record_path(id), report).await
    }

    /// Appends a comment stamped with the viewer and the current time, then
    /// writes back the whole comment sequence. Two concurrent appends race
    /// last-write-wins; see DESIGN.md.
    pub async fn append_comment(
        &self,
        id: &ReportId,
        text: impl Into<String>,
    ) -> Result<(), SyncError> {
        let mut report = self
            .get_one(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.clone()))?;
        report.comments.push(Comment {
            author: self.viewer.user.clone(),
            text: text.into(),
            created_at: Utc::now(),
        });
        self.write(&Self::record_path(id).child("comments"), &report.comments)
            .await
    }

    /// Removes the record subtree.
    pub async fn delete(&self, id: &ReportId) -> Result<(), SyncError> {
        let path = Self::record_path(id);
        self.store
            .delete(&path)
            .await
            .map_err(|source| SyncError::WriteFailed {
                path: path.to_string(),
                source,
            })
    }

    async fn write<T: Serialize>(&self, path: &StorePath, value: &T) -> Result<(), SyncError> {
        let value = encode(path, value)?;
        self.store
            .put(path, value)
            .await
            .map_err(|source| SyncError::WriteFailed {
                path: path.to_string(),
                source,
            })
    }
}

fn encode<T: Serialize>(path: &StorePath, value: &T) -> Result<Value, SyncError> {
    serde_json::to_value(value).map_err(|err| SyncError::WriteFailed {
        path: path.to_string(),
        source: StoreError::Serde {
            path: path.to_string(),
            reason: err.to_string(),
        },
    })
}

#[cfg(test)]
#[path = "tests/repository_tests.rs"]
mod tests;
