use thiserror::Error;

use crate::domain::ReportId;

/// Failure surface of a remote-store backend. Cloneable so live subscriptions
/// can deliver it alongside snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store is unavailable: {0}")]
    Unavailable(String),
    #[error("undecodable value at {path}: {reason}")]
    Serde { path: String, reason: String },
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Client-layer failure taxonomy. Access and not-found outcomes render inline
/// in views; write failures are recoverable and surfaced both as errors and
/// as view state.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("report {0} not found")]
    NotFound(ReportId),
    #[error("user {uid} has no access to report {id}")]
    AccessDenied { uid: String, id: ReportId },
    #[error("report {0} is not loaded yet")]
    NotLoaded(ReportId),
    #[error("write to {path} failed: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error("malformed record {key}: {reason}")]
    MalformedRecord { key: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
