//! Remote-store client abstraction consumed by the sync layer, plus two local
//! backends: an in-memory tree and a SQLite-backed store for durable local
//! development. Both deliver full query snapshots over live subscriptions.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use shared::error::StoreError;

mod listeners;
pub mod memory;
pub mod sqlite;
mod tree;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Slash-separated location in the remote tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath(String);

impl StorePath {
    pub fn new(path: impl Into<String>) -> Self {
        let raw = path.into();
        Self(raw.trim_matches('/').to_owned())
    }

    pub fn child(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        if self.0.is_empty() {
            Self(segment.to_owned())
        } else {
            Self(format!("{}/{segment}", self.0))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// True when either path is an ancestor of (or equal to) the other; a
    /// write at one then affects the subtree visible at the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        let a = self.as_str();
        let b = other.as_str();
        a == b
            || a.is_empty()
            || b.is_empty()
            || a.starts_with(&format!("{b}/"))
            || b.starts_with(&format!("{a}/"))
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StorePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StorePath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Ordering/filtering directive applied to the children of a query path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    Key,
    /// Slash-separated field path inside each child, e.g. `owner/uid`.
    Child(String),
}

/// A composable path-plus-filter handle into the remote tree. Filtering
/// happens at the query level, never client-side.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub path: StorePath,
    pub order_by: Option<OrderBy>,
    pub equal_to: Option<Value>,
}

impl Query {
    pub fn at(path: impl Into<StorePath>) -> Self {
        Self {
            path: path.into(),
            order_by: None,
            equal_to: None,
        }
    }

    pub fn order_by_key(mut self) -> Self {
        self.order_by = Some(OrderBy::Key);
        self
    }

    pub fn order_by_child(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy::Child(field.into()));
        self
    }

    pub fn equal_to(mut self, value: impl Into<Value>) -> Self {
        self.equal_to = Some(value.into());
        self
    }
}

/// Point-in-time materialization of the subtree matched by a query. Holding
/// no value means the path (or filter) matched no data; empty objects
/// normalize to the same outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    value: Option<Value>,
}

impl Snapshot {
    pub fn new(value: Option<Value>) -> Self {
        match value {
            Some(Value::Null) => Self { value: None },
            Some(Value::Object(map)) if map.is_empty() => Self { value: None },
            other => Self { value: other },
        }
    }

    pub fn empty() -> Self {
        Self { value: None }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// Child entries in key order; empty when the snapshot holds no object.
    pub fn entries(&self) -> Vec<(&String, &Value)> {
        match &self.value {
            Some(Value::Object(map)) => map.iter().collect(),
            _ => Vec::new(),
        }
    }
}

pub type SnapshotResult = Result<Snapshot, StoreError>;

/// Live feed of query snapshots: one on attach, then one per relevant change.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SnapshotResult>,
    guard: ListenerGuard,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<SnapshotResult>, guard: ListenerGuard) -> Self {
        Self { rx, guard }
    }

    pub async fn recv(&mut self) -> Option<SnapshotResult> {
        self.rx.recv().await
    }

    /// Splits into the raw receiver and the detach guard so a pump task can
    /// own one while the view handle owns the other.
    pub fn split(self) -> (mpsc::UnboundedReceiver<SnapshotResult>, ListenerGuard) {
        (self.rx, self.guard)
    }
}

/// Detaches the backing listener when released or dropped.
pub struct ListenerGuard {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerGuard {
    pub(crate) fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn detach(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// The hosted store's client surface: point reads, full-overwrite writes,
/// deletes, and live subscriptions, all addressed through queries.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// New unique, time-ordered child key, assigned before the record is
    /// written.
    fn generate_key(&self) -> String;

    async fn get(&self, query: &Query) -> Result<Snapshot, StoreError>;

    /// Full overwrite of the subtree at `path`.
    async fn put(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError>;

    async fn watch(&self, query: &Query) -> Result<Subscription, StoreError>;
}

/// Evaluates a query against the subtree rooted at the query path. Without an
/// ordering directive (or without a filter) the whole subtree is returned;
/// with `equal_to`, only child entries whose ordering field (or key) equals
/// the filter value survive. Missing fields compare unequal to every filter.
pub fn evaluate_query(subtree: Option<&Value>, query: &Query) -> Snapshot {
    let Some(value) = subtree else {
        return Snapshot::empty();
    };
    let Some(order_by) = &query.order_by else {
        return Snapshot::new(Some(value.clone()));
    };
    let Some(filter) = &query.equal_to else {
        return Snapshot::new(Some(value.clone()));
    };
    let Value::Object(children) = value else {
        return Snapshot::empty();
    };

    let mut matched = serde_json::Map::new();
    for (key, child) in children {
        let hit = match order_by {
            OrderBy::Key => filter.as_str() == Some(key.as_str()),
            OrderBy::Child(field) => tree::field_at(child, field) == Some(filter),
        };
        if hit {
            matched.insert(key.clone(), child.clone());
        }
    }
    Snapshot::new(Some(Value::Object(matched)))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
