//! In-process tree store with push notifications: the unit-test and example
//! backbone, mirroring the hosted store's observable behavior.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use shared::error::StoreError;

use crate::{
    evaluate_query, listeners::ListenerRegistry, tree, Query, RemoteStore, Snapshot, StorePath,
    Subscription,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    root: Mutex<Value>,
    listeners: ListenerRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot_for(root: &Value, query: &Query) -> Snapshot {
        evaluate_query(tree::value_at(root, &query.path), query)
    }

    fn apply(&self, path: &StorePath, value: Option<Value>) {
        let root_after = {
            let mut root = lock_root(&self.inner.root);
            tree::write_at(&mut root, path, value);
            root.clone()
        };
        for (id, query) in self.inner.listeners.overlapping(path) {
            let snapshot = Self::snapshot_for(&root_after, &query);
            self.inner.listeners.send(id, Ok(snapshot));
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn generate_key(&self) -> String {
        Uuid::now_v7().to_string()
    }

    async fn get(&self, query: &Query) -> Result<Snapshot, StoreError> {
        let root = lock_root(&self.inner.root);
        Ok(Self::snapshot_for(&root, query))
    }

    async fn put(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.apply(path, Some(value));
        Ok(())
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        self.apply(path, None);
        Ok(())
    }

    async fn watch(&self, query: &Query) -> Result<Subscription, StoreError> {
        // The root lock spans the initial snapshot and registration so no
        // write can slip between them unobserved.
        let root = lock_root(&self.inner.root);
        let initial = Self::snapshot_for(&root, query);
        let (rx, guard) = self.inner.listeners.attach(query.clone(), Ok(initial));
        drop(root);
        Ok(Subscription::new(rx, guard))
    }
}

fn lock_root(root: &Mutex<Value>) -> std::sync::MutexGuard<'_, Value> {
    root.lock().unwrap_or_else(PoisonError::into_inner)
}
