use super::*;
use std::time::Duration;

use tokio::time::timeout;

use crate::repository::ReportDraft;
use shared::domain::UserRef;
use storage::MemoryStore;

fn viewer(uid: &str, admin: bool) -> Viewer {
    Viewer::new(UserRef::new(uid, format!("{uid}@example.com")), admin)
}

fn repository(store: &MemoryStore, uid: &str) -> ReportRepository {
    ReportRepository::new(Arc::new(store.clone()), viewer(uid, false))
}

fn draft(title: &str) -> ReportDraft {
    ReportDraft {
        title: title.into(),
        description: "desc".into(),
        urgency: "normal".into(),
        category: "general".into(),
    }
}

async fn ready_when<F>(rx: &mut watch::Receiver<ListState>, accept: F) -> StatusBuckets
where
    F: Fn(&StatusBuckets) -> bool,
{
    timeout(Duration::from_secs(2), async {
        loop {
            if let ListState::Ready(buckets) = rx.borrow_and_update().clone() {
                if accept(&buckets) {
                    return buckets;
                }
            }
            rx.changed().await.expect("list state channel open");
        }
    })
    .await
    .expect("list state should become ready")
}

#[tokio::test]
async fn admin_list_sees_all_owners() {
    let store = MemoryStore::new();
    repository(&store, "u-1").create(draft("one")).await.expect("create");
    repository(&store, "u-2").create(draft("two")).await.expect("create");

    let handle = ListHandle::attach(
        Arc::new(store.clone()),
        viewer("admin", true),
        SnapshotCache::new(),
    )
    .await
    .expect("attach");
    let mut rx = handle.state();
    let buckets = ready_when(&mut rx, |buckets| buckets.len() == 2).await;
    assert_eq!(buckets.awaiting.len(), 2);
}

#[tokio::test]
async fn user_list_sees_only_own_reports() {
    let store = MemoryStore::new();
    repository(&store, "u-1").create(draft("mine")).await.expect("create");
    repository(&store, "u-2").create(draft("theirs")).await.expect("create");

    let handle = ListHandle::attach(
        Arc::new(store.clone()),
        viewer("u-1", false),
        SnapshotCache::new(),
    )
    .await
    .expect("attach");
    let mut rx = handle.state();
    let buckets = ready_when(&mut rx, |buckets| buckets.len() == 1).await;
    assert_eq!(buckets.awaiting[0].owner.uid, "u-1");
    assert_eq!(buckets.awaiting[0].title, "mine");
}

#[tokio::test]
async fn empty_collection_is_loaded_with_empty_buckets() {
    let handle = ListHandle::attach(
        Arc::new(MemoryStore::new()),
        viewer("u-1", false),
        SnapshotCache::new(),
    )
    .await
    .expect("attach");
    let mut rx = handle.state();
    let buckets = ready_when(&mut rx, |_| true).await;
    assert!(buckets.is_empty());
    assert!(handle.current().is_loaded());
}

#[tokio::test]
async fn snapshot_updates_replace_state_wholesale() {
    let store = MemoryStore::new();
    let repo = repository(&store, "u-1");
    repo.create(draft("one")).await.expect("create");

    let handle = ListHandle::attach(
        Arc::new(store.clone()),
        viewer("u-1", false),
        SnapshotCache::new(),
    )
    .await
    .expect("attach");
    let mut rx = handle.state();
    ready_when(&mut rx, |buckets| buckets.len() == 1).await;

    let id = repo.create(draft("two")).await.expect("create");
    let buckets = ready_when(&mut rx, |buckets| buckets.len() == 2).await;
    assert!(buckets
        .awaiting
        .iter()
        .any(|report| report.id == id));
}

#[tokio::test]
async fn detach_suppresses_further_updates() {
    let store = MemoryStore::new();
    let repo = repository(&store, "u-1");
    repo.create(draft("one")).await.expect("create");

    let handle = ListHandle::attach(
        Arc::new(store.clone()),
        viewer("u-1", false),
        SnapshotCache::new(),
    )
    .await
    .expect("attach");
    let mut rx = handle.state();
    ready_when(&mut rx, |buckets| buckets.len() == 1).await;

    handle.detach();
    repo.create(draft("two")).await.expect("create");
    tokio::time::sleep(Duration::from_millis(50)).await;
    match rx.borrow().clone() {
        ListState::Ready(buckets) => assert_eq!(buckets.len(), 1),
        other => panic!("unexpected state after detach: {other:?}"),
    };
}

#[tokio::test]
async fn cache_seeds_initial_state_on_reattach() {
    let store = MemoryStore::new();
    let cache = SnapshotCache::new();
    repository(&store, "u-1").create(draft("one")).await.expect("create");

    let first = ListHandle::attach(
        Arc::new(store.clone()),
        viewer("u-1", false),
        cache.clone(),
    )
    .await
    .expect("attach");
    let mut rx = first.state();
    ready_when(&mut rx, |buckets| buckets.len() == 1).await;
    first.detach();

    // The second mount starts from the cached snapshot instead of Loading.
    let second = ListHandle::attach(
        Arc::new(store.clone()),
        viewer("u-1", false),
        cache.clone(),
    )
    .await
    .expect("attach");
    assert!(second.current().is_loaded());
}
