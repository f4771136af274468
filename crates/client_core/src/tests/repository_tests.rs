use super::*;
use shared::domain::UserRef;
use storage::MemoryStore;

fn viewer(uid: &str, admin: bool) -> Viewer {
    Viewer::new(UserRef::new(uid, format!("{uid}@example.com")), admin)
}

fn repository(store: &MemoryStore, uid: &str, admin: bool) -> ReportRepository {
    ReportRepository::new(Arc::new(store.clone()), viewer(uid, admin))
}

fn draft(title: &str, description: &str) -> ReportDraft {
    ReportDraft {
        title: title.into(),
        description: description.into(),
        urgency: "high".into(),
        category: "facilities".into(),
    }
}

#[tokio::test]
async fn create_then_get_one_returns_seed_state() {
    let store = MemoryStore::new();
    let repo = repository(&store, "u-1", false);

    let id = repo
        .create(draft("Broken printer", "desc"))
        .await
        .expect("create");
    let report = repo.get_one(&id).await.expect("get").expect("report");

    assert_eq!(report.id, id);
    assert_eq!(report.status, ReportStatus::Awaiting);
    assert_eq!(report.owner.uid, "u-1");
    assert_eq!(report.comments.len(), 1);
    assert_eq!(report.comments[0].text, "desc");
    assert_eq!(report.description(), Some("desc"));
}

#[tokio::test]
async fn append_comment_preserves_existing_order() {
    let store = MemoryStore::new();
    let repo = repository(&store, "u-1", false);

    let id = repo
        .create(draft("Broken printer", "desc"))
        .await
        .expect("create");
    repo.append_comment(&id, "update").await.expect("append");

    let report = repo.get_one(&id).await.expect("get").expect("report");
    assert_eq!(report.comments.len(), 2);
    assert_eq!(report.comments[0].text, "desc");
    assert_eq!(report.comments[1].text, "update");
}

#[tokio::test]
async fn append_comment_to_missing_report_is_not_found() {
    let store = MemoryStore::new();
    let repo = repository(&store, "u-1", false);

    let err = repo
        .append_comment(&ReportId::from("missing"), "update")
        .await
        .expect_err("append should fail");
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[tokio::test]
async fn get_all_filters_by_owner_for_non_admins() {
    let store = MemoryStore::new();
    let alice = repository(&store, "u-1", false);
    let bob = repository(&store, "u-2", false);

    alice.create(draft("one", "d")).await.expect("create");
    alice.create(draft("two", "d")).await.expect("create");
    bob.create(draft("three", "d")).await.expect("create");

    let own = alice.get_all().await.expect("get").expect("some");
    assert_eq!(own.len(), 2);
    assert!(own.values().all(|report| report.owner.uid == "u-1"));

    let everything = repository(&store, "admin", true)
        .get_all()
        .await
        .expect("get")
        .expect("some");
    assert_eq!(everything.len(), 3);

    let none = repository(&store, "u-9", false).get_all().await.expect("get");
    assert!(none.is_none());
}

#[tokio::test]
async fn update_overwrites_the_whole_record() {
    let store = MemoryStore::new();
    let repo = repository(&store, "u-1", false);

    let id = repo.create(draft("one", "d")).await.expect("create");
    let mut report = repo.get_one(&id).await.expect("get").expect("report");
    report.status = ReportStatus::Closed;
    report.title = "one (resolved)".into();
    repo.update(&id, &report).await.expect("update");

    let reread = repo.get_one(&id).await.expect("get").expect("report");
    assert_eq!(reread.status, ReportStatus::Closed);
    assert_eq!(reread.title, "one (resolved)");
}

#[tokio::test]
async fn delete_removes_the_record() {
    let store = MemoryStore::new();
    let repo = repository(&store, "u-1", false);

    let id = repo.create(draft("one", "d")).await.expect("create");
    repo.delete(&id).await.expect("delete");
    assert!(repo.get_one(&id).await.expect("get").is_none());
}
