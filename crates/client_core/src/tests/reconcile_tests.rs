use super::*;
use serde_json::json;
use shared::domain::UserRef;

fn record(uid: &str, status: u8) -> Value {
    json!({
        "id": "embedded",
        "title": format!("report by {uid}"),
        "urgency": "high",
        "category": "facilities",
        "status": status,
        "owner": { "uid": uid, "email": format!("{uid}@example.com") },
        "comments": [{
            "author": { "uid": uid, "email": format!("{uid}@example.com") },
            "text": "desc",
            "created_at": "2024-05-01T10:00:00Z"
        }],
        "created_at": "2024-05-01T10:00:00Z"
    })
}

fn snapshot(entries: &[(&str, Value)]) -> Snapshot {
    let mut map = serde_json::Map::new();
    for (key, value) in entries {
        map.insert((*key).to_owned(), value.clone());
    }
    Snapshot::new(Some(Value::Object(map)))
}

#[test]
fn reconciling_twice_yields_identical_buckets() {
    let snapshot = snapshot(&[
        ("a", record("u-1", 0)),
        ("b", record("u-2", 1)),
        ("c", record("u-3", 2)),
    ]);
    assert_eq!(reconcile_list(&snapshot), reconcile_list(&snapshot));
}

#[test]
fn each_report_lands_in_exactly_one_bucket() {
    let snapshot = snapshot(&[
        ("a", record("u-1", 0)),
        ("b", record("u-2", 1)),
        ("c", record("u-3", 1)),
        ("d", record("u-4", 2)),
    ]);
    let buckets = reconcile_list(&snapshot);
    assert_eq!(buckets.awaiting.len(), 1);
    assert_eq!(buckets.in_progress.len(), 2);
    assert_eq!(buckets.closed.len(), 1);
    assert_eq!(buckets.len(), 4);
}

#[test]
fn empty_or_absent_snapshot_yields_empty_buckets() {
    assert_eq!(reconcile_list(&Snapshot::empty()), StatusBuckets::default());
    assert_eq!(
        reconcile_list(&Snapshot::new(Some(json!({})))),
        StatusBuckets::default()
    );
}

#[test]
fn malformed_records_are_skipped_not_fatal() {
    let snapshot = snapshot(&[
        ("a", record("u-1", 0)),
        ("bad-status", record("u-2", 7)),
        ("missing-fields", json!({ "title": "no owner" })),
        ("b", record("u-3", 2)),
    ]);
    let buckets = reconcile_list(&snapshot);
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets.awaiting[0].id.as_str(), "a");
    assert_eq!(buckets.closed[0].id.as_str(), "b");
}

#[test]
fn entry_key_wins_over_embedded_id() {
    let buckets = reconcile_list(&snapshot(&[("store-key", record("u-1", 0))]));
    assert_eq!(buckets.awaiting[0].id.as_str(), "store-key");
}

#[test]
fn pending_lists_in_progress_first_and_each_report_once() {
    let mut buckets = reconcile_list(&snapshot(&[
        ("a", record("u-1", 0)),
        ("b", record("u-2", 1)),
    ]));
    // Simulate a report present in both source arrays at the display layer.
    let duplicate = buckets.in_progress[0].clone();
    buckets.awaiting.push(duplicate);

    let pending = buckets.pending();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id.as_str(), "b");
    assert_eq!(pending[1].id.as_str(), "a");
}

#[test]
fn detail_reconciliation_extracts_the_single_record() {
    let report = reconcile_detail(&snapshot(&[("r-1", record("u-1", 1))]))
        .expect("record should decode");
    assert_eq!(report.id.as_str(), "r-1");
    assert_eq!(report.status, ReportStatus::InProgress);
    assert_eq!(report.owner, UserRef::new("u-1", "u-1@example.com"));

    assert_eq!(reconcile_detail(&Snapshot::empty()), None);
}
