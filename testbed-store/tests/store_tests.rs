use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use testbed_store::{Store, StoreConfig, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    name: String,
    size: u64,
}

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(&StoreConfig::new(dir.path().join("db/testbed.db"))).expect("open");
    (dir, store)
}

#[tokio::test]
async fn put_then_get_returns_value() {
    let (_dir, store) = temp_store();
    store.put_raw(Some("a"), "k", "v").await.unwrap();
    assert_eq!(store.get(Some("a"), "k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn unknown_key_is_not_found_not_error() {
    let (_dir, store) = temp_store();
    assert_eq!(store.get(Some("a"), "missing").await.unwrap(), None);
    assert!(!store.exists(Some("a"), "missing").await.unwrap());
    let rec: Option<Record> = store.get_record(Some("a"), "missing").await.unwrap();
    assert!(rec.is_none());
}

#[tokio::test]
async fn backing_file_is_created_lazily() {
    let (_dir, store) = temp_store();
    assert!(!store.path().exists());
    store.exists(None, "anything").await.unwrap();
    assert!(store.path().exists());
}

#[tokio::test]
async fn put_overwrites_and_trims() {
    let (_dir, store) = temp_store();
    store.put_raw(Some(" cfg "), " name ", "first").await.unwrap();
    store.put_raw(Some("cfg"), "name", "second").await.unwrap();
    assert_eq!(
        store.get(Some("cfg"), "name").await.unwrap().as_deref(),
        Some("second")
    );
}

#[tokio::test]
async fn namespaces_partition_keys() {
    let (_dir, store) = temp_store();
    store.put_raw(Some("one"), "k", "1").await.unwrap();
    store.put_raw(Some("two"), "k", "2").await.unwrap();
    store.put_raw(None, "k", "bare").await.unwrap();

    assert_eq!(store.get(Some("one"), "k").await.unwrap().as_deref(), Some("1"));
    assert_eq!(store.get(Some("two"), "k").await.unwrap().as_deref(), Some("2"));
    assert_eq!(store.get(None, "k").await.unwrap().as_deref(), Some("bare"));
    assert_eq!(store.get(None, "one/k").await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
async fn blank_namespace_or_key_is_validation_error() {
    let (_dir, store) = temp_store();
    let err = store.put_raw(Some("  "), "k", "v").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidNamespace(_)));
    let err = store.get(Some("ns"), "").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)));
    assert!(err.is_validation());
}

#[tokio::test]
async fn structured_records_round_trip() {
    let (_dir, store) = temp_store();
    let rec = Record {
        name: "warp".into(),
        size: 42,
    };
    store.put(Some("records"), "r1", &rec).await.unwrap();
    let loaded: Option<Record> = store.get_record(Some("records"), "r1").await.unwrap();
    assert_eq!(loaded, Some(rec));
}

#[tokio::test]
async fn entries_strip_namespace_and_filter_prefix() {
    let (_dir, store) = temp_store();
    for (key, size) in [("run-1/a", 1), ("run-1/b", 2), ("run-2/a", 3)] {
        let rec = Record {
            name: key.into(),
            size,
        };
        store.put(Some("errors"), key, &rec).await.unwrap();
    }
    store.put_raw(Some("other"), "run-1/z", "{}").await.unwrap();

    let all: BTreeMap<String, Record> = store.entries(Some("errors"), None).await.unwrap();
    assert_eq!(
        all.keys().cloned().collect::<Vec<_>>(),
        vec!["run-1/a", "run-1/b", "run-2/a"]
    );

    let run1: BTreeMap<String, Record> = store.entries(Some("errors"), Some("run-1/")).await.unwrap();
    assert_eq!(run1.len(), 2);
    assert_eq!(run1["run-1/b"].size, 2);

    let err = store
        .entries::<Record>(Some("errors"), Some(""))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidPrefix(_)));
}

#[tokio::test]
async fn corrupt_record_is_reported() {
    let (_dir, store) = temp_store();
    store
        .put(Some("records"), "good", &Record { name: "ok".into(), size: 1 })
        .await
        .unwrap();
    store.put_raw(Some("records"), "bad", "not json").await.unwrap();

    let err = store
        .entries::<Record>(Some("records"), None)
        .await
        .unwrap_err();
    assert!(err.is_corrupt());
    assert!(err.to_string().contains("records/bad"));

    let err = store
        .get_record::<Record>(Some("records"), "bad")
        .await
        .unwrap_err();
    assert!(err.is_corrupt());
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = StoreConfig::new(dir.path().join("testbed.db"));
    {
        let store = Store::open(&config).unwrap();
        store.put_raw(Some("ns"), "k", "persisted").await.unwrap();
    }
    let store = Store::open(&config).unwrap();
    assert_eq!(
        store.get(Some("ns"), "k").await.unwrap().as_deref(),
        Some("persisted")
    );
}

#[tokio::test]
async fn transaction_create_if_absent_is_atomic() {
    let (_dir, store) = temp_store();
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut tx = store.transaction().await;
            if let Some(existing) = tx.get(Some("by-name"), "shared").await? {
                return Ok::<_, StoreError>(existing);
            }
            let id = format!("id-{i}");
            tx.put_raw(Some("by-id"), &id, "config").await?;
            tx.put_raw(Some("by-name"), "shared", &id).await?;
            Ok(id)
        }));
    }

    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap().unwrap());
    }
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    let by_id = store.entries_raw(Some("by-id"), None).await.unwrap();
    assert_eq!(by_id.len(), 1);
}
