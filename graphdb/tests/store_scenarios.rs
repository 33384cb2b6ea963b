//! Integration tests over `Db`, covering the range-index and concurrent
//! batched-write scenarios from the scenario set.

use graphdb::{Backend, Config, Db, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

fn open() -> (tempfile::TempDir, Db) {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(&Config::new(dir.path())).unwrap();
    (dir, db)
}

/// 10,000 nodes with a uniform `age` property; a range query over an
/// indexed property must match the full-scan reference exactly.
#[test]
fn property_range_query_matches_full_scan_reference() {
    let (_dir, db) = open();
    for i in 0..10_000u64 {
        let age = 18 + (i % 70) as i64;
        let mut props = BTreeMap::new();
        props.insert("age".to_string(), Value::Int(age));
        db.create_node(vec!["Person".into()], props).unwrap();
    }
    db.create_property_index("age").unwrap();

    let lo = Value::Int(30);
    let hi = Value::Int(40);
    let mut indexed = db.find_nodes_by_property_range("age", &lo, &hi).unwrap();
    let mut scanned: Vec<_> = db
        .find_nodes_by_label("Person")
        .into_iter()
        .filter(|n| matches!(n.properties.get("age"), Some(Value::Int(a)) if (30..=40).contains(a)))
        .collect();
    indexed.sort_by_key(|n| n.id);
    scanned.sort_by_key(|n| n.id);
    assert_eq!(indexed, scanned);
    assert!(!indexed.is_empty());
}

/// 10 threads each create 1,000 nodes concurrently under group-commit
/// batching; after close and reopen every id must be present.
#[test]
fn concurrent_writes_under_batching_all_land_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(dir.path());
    config.backend = Backend::Memory;
    config.enable_batching = true;
    config.batch_size = 100;
    config.flush_interval = std::time::Duration::from_millis(10);
    let db = Arc::new(Db::open(&config).unwrap());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    db.create_node(vec!["Node".into()], BTreeMap::new()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.statistics().node_count, 10_000);
    db.close().unwrap();

    let reopened = Db::open(&config).unwrap();
    assert_eq!(reopened.statistics().node_count, 10_000);
}
