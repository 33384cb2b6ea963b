//! Integration tests exercising the full-text index and the traverser
//! through the `Db` facade, covering scenario S5 and testable properties
//! 8-10.

use graphdb::{Config, Db, Direction, Value};
use std::collections::{BTreeMap, HashSet};

fn open() -> (tempfile::TempDir, Db) {
    let dir = tempfile::tempdir().unwrap();
    let db = Db::open(&Config::new(dir.path())).unwrap();
    (dir, db)
}

fn person(db: &Db, name: &str, description: &str) {
    let mut props = BTreeMap::new();
    props.insert("name".to_string(), Value::String(name.to_string()));
    props.insert("description".to_string(), Value::String(description.to_string()));
    db.create_node(vec!["Person".into()], props).unwrap();
}

#[test]
fn s5_search_ranks_and_phrase_and_fuzzy_queries() {
    let (_dir, db) = open();
    person(&db, "Alice Johnson", "Software engineer");
    person(&db, "Bob Smith", "Data scientist");
    person(&db, "Charlie Brown", "Software architect");
    db.build_fts_index(&["Person".into()], &["name".into(), "description".into()]).unwrap();

    let hits = db.search("software").unwrap();
    let ids: HashSet<_> = hits.iter().map(|h| h.node_id).collect();
    assert_eq!(ids, HashSet::from([1, 3]));

    let (_dir2, docs) = open();
    for (label, body) in [
        ("Doc", "New York City is amazing"),
        ("Doc", "York is a city"),
        ("Doc", "I live in New York"),
    ] {
        let mut props = BTreeMap::new();
        props.insert("body".to_string(), Value::String(body.to_string()));
        docs.create_node(vec![label.into()], props).unwrap();
    }
    docs.build_fts_index(&["Doc".into()], &["body".into()]).unwrap();
    let phrase_ids: HashSet<_> = docs.search_phrase("New York").unwrap().into_iter().map(|h| h.node_id).collect();
    assert_eq!(phrase_ids, HashSet::from([1, 3]));

    let (_dir3, devices) = open();
    for body in ["Laptop Computer", "Desktop Computer"] {
        let mut props = BTreeMap::new();
        props.insert("body".to_string(), Value::String(body.to_string()));
        devices.create_node(vec!["Doc".into()], props).unwrap();
    }
    devices.build_fts_index(&["Doc".into()], &["body".into()]).unwrap();
    let fuzzy_ids: HashSet<_> = devices.search_fuzzy("compter", 2).unwrap().into_iter().map(|h| h.node_id).collect();
    assert_eq!(fuzzy_ids, HashSet::from([1, 2]));
}

/// Property 9: AND/OR/NOT boolean search matches set algebra over the
/// corresponding single-term searches.
#[test]
fn boolean_search_matches_set_algebra_over_single_term_searches() {
    let (_dir, db) = open();
    for body in ["alpha beta", "alpha", "beta"] {
        let mut props = BTreeMap::new();
        props.insert("body".to_string(), Value::String(body.to_string()));
        db.create_node(vec!["Doc".into()], props).unwrap();
    }
    db.build_fts_index(&["Doc".into()], &["body".into()]).unwrap();

    let a: HashSet<_> = db.search("alpha").unwrap().into_iter().map(|h| h.node_id).collect();
    let b: HashSet<_> = db.search("beta").unwrap().into_iter().map(|h| h.node_id).collect();

    let and_ids: HashSet<_> = db.search_boolean("alpha AND beta").unwrap().into_iter().map(|h| h.node_id).collect();
    assert_eq!(and_ids, &a & &b);

    let or_ids: HashSet<_> = db.search_boolean("alpha OR beta").unwrap().into_iter().map(|h| h.node_id).collect();
    assert_eq!(or_ids, &a | &b);

    let not_ids: HashSet<_> = db.search_boolean("alpha NOT beta").unwrap().into_iter().map(|h| h.node_id).collect();
    assert_eq!(not_ids, &a - &b);
}

/// Property 8: BFS visits each node at most once, respects direction and
/// edge-type filters, and the shortest path length never exceeds any
/// other BFS-discovered path length to the same node.
#[test]
fn bfs_respects_direction_and_edge_type_and_bounds_shortest_path() {
    let (_dir, db) = open();
    let a = db.create_node(vec!["Node".into()], BTreeMap::new()).unwrap();
    let b = db.create_node(vec!["Node".into()], BTreeMap::new()).unwrap();
    let c = db.create_node(vec!["Node".into()], BTreeMap::new()).unwrap();
    let d = db.create_node(vec!["Node".into()], BTreeMap::new()).unwrap();
    db.create_edge(a.id, b.id, "KNOWS", BTreeMap::new(), 1.0).unwrap();
    db.create_edge(b.id, c.id, "KNOWS", BTreeMap::new(), 1.0).unwrap();
    db.create_edge(a.id, d.id, "BLOCKS", BTreeMap::new(), 1.0).unwrap();

    let traverser = db.traverser();
    let knows_only = traverser.bfs(a.id, Direction::Out, &["KNOWS".to_string()], 10, 100).unwrap();
    assert!(!knows_only.nodes.contains(&d.id));
    assert!(knows_only.nodes.contains(&c.id));

    let unique: HashSet<_> = knows_only.nodes.iter().copied().collect();
    assert_eq!(unique.len(), knows_only.nodes.len());

    let path = traverser.shortest_path(a.id, c.id, &["KNOWS".to_string()], None).unwrap();
    assert_eq!(path.nodes.len() - 1, knows_only.hops[&c.id]);
}
