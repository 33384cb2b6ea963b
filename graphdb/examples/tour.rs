//! A short tour of the embeddable graph database: opening a store,
//! writing nodes and edges, running a pattern query, walking the graph,
//! and searching a full-text index.

use graphdb::{Config, Db};
use std::collections::BTreeMap;

fn main() -> graphdb::Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Db::open(&Config::new(dir.path()))?;

    let mut alice_props = BTreeMap::new();
    alice_props.insert("name".to_string(), "Alice Johnson".into());
    alice_props.insert("bio".to_string(), "Software engineer".into());
    let alice = db.create_node(vec!["Person".into()], alice_props)?;

    let mut bob_props = BTreeMap::new();
    bob_props.insert("name".to_string(), "Bob Smith".into());
    bob_props.insert("bio".to_string(), "Data scientist".into());
    let bob = db.create_node(vec!["Person".into()], bob_props)?;

    db.create_edge(alice.id, bob.id, "KNOWS", BTreeMap::new(), 1.0)?;

    println!("pattern query:");
    let result = db.query("MATCH (p:Person) WHERE p.name = 'Alice Johnson' RETURN p.name")?;
    for row in &result.rows {
        println!("  {row:?}");
    }

    println!("shortest path:");
    let path = db.traverser().shortest_path(alice.id, bob.id, &[], None)?;
    println!("  {:?}", path.nodes);

    db.build_fts_index(&["Person".into()], &["name".into(), "bio".into()])?;
    println!("full-text search for 'software':");
    for hit in db.search("software")? {
        println!("  node {} (score {:.3})", hit.node_id, hit.score);
    }

    db.close()?;
    Ok(())
}
