//! An embeddable labeled-property graph database: one handle (`Db`) in
//! front of the storage engine, the pattern-matching query engine, the
//! graph traverser, and the full-text index.
//!
//! ```ignore
//! use graphdb::{Config, Db};
//! use std::collections::BTreeMap;
//!
//! let db = Db::open(&Config::new("./data"))?;
//! let alice = db.create_node(vec!["Person".into()], BTreeMap::new())?;
//! let bob = db.create_node(vec!["Person".into()], BTreeMap::new())?;
//! db.create_edge(alice.id, bob.id, "KNOWS", BTreeMap::new(), 1.0)?;
//! let result = db.query("MATCH (p:Person) RETURN p")?;
//! ```

pub mod error;
pub mod traverser;

pub use error::{Error, Result};
pub use graphdb_api::{Direction, Edge, EdgeId, Node, NodeId, Statistics, Value};
pub use graphdb_fts::ScoredHit;
pub use graphdb_query::{ast::Query, QueryResult};
pub use graphdb_storage::{Backend, Batch, BatchResult, Config};
pub use traverser::{PathResult, Traverser, WalkResult};

use graphdb_api::{GraphBackend, GraphWriter};
use graphdb_fts::FtsIndex;
use graphdb_storage::Engine;
use std::collections::BTreeMap;

/// The database handle. Cheap to share behind an `Arc` across threads —
/// every method here takes `&self` and relies on the storage engine's own
/// locking (§5).
pub struct Db {
    engine: Engine,
    fts: FtsIndex,
}

impl Db {
    /// Opens (or creates) a database at `config.data_dir`, replaying the
    /// WAL and restoring the most recent snapshot if one exists.
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Db {
            engine: Engine::open(config)?,
            fts: FtsIndex::new(),
        })
    }

    pub fn create_node(&self, labels: Vec<String>, properties: BTreeMap<String, Value>) -> Result<Node> {
        let node = self.engine.create_node(labels, properties)?;
        self.fts.update_node(&self.engine, node.id)?;
        Ok(node)
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        Ok(self.engine.get_node(id)?)
    }

    /// Merges `changes` into the node's existing property map (`None`
    /// values remove the key); the label set is untouched.
    pub fn update_node(&self, id: NodeId, changes: BTreeMap<String, Option<Value>>) -> Result<Node> {
        let node = self.engine.update_node(id, changes)?;
        self.fts.update_node(&self.engine, id)?;
        Ok(node)
    }

    /// Removes the node along with every incident edge, atomically with
    /// respect to readers and the WAL.
    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        self.engine.delete_node(id)?;
        self.fts.update_node(&self.engine, id)?;
        Ok(())
    }

    pub fn create_edge(
        &self,
        from_id: NodeId,
        to_id: NodeId,
        edge_type: impl Into<String>,
        properties: BTreeMap<String, Value>,
        weight: f64,
    ) -> Result<Edge> {
        Ok(self.engine.create_edge(from_id, to_id, edge_type.into(), properties, weight)?)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        Ok(self.engine.get_edge(id)?)
    }

    pub fn delete_edge(&self, id: EdgeId) -> Result<()> {
        Ok(self.engine.delete_edge(id)?)
    }

    pub fn outgoing_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        Ok(self.engine.outgoing_edges(node)?)
    }

    pub fn incoming_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        Ok(self.engine.incoming_edges(node)?)
    }

    pub fn find_nodes_by_label(&self, label: &str) -> Vec<Node> {
        self.engine.find_nodes_by_label(label)
    }

    /// Full scan unless an index exists to back the lookup; use
    /// [`Db::find_nodes_by_property_indexed`] to require the index.
    pub fn find_nodes_by_property(&self, key: &str, value: &Value) -> Vec<Node> {
        self.engine.find_nodes_by_property(key, value)
    }

    pub fn find_nodes_by_property_indexed(&self, key: &str, value: &Value) -> Result<Vec<Node>> {
        Ok(self.engine.find_nodes_by_property_indexed(key, value)?)
    }

    pub fn find_nodes_by_property_range(&self, key: &str, lo: &Value, hi: &Value) -> Result<Vec<Node>> {
        Ok(self.engine.find_nodes_by_property_range(key, lo, hi)?)
    }

    pub fn find_nodes_by_property_prefix(&self, key: &str, prefix: &str) -> Result<Vec<Node>> {
        Ok(self.engine.find_nodes_by_property_prefix(key, prefix)?)
    }

    pub fn create_property_index(&self, key: &str) -> Result<()> {
        Ok(self.engine.create_property_index(key)?)
    }

    /// Takes a point-in-time snapshot. `Unsupported` on the LSM backend,
    /// whose durability comes from its own runs and memtable WAL instead.
    pub fn snapshot(&self) -> Result<()> {
        Ok(self.engine.snapshot()?)
    }

    /// Begins an atomic multi-node/multi-edge batch. `Unsupported` on the
    /// LSM backend.
    pub fn begin_batch(&self) -> Result<Batch<'_>> {
        Ok(self.engine.begin_batch()?)
    }

    pub fn statistics(&self) -> Statistics {
        self.engine.statistics()
    }

    /// Flushes the WAL and waits for the batcher and any background
    /// compaction to drain.
    pub fn close(&self) -> Result<()> {
        Ok(self.engine.close()?)
    }

    /// Parses and runs one §4.11 pattern query end to end.
    pub fn query(&self, text: &str) -> Result<QueryResult> {
        Ok(graphdb_query::run(text, &self.engine, &self.engine)?)
    }

    /// Parses a query into its AST without running it.
    pub fn parse_query(&self, text: &str) -> Result<Query> {
        Ok(graphdb_query::parse(text)?)
    }

    /// A traverser bound to this database's current state, for
    /// BFS/DFS/shortest-path/PageRank/betweenness queries (§4.10).
    pub fn traverser(&self) -> Traverser<'_> {
        Traverser::new(&self.engine)
    }

    /// (Re)builds the full-text index over every node carrying any of
    /// `labels`, indexing the string-typed `property_keys`. Once built,
    /// `create_node`/`update_node`/`delete_node` keep it current.
    pub fn build_fts_index(&self, labels: &[String], property_keys: &[String]) -> Result<()> {
        Ok(self.fts.build_index(&self.engine, labels, property_keys)?)
    }

    pub fn search(&self, q: &str) -> Result<Vec<ScoredHit>> {
        Ok(self.fts.search(q)?)
    }

    pub fn search_phrase(&self, q: &str) -> Result<Vec<ScoredHit>> {
        Ok(self.fts.search_phrase(q)?)
    }

    pub fn search_boolean(&self, q: &str) -> Result<Vec<ScoredHit>> {
        Ok(self.fts.search_boolean(q)?)
    }

    pub fn search_fuzzy(&self, q: &str, max_edit: usize) -> Result<Vec<ScoredHit>> {
        Ok(self.fts.search_fuzzy(q, max_edit)?)
    }

    pub fn search_in_property(&self, key: &str, q: &str) -> Result<Vec<ScoredHit>> {
        Ok(self.fts.search_in_property(&self.engine, key, q)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&Config::new(dir.path())).unwrap();
        (dir, db)
    }

    #[test]
    fn s1_shortest_path_over_a_knows_chain() {
        let (_dir, db) = open_db();
        let mut props = BTreeMap::new();
        props.insert("id".to_string(), Value::String("u1".into()));
        let a = db.create_node(vec!["User".into()], props).unwrap();
        let mut props = BTreeMap::new();
        props.insert("id".to_string(), Value::String("u2".into()));
        let b = db.create_node(vec!["User".into()], props).unwrap();
        let mut props = BTreeMap::new();
        props.insert("id".to_string(), Value::String("u3".into()));
        let c = db.create_node(vec!["User".into()], props).unwrap();

        db.create_edge(a.id, b.id, "KNOWS", BTreeMap::new(), 1.0).unwrap();
        db.create_edge(b.id, c.id, "KNOWS", BTreeMap::new(), 1.0).unwrap();

        let path = db.traverser().shortest_path(a.id, c.id, &[], None).unwrap();
        assert_eq!(path.nodes, vec![a.id, b.id, c.id]);

        let stats = db.statistics();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 2);
    }

    #[test]
    fn s2_delete_node_removes_incident_edges() {
        let (_dir, db) = open_db();
        let a = db.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
        let b = db.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
        let c = db.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
        db.create_edge(a.id, b.id, "KNOWS", BTreeMap::new(), 1.0).unwrap();
        db.create_edge(b.id, c.id, "KNOWS", BTreeMap::new(), 1.0).unwrap();

        db.delete_node(b.id).unwrap();

        assert!(matches!(db.get_node(b.id), Err(Error::Backend(graphdb_api::Error::NotFound { .. }))));
        assert!(db.outgoing_edges(a.id).unwrap().is_empty());
        assert!(db.incoming_edges(c.id).unwrap().is_empty());
        let stats = db.statistics();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 0);
    }

    #[test]
    fn runs_a_match_query_end_to_end() {
        let (_dir, db) = open_db();
        let mut props = BTreeMap::new();
        props.insert("name".to_string(), Value::String("Alice".into()));
        db.create_node(vec!["Person".into()], props).unwrap();

        let result = db.query("MATCH (p:Person) RETURN p.name").unwrap();
        assert_eq!(result.rows, vec![vec![Value::String("Alice".into())]]);
    }

    #[test]
    fn full_text_search_tracks_node_updates() {
        let (_dir, db) = open_db();
        let mut props = BTreeMap::new();
        props.insert("bio".to_string(), Value::String("software engineer".into()));
        let node = db.create_node(vec!["Person".into()], props).unwrap();
        db.build_fts_index(&["Person".into()], &["bio".into()]).unwrap();
        assert_eq!(db.search("software").unwrap().len(), 1);

        let mut changes = BTreeMap::new();
        changes.insert("bio".to_string(), Some(Value::String("data scientist".into())));
        db.update_node(node.id, changes).unwrap();

        assert!(db.search("software").unwrap().is_empty());
        assert_eq!(db.search("scientist").unwrap().len(), 1);
    }

    #[test]
    fn snapshot_then_reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&Config::new(dir.path())).unwrap();
        db.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
        db.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
        db.snapshot().unwrap();
        db.close().unwrap();

        let reopened = Db::open(&Config::new(dir.path())).unwrap();
        assert_eq!(reopened.statistics().node_count, 2);
    }
}
