use crate::error::Result;
use crate::model::{Edge, EdgeId, Node, NodeId};
use crate::value::Value;
use std::collections::BTreeMap;

/// Direction of traversal or edge lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Statistics {
    pub node_count: u64,
    pub edge_count: u64,
}

/// The read surface both storage backends (in-memory and LSM)
/// expose identically, so the query engine and traverser can run over
/// either one without caring which is underneath (mirrors the teacher's
/// `GraphStore`/`GraphSnapshot` split in `nervusdb-v2-api`).
pub trait GraphBackend {
    fn get_node(&self, id: NodeId) -> Result<Node>;
    fn get_edge(&self, id: EdgeId) -> Result<Edge>;

    fn outgoing_edges(&self, node: NodeId) -> Result<Vec<Edge>>;
    fn incoming_edges(&self, node: NodeId) -> Result<Vec<Edge>>;

    fn find_nodes_by_label(&self, label: &str) -> Vec<Node>;
    fn find_nodes_by_property(&self, key: &str, value: &Value) -> Vec<Node>;
    fn find_nodes_by_property_indexed(&self, key: &str, value: &Value) -> Result<Vec<Node>>;
    fn find_nodes_by_property_range(&self, key: &str, lo: &Value, hi: &Value) -> Result<Vec<Node>>;
    fn find_nodes_by_property_prefix(&self, key: &str, prefix: &str) -> Result<Vec<Node>>;

    fn statistics(&self) -> Statistics;

    fn all_nodes(&self) -> Vec<Node>;
}

/// The mutation surface a query engine's `CREATE` clause needs, kept
/// separate from [`GraphBackend`] since read-only callers (the traverser,
/// the full-text indexer) never need it.
pub trait GraphWriter {
    fn create_node(&self, labels: Vec<String>, properties: BTreeMap<String, Value>) -> Result<Node>;

    fn create_edge(
        &self,
        from_id: NodeId,
        to_id: NodeId,
        edge_type: String,
        properties: BTreeMap<String, Value>,
        weight: f64,
    ) -> Result<Edge>;
}
