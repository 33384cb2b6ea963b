//! Storage engine: the WAL (with optional group-commit batching), point-in-time
//! snapshots, the edge-list codec, the adjacency/label/property index layer, and
//! two interchangeable backends — an in-memory engine and an LSM-tree engine —
//! both implementing `graphdb_api::GraphBackend`.

mod batcher;
mod binfmt;
pub mod codec;
mod config;
mod idalloc;
mod index;
mod lsm;
mod memory;
mod snapshot;
mod wal;

pub use codec::EdgeList;
pub use config::{Backend, Config};
pub use idalloc::IdAllocator;
pub use index::{AdjacencyIndex, LabelIndex, PropertyIndex};
pub use lsm::LsmEngine;
pub use memory::{Batch, BatchNodeRef, BatchResult, MemoryEngine};
pub use snapshot::SnapshotData;
pub use wal::{Wal, WalRecord};

use graphdb_api::{EdgeId, Error, NodeId, Result, Value};
use std::collections::BTreeMap;

/// Opens a backend selected by `config.backend`, both implementing the same
/// `graphdb_api::GraphBackend` read surface plus the §4.8 mutation methods.
pub enum Engine {
    Memory(MemoryEngine),
    Lsm(LsmEngine),
}

impl Engine {
    pub fn open(config: &Config) -> Result<Self> {
        match config.backend {
            Backend::Memory => Ok(Engine::Memory(MemoryEngine::open(config)?)),
            Backend::Lsm => Ok(Engine::Lsm(LsmEngine::open(config)?)),
        }
    }

    pub fn update_node(&self, id: NodeId, changes: BTreeMap<String, Option<Value>>) -> Result<graphdb_api::Node> {
        match self {
            Engine::Memory(e) => e.update_node(id, changes),
            Engine::Lsm(e) => e.update_node(id, changes),
        }
    }

    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        match self {
            Engine::Memory(e) => e.delete_node(id),
            Engine::Lsm(e) => e.delete_node(id),
        }
    }

    pub fn delete_edge(&self, id: EdgeId) -> Result<()> {
        match self {
            Engine::Memory(e) => e.delete_edge(id),
            Engine::Lsm(e) => e.delete_edge(id),
        }
    }

    pub fn create_property_index(&self, key: &str) -> Result<()> {
        match self {
            Engine::Memory(e) => e.create_property_index(key),
            Engine::Lsm(e) => e.create_property_index(key),
        }
    }

    /// Takes a point-in-time snapshot. Only the in-memory backend keeps a
    /// separate snapshot file; the LSM backend's durability comes from its
    /// own runs and memtable WAL instead (§9), so this is `Unsupported`
    /// there.
    pub fn snapshot(&self) -> Result<()> {
        match self {
            Engine::Memory(e) => e.snapshot(),
            Engine::Lsm(_) => Err(Error::unsupported("snapshot() is not defined for the LSM backend")),
        }
    }

    /// Begins an atomic multi-node/multi-edge batch. Only the in-memory
    /// backend exposes the staged-batch API; batching into the LSM memtable
    /// already happens record-by-record under its own write lock.
    pub fn begin_batch(&self) -> Result<Batch<'_>> {
        match self {
            Engine::Memory(e) => Ok(e.begin_batch()),
            Engine::Lsm(_) => Err(Error::unsupported("begin_batch() is not defined for the LSM backend")),
        }
    }

    pub fn close(&self) -> Result<()> {
        match self {
            Engine::Memory(e) => e.close(),
            Engine::Lsm(e) => e.close(),
        }
    }
}

impl graphdb_api::GraphBackend for Engine {
    fn get_node(&self, id: graphdb_api::NodeId) -> Result<graphdb_api::Node> {
        match self {
            Engine::Memory(e) => e.get_node(id),
            Engine::Lsm(e) => e.get_node(id),
        }
    }

    fn get_edge(&self, id: graphdb_api::EdgeId) -> Result<graphdb_api::Edge> {
        match self {
            Engine::Memory(e) => e.get_edge(id),
            Engine::Lsm(e) => e.get_edge(id),
        }
    }

    fn outgoing_edges(&self, node: graphdb_api::NodeId) -> Result<Vec<graphdb_api::Edge>> {
        match self {
            Engine::Memory(e) => e.outgoing_edges(node),
            Engine::Lsm(e) => e.outgoing_edges(node),
        }
    }

    fn incoming_edges(&self, node: graphdb_api::NodeId) -> Result<Vec<graphdb_api::Edge>> {
        match self {
            Engine::Memory(e) => e.incoming_edges(node),
            Engine::Lsm(e) => e.incoming_edges(node),
        }
    }

    fn find_nodes_by_label(&self, label: &str) -> Vec<graphdb_api::Node> {
        match self {
            Engine::Memory(e) => e.find_nodes_by_label(label),
            Engine::Lsm(e) => e.find_nodes_by_label(label),
        }
    }

    fn find_nodes_by_property(&self, key: &str, value: &graphdb_api::Value) -> Vec<graphdb_api::Node> {
        match self {
            Engine::Memory(e) => e.find_nodes_by_property(key, value),
            Engine::Lsm(e) => e.find_nodes_by_property(key, value),
        }
    }

    fn find_nodes_by_property_indexed(
        &self,
        key: &str,
        value: &graphdb_api::Value,
    ) -> Result<Vec<graphdb_api::Node>> {
        match self {
            Engine::Memory(e) => e.find_nodes_by_property_indexed(key, value),
            Engine::Lsm(e) => e.find_nodes_by_property_indexed(key, value),
        }
    }

    fn find_nodes_by_property_range(
        &self,
        key: &str,
        lo: &graphdb_api::Value,
        hi: &graphdb_api::Value,
    ) -> Result<Vec<graphdb_api::Node>> {
        match self {
            Engine::Memory(e) => e.find_nodes_by_property_range(key, lo, hi),
            Engine::Lsm(e) => e.find_nodes_by_property_range(key, lo, hi),
        }
    }

    fn find_nodes_by_property_prefix(&self, key: &str, prefix: &str) -> Result<Vec<graphdb_api::Node>> {
        match self {
            Engine::Memory(e) => e.find_nodes_by_property_prefix(key, prefix),
            Engine::Lsm(e) => e.find_nodes_by_property_prefix(key, prefix),
        }
    }

    fn statistics(&self) -> graphdb_api::Statistics {
        match self {
            Engine::Memory(e) => e.statistics(),
            Engine::Lsm(e) => e.statistics(),
        }
    }

    fn all_nodes(&self) -> Vec<graphdb_api::Node> {
        match self {
            Engine::Memory(e) => e.all_nodes(),
            Engine::Lsm(e) => e.all_nodes(),
        }
    }
}

impl graphdb_api::GraphWriter for Engine {
    fn create_node(
        &self,
        labels: Vec<String>,
        properties: std::collections::BTreeMap<String, graphdb_api::Value>,
    ) -> Result<graphdb_api::Node> {
        match self {
            Engine::Memory(e) => graphdb_api::GraphWriter::create_node(e, labels, properties),
            Engine::Lsm(e) => graphdb_api::GraphWriter::create_node(e, labels, properties),
        }
    }

    fn create_edge(
        &self,
        from_id: graphdb_api::NodeId,
        to_id: graphdb_api::NodeId,
        edge_type: String,
        properties: std::collections::BTreeMap<String, graphdb_api::Value>,
        weight: f64,
    ) -> Result<graphdb_api::Edge> {
        match self {
            Engine::Memory(e) => {
                graphdb_api::GraphWriter::create_edge(e, from_id, to_id, edge_type, properties, weight)
            }
            Engine::Lsm(e) => {
                graphdb_api::GraphWriter::create_edge(e, from_id, to_id, edge_type, properties, weight)
            }
        }
    }
}
