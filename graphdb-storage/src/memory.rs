//! The in-memory graph engine: one reader-writer lock over nodes, edges,
//! adjacency, and the label/property indexes. ID allocation is atomic and
//! lives outside that lock; the WAL (or batcher, if enabled) is appended to
//! while the write lock is held, so a reader acquiring the lock afterward
//! never observes an un-logged mutation, and a concurrent snapshot can never
//! see a WAL sequence number ahead of the state it captures.

use crate::batcher::Batcher;
use crate::config::Config;
use crate::idalloc::IdAllocator;
use crate::index::{AdjacencyIndex, LabelIndex, PropertyIndex};
use crate::snapshot::{self, SnapshotData};
use crate::wal::{Wal, WalRecord};
use graphdb_api::{Edge, EdgeId, Error, GraphBackend, Node, NodeId, Result, Statistics, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

struct PrimaryState {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    adjacency: AdjacencyIndex,
    labels: LabelIndex,
    property_indexes: HashMap<String, PropertyIndex>,
}

impl PrimaryState {
    fn new(compress_adjacency: bool, hot_cache_size: usize) -> Self {
        PrimaryState {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            adjacency: AdjacencyIndex::new(compress_adjacency, hot_cache_size),
            labels: LabelIndex::default(),
            property_indexes: HashMap::new(),
        }
    }

    fn index_node_properties(&mut self, node: &Node) {
        for (key, value) in &node.properties {
            if let Some(index) = self.property_indexes.get_mut(key) {
                index.insert(value, node.id);
            }
        }
    }

    fn unindex_node_properties(&mut self, node: &Node) {
        for (key, value) in &node.properties {
            if let Some(index) = self.property_indexes.get_mut(key) {
                index.remove(value, node.id);
            }
        }
    }

    fn insert_node(&mut self, node: Node) {
        self.index_node_properties(&node);
        for label in node.labels() {
            self.labels.add(label, node.id);
        }
        self.nodes.insert(node.id, node);
    }

    fn apply_update_node(&mut self, id: NodeId, changes: &BTreeMap<String, Option<Value>>, now: i64) {
        let Some(node) = self.nodes.get(&id) else { return };
        let touched_keys: Vec<&str> = changes.keys().map(|s| s.as_str()).collect();
        let old_values: Vec<(String, Value)> = touched_keys
            .iter()
            .filter_map(|k| node.properties.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect();
        for (key, old_value) in &old_values {
            if let Some(index) = self.property_indexes.get_mut(key) {
                index.remove(old_value, id);
            }
        }

        let node = self.nodes.get_mut(&id).expect("checked above");
        node.merge_properties(changes, now);
        let node = node.clone();
        for key in touched_keys {
            if let (Some(value), Some(index)) =
                (node.properties.get(key), self.property_indexes.get_mut(key))
            {
                index.insert(value, id);
            }
        }
    }

    /// Removes `id` and every edge incident to it, cascading index cleanup.
    /// Used both on the live delete path and during WAL/batch replay, so
    /// the cascade is always derived from current adjacency rather than
    /// logged edge-by-edge.
    fn apply_delete_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else { return };
        self.unindex_node_properties(&node);
        self.labels.remove_node(node.labels(), id);

        let outgoing = self.adjacency.outgoing(id);
        let incoming = self.adjacency.incoming(id);
        for edge_id in outgoing.into_iter().chain(incoming.into_iter()) {
            if let Some(edge) = self.edges.remove(&edge_id) {
                self.adjacency.remove_outgoing(edge.from_id, edge_id);
                self.adjacency.remove_incoming(edge.to_id, edge_id);
            }
        }
        self.adjacency.drop_node(id);
    }

    fn insert_edge(&mut self, edge: Edge) {
        self.adjacency.add_outgoing(edge.from_id, edge.id);
        self.adjacency.add_incoming(edge.to_id, edge.id);
        self.edges.insert(edge.id, edge);
    }

    fn apply_delete_edge(&mut self, id: EdgeId) {
        if let Some(edge) = self.edges.remove(&id) {
            self.adjacency.remove_outgoing(edge.from_id, id);
            self.adjacency.remove_incoming(edge.to_id, id);
        }
    }
}

enum WalHandle {
    Direct(Mutex<Wal>),
    Batched(Batcher),
    /// `bulk_import_mode`: every mutation skips the WAL outright. Durability
    /// comes solely from a snapshot taken before `close()`.
    Disabled,
}

impl WalHandle {
    fn append(&self, record: WalRecord) -> Result<u64> {
        match self {
            WalHandle::Direct(wal) => {
                let mut wal = wal.lock().unwrap();
                let seq = wal.append(&record)?;
                wal.fsync()?;
                Ok(seq)
            }
            WalHandle::Batched(batcher) => batcher.append(record),
            WalHandle::Disabled => Ok(0),
        }
    }

    fn fsync(&self) -> Result<()> {
        match self {
            WalHandle::Direct(wal) => wal.lock().unwrap().fsync(),
            WalHandle::Batched(_) | WalHandle::Disabled => Ok(()),
        }
    }

    fn close(&self) -> Result<()> {
        if let WalHandle::Batched(batcher) = self {
            batcher.close()?;
        }
        Ok(())
    }
}

pub struct MemoryEngine {
    state: RwLock<PrimaryState>,
    node_alloc: IdAllocator,
    edge_alloc: IdAllocator,
    next_batch_id: AtomicU64,
    wal: WalHandle,
    bulk_import: bool,
    last_wal_sequence: AtomicU64,
    snapshot_path: PathBuf,
    data_dir: PathBuf,
}

impl MemoryEngine {
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let wal_path = config.data_dir.join("wal.log");
        let snapshot_path = config.data_dir.join("snapshot.bin");

        let mut state = PrimaryState::new(config.enable_edge_compression, config.edge_cache_size);
        let node_alloc = IdAllocator::default();
        let edge_alloc = IdAllocator::default();

        let mut snapshot_sequence = 0u64;
        if snapshot_path.exists() {
            let data = snapshot::read(&snapshot_path)?;
            snapshot_sequence = data.wal_sequence;
            node_alloc.observe(data.node_id_high_water);
            edge_alloc.observe(data.edge_id_high_water);
            for key in &data.indexed_keys {
                state.property_indexes.insert(key.clone(), PropertyIndex::default());
            }
            for node in data.nodes {
                node_alloc.observe(node.id);
                state.insert_node(node);
            }
            for edge in data.edges {
                edge_alloc.observe(edge.id);
                state.insert_edge(edge);
            }
        }

        let wal = if config.bulk_import_mode {
            // Skip opening wal.log entirely: bulk_import_mode relies on the
            // snapshot taken at close() for durability, not on replay.
            WalHandle::Disabled
        } else {
            let mut wal = Wal::open(&wal_path)?;
            let records = wal.replay()?;
            replay_into(&mut state, &node_alloc, &edge_alloc, records, snapshot_sequence);
            if config.enable_batching {
                WalHandle::Batched(Batcher::spawn(wal, config.batch_size, config.flush_interval))
            } else {
                WalHandle::Direct(Mutex::new(wal))
            }
        };

        Ok(MemoryEngine {
            state: RwLock::new(state),
            node_alloc,
            edge_alloc,
            next_batch_id: AtomicU64::new(1),
            wal,
            bulk_import: config.bulk_import_mode,
            last_wal_sequence: AtomicU64::new(snapshot_sequence),
            snapshot_path,
            data_dir: config.data_dir.clone(),
        })
    }

    /// Appends through the WAL handle and remembers the sequence it was
    /// assigned, so a later `snapshot()` knows exactly how far it reaches.
    fn wal_append(&self, record: WalRecord) -> Result<u64> {
        let sequence = self.wal.append(record)?;
        self.last_wal_sequence.fetch_max(sequence, Ordering::SeqCst);
        Ok(sequence)
    }

    pub fn create_node(&self, labels: Vec<String>, properties: BTreeMap<String, Value>) -> Result<Node> {
        if labels.iter().any(|l| l.is_empty()) {
            return Err(Error::invalid_argument("labels must be non-empty strings"));
        }
        let id = self.node_alloc.next();
        let now = now_nanos();
        let node = Node::new(id, labels, properties, now);

        // WAL append happens under the write lock, so a concurrent
        // `snapshot()` (which takes the same lock) can never observe a
        // `last_wal_sequence` that runs ahead of what's actually in state.
        let mut state = self.state.write().unwrap();
        self.wal_append(WalRecord::CreateNode {
            id,
            labels: node.labels().to_vec(),
            properties: node.properties.clone(),
            created_at: now,
        })?;
        state.insert_node(node.clone());
        Ok(node)
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        self.state
            .read()
            .unwrap()
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("node", id))
    }

    pub fn update_node(&self, id: NodeId, changes: BTreeMap<String, Option<Value>>) -> Result<Node> {
        let now = now_nanos();
        let mut state = self.state.write().unwrap();
        if !state.nodes.contains_key(&id) {
            return Err(Error::not_found("node", id));
        }
        self.wal_append(WalRecord::UpdateNode {
            id,
            changes: changes.clone(),
            updated_at: now,
        })?;
        state.apply_update_node(id, &changes, now);
        Ok(state.nodes.get(&id).cloned().expect("checked above"))
    }

    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if !state.nodes.contains_key(&id) {
            return Err(Error::not_found("node", id));
        }
        self.wal_append(WalRecord::DeleteNode { id })?;
        state.apply_delete_node(id);
        Ok(())
    }

    pub fn create_edge(
        &self,
        from_id: NodeId,
        to_id: NodeId,
        edge_type: String,
        properties: BTreeMap<String, Value>,
        weight: f64,
    ) -> Result<Edge> {
        if edge_type.is_empty() {
            return Err(Error::invalid_argument("edge type must be non-empty"));
        }

        let id = self.edge_alloc.next();
        let now = now_nanos();
        let edge = Edge {
            id,
            from_id,
            to_id,
            edge_type,
            properties,
            weight,
            created_at: now,
        };

        let mut state = self.state.write().unwrap();
        if !state.nodes.contains_key(&from_id) {
            return Err(Error::not_found("node", from_id));
        }
        if !state.nodes.contains_key(&to_id) {
            return Err(Error::not_found("node", to_id));
        }
        self.wal_append(WalRecord::CreateEdge {
            id,
            from_id,
            to_id,
            edge_type: edge.edge_type.clone(),
            properties: edge.properties.clone(),
            weight,
            created_at: now,
        })?;
        state.insert_edge(edge.clone());
        Ok(edge)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        self.state
            .read()
            .unwrap()
            .edges
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("edge", id))
    }

    pub fn delete_edge(&self, id: EdgeId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if !state.edges.contains_key(&id) {
            return Err(Error::not_found("edge", id));
        }
        self.wal_append(WalRecord::DeleteEdge { id })?;
        state.apply_delete_edge(id);
        Ok(())
    }

    pub fn outgoing_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        let mut state = self.state.write().unwrap();
        if !state.nodes.contains_key(&node) {
            return Err(Error::not_found("node", node));
        }
        let ids = state.adjacency.outgoing(node);
        Ok(ids.into_iter().filter_map(|id| state.edges.get(&id).cloned()).collect())
    }

    pub fn incoming_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        let state = self.state.read().unwrap();
        if !state.nodes.contains_key(&node) {
            return Err(Error::not_found("node", node));
        }
        let ids = state.adjacency.incoming(node);
        Ok(ids.into_iter().filter_map(|id| state.edges.get(&id).cloned()).collect())
    }

    pub fn find_nodes_by_label(&self, label: &str) -> Vec<Node> {
        let state = self.state.read().unwrap();
        state
            .labels
            .nodes_with_label(label)
            .into_iter()
            .filter_map(|id| state.nodes.get(&id).cloned())
            .collect()
    }

    pub fn find_nodes_by_property(&self, key: &str, value: &Value) -> Vec<Node> {
        let state = self.state.read().unwrap();
        state
            .nodes
            .values()
            .filter(|n| n.properties.get(key) == Some(value))
            .cloned()
            .collect()
    }

    pub fn find_nodes_by_property_indexed(&self, key: &str, value: &Value) -> Result<Vec<Node>> {
        let state = self.state.read().unwrap();
        let index = state
            .property_indexes
            .get(key)
            .ok_or_else(|| Error::no_such_index(key))?;
        Ok(index
            .point(value)
            .into_iter()
            .filter_map(|id| state.nodes.get(&id).cloned())
            .collect())
    }

    pub fn find_nodes_by_property_range(&self, key: &str, lo: &Value, hi: &Value) -> Result<Vec<Node>> {
        let state = self.state.read().unwrap();
        let index = state
            .property_indexes
            .get(key)
            .ok_or_else(|| Error::no_such_index(key))?;
        let ids = index.range(lo, hi)?;
        Ok(ids.into_iter().filter_map(|id| state.nodes.get(&id).cloned()).collect())
    }

    pub fn find_nodes_by_property_prefix(&self, key: &str, prefix: &str) -> Result<Vec<Node>> {
        let state = self.state.read().unwrap();
        let index = state
            .property_indexes
            .get(key)
            .ok_or_else(|| Error::no_such_index(key))?;
        Ok(index
            .prefix(prefix)
            .into_iter()
            .filter_map(|id| state.nodes.get(&id).cloned())
            .collect())
    }

    pub fn create_property_index(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        self.wal_append(WalRecord::CreatePropertyIndex { key: key.to_string() })?;
        let mut index = PropertyIndex::default();
        for node in state.nodes.values() {
            if let Some(value) = node.properties.get(key) {
                index.insert(value, node.id);
            }
        }
        state.property_indexes.insert(key.to_string(), index);
        Ok(())
    }

    pub fn statistics(&self) -> Statistics {
        let state = self.state.read().unwrap();
        Statistics {
            node_count: state.nodes.len() as u64,
            edge_count: state.edges.len() as u64,
        }
    }

    /// Writes a consistent point-in-time snapshot. Takes the *write* lock,
    /// not a read lock: every mutating method appends to the WAL while
    /// holding that same write lock, so holding it here guarantees
    /// `last_wal_sequence` can't be bumped by a record that isn't also
    /// already reflected in the `nodes`/`edges` captured below.
    pub fn snapshot(&self) -> Result<()> {
        let state = self.state.write().unwrap();
        let data = SnapshotData {
            node_id_high_water: self.node_alloc.current(),
            edge_id_high_water: self.edge_alloc.current(),
            wal_sequence: self.last_wal_sequence.load(Ordering::SeqCst),
            nodes: state.nodes.values().cloned().collect(),
            edges: state.edges.values().cloned().collect(),
            indexed_keys: state.property_indexes.keys().cloned().collect(),
        };
        drop(state);
        snapshot::write(&self.snapshot_path, &data)
    }

    pub fn begin_batch(&self) -> Batch<'_> {
        Batch {
            engine: self,
            staged_nodes: Vec::new(),
            staged_edges: Vec::new(),
        }
    }

    pub fn close(&self) -> Result<()> {
        if self.bulk_import {
            self.snapshot()?;
        }
        self.wal.fsync()?;
        self.wal.close()
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }
}

impl GraphBackend for MemoryEngine {
    fn get_node(&self, id: NodeId) -> Result<Node> {
        MemoryEngine::get_node(self, id)
    }

    fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        MemoryEngine::get_edge(self, id)
    }

    fn outgoing_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        MemoryEngine::outgoing_edges(self, node)
    }

    fn incoming_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        MemoryEngine::incoming_edges(self, node)
    }

    fn find_nodes_by_label(&self, label: &str) -> Vec<Node> {
        MemoryEngine::find_nodes_by_label(self, label)
    }

    fn find_nodes_by_property(&self, key: &str, value: &Value) -> Vec<Node> {
        MemoryEngine::find_nodes_by_property(self, key, value)
    }

    fn find_nodes_by_property_indexed(&self, key: &str, value: &Value) -> Result<Vec<Node>> {
        MemoryEngine::find_nodes_by_property_indexed(self, key, value)
    }

    fn find_nodes_by_property_range(&self, key: &str, lo: &Value, hi: &Value) -> Result<Vec<Node>> {
        MemoryEngine::find_nodes_by_property_range(self, key, lo, hi)
    }

    fn find_nodes_by_property_prefix(&self, key: &str, prefix: &str) -> Result<Vec<Node>> {
        MemoryEngine::find_nodes_by_property_prefix(self, key, prefix)
    }

    fn statistics(&self) -> Statistics {
        MemoryEngine::statistics(self)
    }

    fn all_nodes(&self) -> Vec<Node> {
        self.state.read().unwrap().nodes.values().cloned().collect()
    }
}

impl graphdb_api::GraphWriter for MemoryEngine {
    fn create_node(&self, labels: Vec<String>, properties: BTreeMap<String, Value>) -> Result<Node> {
        MemoryEngine::create_node(self, labels, properties)
    }

    fn create_edge(
        &self,
        from_id: NodeId,
        to_id: NodeId,
        edge_type: String,
        properties: BTreeMap<String, Value>,
        weight: f64,
    ) -> Result<Edge> {
        MemoryEngine::create_edge(self, from_id, to_id, edge_type, properties, weight)
    }
}

/// Resolves a node reference staged in a [`Batch`]: either an id that
/// already exists in the store, or one of this batch's own staged nodes.
#[derive(Debug, Clone, Copy)]
pub enum BatchNodeRef {
    Existing(NodeId),
    Staged(usize),
}

struct StagedNode {
    labels: Vec<String>,
    properties: BTreeMap<String, Value>,
}

struct StagedEdge {
    from: BatchNodeRef,
    to: BatchNodeRef,
    edge_type: String,
    properties: BTreeMap<String, Value>,
    weight: f64,
}

pub struct BatchResult {
    pub node_ids: Vec<NodeId>,
    pub edge_ids: Vec<EdgeId>,
}

/// A staged set of `AddNode`/`AddEdge` calls. Nothing is
/// visible to readers, logged to the WAL, or even validated until
/// [`Batch::commit`] runs — `Abort` is simply dropping the handle.
pub struct Batch<'a> {
    engine: &'a MemoryEngine,
    staged_nodes: Vec<StagedNode>,
    staged_edges: Vec<StagedEdge>,
}

impl<'a> Batch<'a> {
    pub fn add_node(&mut self, labels: Vec<String>, properties: BTreeMap<String, Value>) -> BatchNodeRef {
        self.staged_nodes.push(StagedNode { labels, properties });
        BatchNodeRef::Staged(self.staged_nodes.len() - 1)
    }

    pub fn add_edge(
        &mut self,
        from: BatchNodeRef,
        to: BatchNodeRef,
        edge_type: impl Into<String>,
        properties: BTreeMap<String, Value>,
        weight: f64,
    ) {
        self.staged_edges.push(StagedEdge {
            from,
            to,
            edge_type: edge_type.into(),
            properties,
            weight,
        });
    }

    pub fn abort(self) {}

    pub fn commit(self) -> Result<BatchResult> {
        let now = now_nanos();
        let mut state = self.engine.state.write().unwrap();

        for edge in &self.staged_edges {
            for endpoint in [edge.from, edge.to] {
                if let BatchNodeRef::Existing(id) = endpoint {
                    if !state.nodes.contains_key(&id) {
                        return Err(Error::not_found("node", id));
                    }
                }
            }
            if edge.edge_type.is_empty() {
                return Err(Error::invalid_argument("edge type must be non-empty"));
            }
        }

        let node_ids: Vec<NodeId> = self
            .staged_nodes
            .iter()
            .map(|_| self.engine.node_alloc.next())
            .collect();
        let edge_ids: Vec<EdgeId> = self
            .staged_edges
            .iter()
            .map(|_| self.engine.edge_alloc.next())
            .collect();

        let resolve = |r: BatchNodeRef| -> NodeId {
            match r {
                BatchNodeRef::Existing(id) => id,
                BatchNodeRef::Staged(idx) => node_ids[idx],
            }
        };

        let batch_id = self.engine.next_batch_id.fetch_add(1, Ordering::SeqCst);
        self.engine.wal_append(WalRecord::BatchBegin { batch_id })?;

        for (i, staged) in self.staged_nodes.iter().enumerate() {
            self.engine.wal_append(WalRecord::CreateNode {
                id: node_ids[i],
                labels: staged.labels.clone(),
                properties: staged.properties.clone(),
                created_at: now,
            })?;
        }
        for (i, staged) in self.staged_edges.iter().enumerate() {
            self.engine.wal_append(WalRecord::CreateEdge {
                id: edge_ids[i],
                from_id: resolve(staged.from),
                to_id: resolve(staged.to),
                edge_type: staged.edge_type.clone(),
                properties: staged.properties.clone(),
                weight: staged.weight,
                created_at: now,
            })?;
        }
        self.engine.wal_append(WalRecord::BatchCommit { batch_id })?;

        for (i, staged) in self.staged_nodes.into_iter().enumerate() {
            let node = Node::new(node_ids[i], staged.labels, staged.properties, now);
            state.insert_node(node);
        }
        for (i, staged) in self.staged_edges.into_iter().enumerate() {
            let edge = Edge {
                id: edge_ids[i],
                from_id: resolve(staged.from),
                to_id: resolve(staged.to),
                edge_type: staged.edge_type,
                properties: staged.properties,
                weight: staged.weight,
                created_at: now,
            };
            state.insert_edge(edge);
        }

        Ok(BatchResult { node_ids, edge_ids })
    }
}

/// Replays WAL records onto freshly-restored state. Tracks batch brackets
/// so a `BatchBegin` without a matching `BatchCommit` (a crash mid-batch)
/// is discarded rather than partially applied.
fn replay_into(
    state: &mut PrimaryState,
    node_alloc: &IdAllocator,
    edge_alloc: &IdAllocator,
    records: Vec<(u64, WalRecord)>,
    snapshot_sequence: u64,
) {
    let mut pending_batch: Option<Vec<WalRecord>> = None;

    for (sequence, record) in records {
        if sequence <= snapshot_sequence {
            continue;
        }
        match record {
            WalRecord::BatchBegin { .. } => pending_batch = Some(Vec::new()),
            WalRecord::BatchCommit { .. } => {
                if let Some(ops) = pending_batch.take() {
                    for op in ops {
                        apply_record(state, node_alloc, edge_alloc, op);
                    }
                }
            }
            other => {
                if let Some(ops) = pending_batch.as_mut() {
                    ops.push(other);
                } else {
                    apply_record(state, node_alloc, edge_alloc, other);
                }
            }
        }
    }
    // Any still-open batch (no matching BatchCommit) is discarded by simply
    // dropping `pending_batch` here.
}

fn apply_record(state: &mut PrimaryState, node_alloc: &IdAllocator, edge_alloc: &IdAllocator, record: WalRecord) {
    match record {
        WalRecord::CreateNode {
            id,
            labels,
            properties,
            created_at,
        } => {
            node_alloc.observe(id);
            state.insert_node(Node::from_parts(id, labels, properties, created_at, created_at));
        }
        WalRecord::UpdateNode { id, changes, updated_at } => {
            state.apply_update_node(id, &changes, updated_at);
        }
        WalRecord::DeleteNode { id } => state.apply_delete_node(id),
        WalRecord::CreateEdge {
            id,
            from_id,
            to_id,
            edge_type,
            properties,
            weight,
            created_at,
        } => {
            edge_alloc.observe(id);
            state.insert_edge(Edge {
                id,
                from_id,
                to_id,
                edge_type,
                properties,
                weight,
                created_at,
            });
        }
        WalRecord::DeleteEdge { id } => state.apply_delete_edge(id),
        WalRecord::CreatePropertyIndex { key } => {
            let mut index = PropertyIndex::default();
            for node in state.nodes.values() {
                if let Some(value) = node.properties.get(&key) {
                    index.insert(value, node.id);
                }
            }
            state.property_indexes.insert(key, index);
        }
        WalRecord::BatchBegin { .. } | WalRecord::BatchCommit { .. } => {
            unreachable!("batch markers are consumed by replay_into")
        }
        WalRecord::Checkpoint { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &std::path::Path) -> MemoryEngine {
        MemoryEngine::open(&Config::new(dir)).unwrap()
    }

    #[test]
    fn create_get_delete_node() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let node = engine.create_node(vec!["Person".into()], BTreeMap::new()).unwrap();
        assert_eq!(engine.get_node(node.id).unwrap().id, node.id);
        engine.delete_node(node.id).unwrap();
        assert!(matches!(engine.get_node(node.id).unwrap_err(), Error::NotFound { .. }));
    }

    #[test]
    fn delete_node_cascades_edges() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let a = engine.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
        let b = engine.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
        let c = engine.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
        engine
            .create_edge(a.id, b.id, "KNOWS".into(), BTreeMap::new(), 1.0)
            .unwrap();
        engine
            .create_edge(b.id, c.id, "KNOWS".into(), BTreeMap::new(), 1.0)
            .unwrap();

        engine.delete_node(b.id).unwrap();

        assert!(engine.get_node(b.id).is_err());
        assert!(engine.outgoing_edges(a.id).unwrap().is_empty());
        assert!(engine.incoming_edges(c.id).unwrap().is_empty());
        let stats = engine.statistics();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 0);
    }

    #[test]
    fn update_node_merges_and_null_removes() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let mut props = BTreeMap::new();
        props.insert("age".to_string(), Value::Int(30));
        props.insert("city".to_string(), Value::String("NYC".into()));
        let node = engine.create_node(vec!["User".into()], props).unwrap();

        let mut changes = BTreeMap::new();
        changes.insert("age".to_string(), Some(Value::Int(31)));
        changes.insert("city".to_string(), None);
        let updated = engine.update_node(node.id, changes).unwrap();

        assert_eq!(updated.properties.get("age"), Some(&Value::Int(31)));
        assert!(!updated.properties.contains_key("city"));
        assert_eq!(updated.labels(), node.labels());
    }

    #[test]
    fn indexed_lookup_matches_full_scan() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        for age in [18, 25, 35, 45, 88] {
            let mut props = BTreeMap::new();
            props.insert("age".to_string(), Value::Int(age));
            engine.create_node(vec!["Person".into()], props).unwrap();
        }
        engine.create_property_index("age").unwrap();

        let mut indexed = engine.find_nodes_by_property_indexed("age", &Value::Int(35)).unwrap();
        let mut scanned = engine.find_nodes_by_property("age", &Value::Int(35));
        indexed.sort_by_key(|n| n.id);
        scanned.sort_by_key(|n| n.id);
        assert_eq!(indexed, scanned);
    }

    #[test]
    fn batch_is_atomic_on_failure() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let mut batch = engine.begin_batch();
        batch.add_edge(
            BatchNodeRef::Existing(9999),
            BatchNodeRef::Existing(9998),
            "KNOWS",
            BTreeMap::new(),
            1.0,
        );
        assert!(batch.commit().is_err());
        assert_eq!(engine.statistics().node_count, 0);
    }

    #[test]
    fn batch_commits_staged_node_and_edge_together() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let mut batch = engine.begin_batch();
        let a = batch.add_node(vec!["User".into()], BTreeMap::new());
        let b = batch.add_node(vec!["User".into()], BTreeMap::new());
        batch.add_edge(a, b, "KNOWS", BTreeMap::new(), 1.0);
        let result = batch.commit().unwrap();

        assert_eq!(result.node_ids.len(), 2);
        assert_eq!(result.edge_ids.len(), 1);
        let stats = engine.statistics();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 1);
    }

    #[test]
    fn snapshot_then_reopen_preserves_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();
        {
            let engine = open(&path);
            let a = engine.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
            let b = engine.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
            engine
                .create_edge(a.id, b.id, "KNOWS".into(), BTreeMap::new(), 1.0)
                .unwrap();
            engine.snapshot().unwrap();
            engine.close().unwrap();
        }
        let engine = open(&path);
        let stats = engine.statistics();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 1);
    }
}
