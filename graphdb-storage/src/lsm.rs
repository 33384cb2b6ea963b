//! LSM-tree backend: node and edge records are key-value pairs in a
//! size-bounded in-memory memtable (`BTreeMap`, same ordered-buffer shape as
//! the teacher's `nervusdb-v2-storage::memtable::MemTable`), backed by its own
//! WAL and periodically flushed to immutable sorted runs on disk. Point reads
//! probe the memtable, then runs newest to oldest, returning on first hit.
//! Compaction merges runs, keeping only the newest value per key and
//! discarding tombstones that no longer shadow anything in an older run.
//!
//! Adjacency and the label/property indexes are not part of the LSM keyspace
//! — per §4.7 they are derived state, rebuilt from the node/edge set this
//! engine manages, exactly as in [`crate::memory::MemoryEngine`].

use crate::binfmt::{write_properties, write_string, write_strings, write_u32, Cursor};
use crate::config::Config;
use crate::idalloc::IdAllocator;
use crate::index::{AdjacencyIndex, LabelIndex, PropertyIndex};
use crate::wal::{Wal, WalRecord};
use graphdb_api::{Edge, EdgeId, Error, GraphBackend, Node, NodeId, Result, Statistics, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

const KIND_NODE: u8 = 1;
const KIND_EDGE: u8 = 2;

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

fn node_key(id: NodeId) -> Vec<u8> {
    let mut k = Vec::with_capacity(9);
    k.push(KIND_NODE);
    k.extend_from_slice(&id.to_be_bytes());
    k
}

fn edge_key(id: EdgeId) -> Vec<u8> {
    let mut k = Vec::with_capacity(9);
    k.push(KIND_EDGE);
    k.extend_from_slice(&id.to_be_bytes());
    k
}

fn encode_node(node: &Node) -> Vec<u8> {
    let mut out = Vec::new();
    write_strings(&mut out, node.labels());
    write_properties(&mut out, &node.properties);
    out.extend_from_slice(&node.created_at.to_le_bytes());
    out.extend_from_slice(&node.updated_at.to_le_bytes());
    out
}

fn decode_node(id: NodeId, bytes: &[u8]) -> Result<Node> {
    let mut cur = Cursor::new(bytes);
    let labels = cur.read_strings()?;
    let properties = cur.read_properties()?;
    let created_at = cur.read_i64()?;
    let updated_at = cur.read_i64()?;
    Ok(Node::from_parts(id, labels, properties, created_at, updated_at))
}

fn encode_edge(edge: &Edge) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&edge.from_id.to_le_bytes());
    out.extend_from_slice(&edge.to_id.to_le_bytes());
    write_string(&mut out, &edge.edge_type);
    write_properties(&mut out, &edge.properties);
    out.extend_from_slice(&edge.weight.to_le_bytes());
    out.extend_from_slice(&edge.created_at.to_le_bytes());
    out
}

fn decode_edge(id: EdgeId, bytes: &[u8]) -> Result<Edge> {
    let mut cur = Cursor::new(bytes);
    let from_id = cur.read_u64()?;
    let to_id = cur.read_u64()?;
    let edge_type = cur.read_string()?;
    let properties = cur.read_properties()?;
    let weight = cur.read_f64()?;
    let created_at = cur.read_i64()?;
    Ok(Edge {
        id,
        from_id,
        to_id,
        edge_type,
        properties,
        weight,
        created_at,
    })
}

/// An immutable sorted run written to disk by a memtable flush: a flat
/// sequence of `[key_len u32][key][is_tombstone u8][value_len u32][value]`
/// entries in ascending key order, loaded fully into memory on open (runs are
/// small relative to commodity RAM for the node/edge record sizes this store
/// deals with; a production engine would index-and-page these instead).
struct Run {
    path: PathBuf,
    entries: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Run {
    fn write(path: &Path, entries: &BTreeMap<Vec<u8>, Option<Vec<u8>>>) -> Result<Self> {
        let mut out = Vec::new();
        for (key, value) in entries {
            write_u32(&mut out, key.len() as u32);
            out.extend_from_slice(key);
            match value {
                Some(v) => {
                    out.push(0);
                    write_u32(&mut out, v.len() as u32);
                    out.extend_from_slice(v);
                }
                None => out.push(1),
            }
        }
        let tmp = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&out)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(Run {
            path: path.to_path_buf(),
            entries: entries.clone(),
        })
    }

    fn load(path: PathBuf) -> Result<Self> {
        let mut file = File::open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let mut cur = Cursor::new(&bytes);
        let mut entries = BTreeMap::new();
        while !cur.remaining().is_empty() {
            let klen = cur.read_u32()? as usize;
            let key = cur.remaining()[..klen].to_vec();
            cur.pos += klen;
            let tombstone = cur.read_u8()? != 0;
            let value = if tombstone {
                None
            } else {
                let vlen = cur.read_u32()? as usize;
                let v = cur.remaining()[..vlen].to_vec();
                cur.pos += vlen;
                Some(v)
            };
            entries.insert(key, value);
        }
        Ok(Run { path, entries })
    }

    fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.entries.get(key).cloned()
    }
}

/// In-memory, size-bounded write buffer. Writes block briefly while this
/// swaps for a fresh empty map during rotation, but never while a rotated-out
/// table is being flushed to a run or while compaction runs.
struct LsmState {
    memtable: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    runs: Vec<Run>,
    next_run_id: u64,
}

impl LsmState {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(v) = self.memtable.get(key) {
            return v.clone();
        }
        for run in self.runs.iter().rev() {
            if let Some(v) = run.get(key) {
                return v;
            }
        }
        None
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.memtable.insert(key, Some(value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.memtable.insert(key, None);
    }

    /// All live (non-tombstoned) keys with the given kind prefix, across the
    /// memtable and every run, newest value winning.
    fn scan_kind(&self, kind: u8) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: HashMap<Vec<u8>, Option<Vec<u8>>> = HashMap::new();
        for run in &self.runs {
            for (k, v) in &run.entries {
                if k.first() == Some(&kind) {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
        for (k, v) in &self.memtable {
            if k.first() == Some(&kind) {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }
}

/// Applies one WAL record directly to the key-value layer during replay,
/// without touching the derived indexes — those are rebuilt once, from the
/// final merged state, after every record has been applied. `DeleteNode`'s
/// cascade is resolved by scanning the current edge set rather than
/// consulting the adjacency index, which does not exist yet at this point.
fn apply_record_to_kv(kv: &mut LsmState, record: WalRecord, pending_index_keys: &mut Vec<String>) {
    match record {
        WalRecord::CreateNode {
            id,
            labels,
            properties,
            created_at,
        } => {
            let node = Node::from_parts(id, labels, properties, created_at, created_at);
            kv.put(node_key(id), encode_node(&node));
        }
        WalRecord::UpdateNode { id, changes, updated_at } => {
            if let Some(bytes) = kv.get(&node_key(id)) {
                if let Ok(mut node) = decode_node(id, &bytes) {
                    node.merge_properties(&changes, updated_at);
                    kv.put(node_key(id), encode_node(&node));
                }
            }
        }
        WalRecord::DeleteNode { id } => {
            for (key, bytes) in kv.scan_kind(KIND_EDGE) {
                let edge_id = u64::from_be_bytes(key[1..9].try_into().unwrap());
                if let Ok(edge) = decode_edge(edge_id, &bytes) {
                    if edge.from_id == id || edge.to_id == id {
                        kv.delete(edge_key(edge_id));
                    }
                }
            }
            kv.delete(node_key(id));
        }
        WalRecord::CreateEdge {
            id,
            from_id,
            to_id,
            edge_type,
            properties,
            weight,
            created_at,
        } => {
            let edge = Edge {
                id,
                from_id,
                to_id,
                edge_type,
                properties,
                weight,
                created_at,
            };
            kv.put(edge_key(id), encode_edge(&edge));
        }
        WalRecord::DeleteEdge { id } => kv.delete(edge_key(id)),
        WalRecord::CreatePropertyIndex { key } => pending_index_keys.push(key),
        WalRecord::BatchBegin { .. } | WalRecord::BatchCommit { .. } | WalRecord::Checkpoint { .. } => {}
    }
}

struct PrimaryIndexes {
    adjacency: AdjacencyIndex,
    labels: LabelIndex,
    property_indexes: HashMap<String, PropertyIndex>,
}

enum WalHandle {
    Direct(Mutex<Wal>),
    Batched(crate::batcher::Batcher),
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
        }
    }

    fn close(&self) -> Result<()> {
        if let WalHandle::Batched(batcher) = self {
            batcher.close()?;
        }
        Ok(())
    }
}

/// LSM-backed graph engine: same read/write surface as
/// [`crate::memory::MemoryEngine`], satisfying §4.8 over a different storage
/// layout underneath.
pub struct LsmEngine {
    kv: RwLock<LsmState>,
    indexes: RwLock<PrimaryIndexes>,
    node_alloc: IdAllocator,
    edge_alloc: IdAllocator,
    wal: WalHandle,
    memtable_limit: AtomicUsize,
    lsm_dir: PathBuf,
}

impl LsmEngine {
    pub fn open(config: &Config) -> Result<Self> {
        let lsm_dir = config.data_dir.join("lsm");
        std::fs::create_dir_all(&lsm_dir)?;

        let mut run_paths: Vec<PathBuf> = fs::read_dir(&lsm_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("run"))
            .collect();
        run_paths.sort();
        let mut runs = Vec::new();
        let mut next_run_id = 0u64;
        for path in run_paths {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(n) = stem.parse::<u64>() {
                    next_run_id = next_run_id.max(n + 1);
                }
            }
            runs.push(Run::load(path)?);
        }

        let mut kv = LsmState {
            memtable: BTreeMap::new(),
            runs,
            next_run_id,
        };

        let node_alloc = IdAllocator::default();
        let edge_alloc = IdAllocator::default();

        // Replay lands every node/edge mutation directly in the memtable, on
        // top of whatever the on-disk runs already hold, without touching the
        // derived indexes yet — a record replayed here may duplicate one a
        // run already captured, and the indexes must only ever see the final
        // state once, never once per overlapping source.
        let wal_path = lsm_dir.join("memtable.wal");
        let mut wal = Wal::open(&wal_path)?;
        let records = wal.replay()?;
        let mut pending_index_keys = Vec::new();
        for (_, record) in records {
            apply_record_to_kv(&mut kv, record, &mut pending_index_keys);
        }

        let mut indexes = PrimaryIndexes {
            adjacency: AdjacencyIndex::new(config.enable_edge_compression, config.edge_cache_size),
            labels: LabelIndex::default(),
            property_indexes: HashMap::new(),
        };
        for (key, bytes) in kv.scan_kind(KIND_NODE) {
            let id = u64::from_be_bytes(key[1..9].try_into().unwrap());
            node_alloc.observe(id);
            let node = decode_node(id, &bytes)?;
            for label in node.labels() {
                indexes.labels.add(label, id);
            }
        }
        for (key, bytes) in kv.scan_kind(KIND_EDGE) {
            let id = u64::from_be_bytes(key[1..9].try_into().unwrap());
            edge_alloc.observe(id);
            let edge = decode_edge(id, &bytes)?;
            indexes.adjacency.add_outgoing(edge.from_id, id);
            indexes.adjacency.add_incoming(edge.to_id, id);
        }

        let wal = if config.enable_batching {
            WalHandle::Batched(crate::batcher::Batcher::spawn(wal, config.batch_size, config.flush_interval))
        } else {
            WalHandle::Direct(Mutex::new(wal))
        };

        let engine = LsmEngine {
            kv: RwLock::new(kv),
            indexes: RwLock::new(indexes),
            node_alloc,
            edge_alloc,
            wal,
            memtable_limit: AtomicUsize::new(4096),
            lsm_dir,
        };
        for key in pending_index_keys {
            engine.rebuild_property_index(&key)?;
        }
        Ok(engine)
    }

    fn raw_put_node(&self, node: &Node) {
        self.kv.write().unwrap().put(node_key(node.id), encode_node(node));
    }

    fn raw_put_edge(&self, edge: &Edge) {
        self.kv.write().unwrap().put(edge_key(edge.id), encode_edge(edge));
    }

    fn raw_delete_node_cascade(&self, id: NodeId) -> Result<()> {
        let existing = self.get_node(id).ok();
        if let Some(node) = existing {
            let mut idx = self.indexes.write().unwrap();
            idx.labels.remove_node(node.labels(), id);
            for (k, v) in &node.properties {
                if let Some(pi) = idx.property_indexes.get_mut(k) {
                    pi.remove(v, id);
                }
            }
            let outgoing = idx.adjacency.outgoing(id);
            let incoming = idx.adjacency.incoming(id);
            drop(idx);
            for edge_id in outgoing.into_iter().chain(incoming.into_iter()) {
                self.raw_delete_edge(edge_id)?;
            }
            let mut idx = self.indexes.write().unwrap();
            idx.adjacency.drop_node(id);
        }
        self.kv.write().unwrap().delete(node_key(id));
        self.maybe_rotate()
    }

    fn raw_delete_edge(&self, id: EdgeId) -> Result<()> {
        if let Ok(edge) = self.get_edge(id) {
            let mut idx = self.indexes.write().unwrap();
            idx.adjacency.remove_outgoing(edge.from_id, id);
            idx.adjacency.remove_incoming(edge.to_id, id);
        }
        self.kv.write().unwrap().delete(edge_key(id));
        self.maybe_rotate()
    }

    fn raw_update_node(&self, id: NodeId, changes: &BTreeMap<String, Option<Value>>, updated_at: i64) -> Result<()> {
        let Some(mut node) = self.get_node(id).ok() else {
            return Ok(());
        };
        let mut idx = self.indexes.write().unwrap();
        for key in changes.keys() {
            if let (Some(old), Some(pi)) = (node.properties.get(key), idx.property_indexes.get_mut(key)) {
                pi.remove(old, id);
            }
        }
        node.merge_properties(changes, updated_at);
        for key in changes.keys() {
            if let (Some(new), Some(pi)) = (node.properties.get(key.as_str()), idx.property_indexes.get_mut(key)) {
                pi.insert(new, id);
            }
        }
        drop(idx);
        self.raw_put_node(&node);
        self.maybe_rotate()
    }

    fn rebuild_property_index(&self, key: &str) -> Result<()> {
        let mut index = PropertyIndex::default();
        for (k, bytes) in self.kv.read().unwrap().scan_kind(KIND_NODE) {
            let id = u64::from_be_bytes(k[1..9].try_into().unwrap());
            let node = decode_node(id, &bytes)?;
            if let Some(value) = node.properties.get(key) {
                index.insert(value, id);
            }
        }
        self.indexes.write().unwrap().property_indexes.insert(key.to_string(), index);
        Ok(())
    }

    /// Flushes the memtable to a new immutable run once it crosses the size
    /// bound, then compacts if that leaves more runs than the engine wants to
    /// keep. Never holds the indexes lock while doing disk I/O.
    fn maybe_rotate(&self) -> Result<()> {
        let limit = self.memtable_limit.load(Ordering::SeqCst);
        let should_rotate = self.kv.read().unwrap().memtable.len() >= limit;
        if !should_rotate {
            return Ok(());
        }
        let flushed = {
            let mut kv = self.kv.write().unwrap();
            if kv.memtable.len() < limit {
                return Ok(());
            }
            std::mem::take(&mut kv.memtable)
        };
        let run_id = {
            let mut kv = self.kv.write().unwrap();
            let id = kv.next_run_id;
            kv.next_run_id += 1;
            id
        };
        let run_path = self.lsm_dir.join(format!("{run_id:020}.run"));
        let run = Run::write(&run_path, &flushed)?;
        self.kv.write().unwrap().runs.push(run);
        self.compact_if_needed()
    }

    /// Merges all runs into one, keeping only the newest value per key and
    /// dropping tombstones (nothing older remains to shadow). Never blocks
    /// writers: the merged run set replaces the old one in a single lock
    /// acquisition once computed.
    fn compact_if_needed(&self) -> Result<()> {
        const COMPACTION_THRESHOLD: usize = 4;
        let run_count = self.kv.read().unwrap().runs.len();
        if run_count < COMPACTION_THRESHOLD {
            return Ok(());
        }
        log::info!("lsm: compacting {run_count} runs in {:?}", self.lsm_dir);

        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        let (runs_snapshot, run_id) = {
            let mut kv = self.kv.write().unwrap();
            let id = kv.next_run_id;
            kv.next_run_id += 1;
            (std::mem::take(&mut kv.runs), id)
        };
        for run in &runs_snapshot {
            for (k, v) in &run.entries {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged.retain(|_, v| v.is_some());

        let run_path = self.lsm_dir.join(format!("{run_id:020}.run"));
        let compacted = Run::write(&run_path, &merged)?;
        for old in &runs_snapshot {
            let _ = fs::remove_file(&old.path);
        }
        self.kv.write().unwrap().runs.push(compacted);
        log::info!("lsm: compaction done, 1 run remains in {:?}", self.lsm_dir);
        Ok(())
    }

    pub fn create_node(&self, labels: Vec<String>, properties: BTreeMap<String, Value>) -> Result<Node> {
        if labels.iter().any(|l| l.is_empty()) {
            return Err(Error::invalid_argument("labels must be non-empty strings"));
        }
        let id = self.node_alloc.next();
        let now = now_nanos();
        let node = Node::new(id, labels, properties, now);
        self.wal.append(WalRecord::CreateNode {
            id,
            labels: node.labels().to_vec(),
            properties: node.properties.clone(),
            created_at: now,
        })?;
        self.raw_put_node(&node);
        let mut idx = self.indexes.write().unwrap();
        for label in node.labels() {
            idx.labels.add(label, id);
        }
        for (k, v) in &node.properties {
            if let Some(pi) = idx.property_indexes.get_mut(k) {
                pi.insert(v, id);
            }
        }
        drop(idx);
        self.maybe_rotate()?;
        Ok(node)
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        let bytes = self
            .kv
            .read()
            .unwrap()
            .get(&node_key(id))
            .ok_or_else(|| Error::not_found("node", id))?;
        decode_node(id, &bytes)
    }

    pub fn update_node(&self, id: NodeId, changes: BTreeMap<String, Option<Value>>) -> Result<Node> {
        self.get_node(id)?;
        let now = now_nanos();
        self.wal.append(WalRecord::UpdateNode {
            id,
            changes: changes.clone(),
            updated_at: now,
        })?;
        self.raw_update_node(id, &changes, now)?;
        self.get_node(id)
    }

    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        self.get_node(id)?;
        self.wal.append(WalRecord::DeleteNode { id })?;
        self.raw_delete_node_cascade(id)
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
        self.get_node(from_id)?;
        self.get_node(to_id)?;
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
        self.wal.append(WalRecord::CreateEdge {
            id,
            from_id,
            to_id,
            edge_type: edge.edge_type.clone(),
            properties: edge.properties.clone(),
            weight,
            created_at: now,
        })?;
        self.raw_put_edge(&edge);
        let mut idx = self.indexes.write().unwrap();
        idx.adjacency.add_outgoing(from_id, id);
        idx.adjacency.add_incoming(to_id, id);
        drop(idx);
        self.maybe_rotate()?;
        Ok(edge)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        let bytes = self
            .kv
            .read()
            .unwrap()
            .get(&edge_key(id))
            .ok_or_else(|| Error::not_found("edge", id))?;
        decode_edge(id, &bytes)
    }

    pub fn delete_edge(&self, id: EdgeId) -> Result<()> {
        self.get_edge(id)?;
        self.wal.append(WalRecord::DeleteEdge { id })?;
        self.raw_delete_edge(id)
    }

    pub fn outgoing_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        self.get_node(node)?;
        let ids = self.indexes.write().unwrap().adjacency.outgoing(node);
        ids.into_iter().map(|id| self.get_edge(id)).collect()
    }

    pub fn incoming_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        self.get_node(node)?;
        let ids = self.indexes.read().unwrap().adjacency.incoming(node);
        ids.into_iter().map(|id| self.get_edge(id)).collect()
    }

    pub fn find_nodes_by_label(&self, label: &str) -> Vec<Node> {
        let ids = self.indexes.read().unwrap().labels.nodes_with_label(label);
        ids.into_iter().filter_map(|id| self.get_node(id).ok()).collect()
    }

    pub fn find_nodes_by_property(&self, key: &str, value: &Value) -> Vec<Node> {
        self.all_nodes()
            .into_iter()
            .filter(|n| n.properties.get(key) == Some(value))
            .collect()
    }

    pub fn find_nodes_by_property_indexed(&self, key: &str, value: &Value) -> Result<Vec<Node>> {
        let ids = {
            let idx = self.indexes.read().unwrap();
            let index = idx.property_indexes.get(key).ok_or_else(|| Error::no_such_index(key))?;
            index.point(value)
        };
        Ok(ids.into_iter().filter_map(|id| self.get_node(id).ok()).collect())
    }

    pub fn find_nodes_by_property_range(&self, key: &str, lo: &Value, hi: &Value) -> Result<Vec<Node>> {
        let ids = {
            let idx = self.indexes.read().unwrap();
            let index = idx.property_indexes.get(key).ok_or_else(|| Error::no_such_index(key))?;
            index.range(lo, hi)?
        };
        Ok(ids.into_iter().filter_map(|id| self.get_node(id).ok()).collect())
    }

    pub fn find_nodes_by_property_prefix(&self, key: &str, prefix: &str) -> Result<Vec<Node>> {
        let ids = {
            let idx = self.indexes.read().unwrap();
            let index = idx.property_indexes.get(key).ok_or_else(|| Error::no_such_index(key))?;
            index.prefix(prefix)
        };
        Ok(ids.into_iter().filter_map(|id| self.get_node(id).ok()).collect())
    }

    pub fn create_property_index(&self, key: &str) -> Result<()> {
        self.wal.append(WalRecord::CreatePropertyIndex { key: key.to_string() })?;
        self.rebuild_property_index(key)
    }

    pub fn statistics(&self) -> Statistics {
        let kv = self.kv.read().unwrap();
        Statistics {
            node_count: kv.scan_kind(KIND_NODE).len() as u64,
            edge_count: kv.scan_kind(KIND_EDGE).len() as u64,
        }
    }

    pub fn close(&self) -> Result<()> {
        self.wal.close()
    }

    pub fn all_nodes(&self) -> Vec<Node> {
        self.kv
            .read()
            .unwrap()
            .scan_kind(KIND_NODE)
            .into_iter()
            .filter_map(|(k, bytes)| {
                let id = u64::from_be_bytes(k[1..9].try_into().unwrap());
                decode_node(id, &bytes).ok()
            })
            .collect()
    }
}

impl GraphBackend for LsmEngine {
    fn get_node(&self, id: NodeId) -> Result<Node> {
        LsmEngine::get_node(self, id)
    }

    fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        LsmEngine::get_edge(self, id)
    }

    fn outgoing_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        LsmEngine::outgoing_edges(self, node)
    }

    fn incoming_edges(&self, node: NodeId) -> Result<Vec<Edge>> {
        LsmEngine::incoming_edges(self, node)
    }

    fn find_nodes_by_label(&self, label: &str) -> Vec<Node> {
        LsmEngine::find_nodes_by_label(self, label)
    }

    fn find_nodes_by_property(&self, key: &str, value: &Value) -> Vec<Node> {
        LsmEngine::find_nodes_by_property(self, key, value)
    }

    fn find_nodes_by_property_indexed(&self, key: &str, value: &Value) -> Result<Vec<Node>> {
        LsmEngine::find_nodes_by_property_indexed(self, key, value)
    }

    fn find_nodes_by_property_range(&self, key: &str, lo: &Value, hi: &Value) -> Result<Vec<Node>> {
        LsmEngine::find_nodes_by_property_range(self, key, lo, hi)
    }

    fn find_nodes_by_property_prefix(&self, key: &str, prefix: &str) -> Result<Vec<Node>> {
        LsmEngine::find_nodes_by_property_prefix(self, key, prefix)
    }

    fn statistics(&self) -> Statistics {
        LsmEngine::statistics(self)
    }

    fn all_nodes(&self) -> Vec<Node> {
        LsmEngine::all_nodes(self)
    }
}

impl graphdb_api::GraphWriter for LsmEngine {
    fn create_node(&self, labels: Vec<String>, properties: BTreeMap<String, Value>) -> Result<Node> {
        LsmEngine::create_node(self, labels, properties)
    }

    fn create_edge(
        &self,
        from_id: NodeId,
        to_id: NodeId,
        edge_type: String,
        properties: BTreeMap<String, Value>,
        weight: f64,
    ) -> Result<Edge> {
        LsmEngine::create_edge(self, from_id, to_id, edge_type, properties, weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path) -> LsmEngine {
        LsmEngine::open(&Config::new(dir)).unwrap()
    }

    #[test]
    fn create_get_delete_node() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let node = engine.create_node(vec!["Person".into()], BTreeMap::new()).unwrap();
        assert_eq!(engine.get_node(node.id).unwrap().id, node.id);
        engine.delete_node(node.id).unwrap();
        assert!(engine.get_node(node.id).is_err());
    }

    #[test]
    fn edge_requires_existing_endpoints() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        let err = engine
            .create_edge(1, 2, "KNOWS".into(), BTreeMap::new(), 1.0)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn flush_and_compaction_preserve_reads() {
        let dir = tempdir().unwrap();
        let engine = open(dir.path());
        engine.memtable_rotate_for_test(2);
        let mut ids = Vec::new();
        for i in 0..50 {
            let mut props = BTreeMap::new();
            props.insert("i".to_string(), Value::Int(i));
            ids.push(engine.create_node(vec!["N".into()], props).unwrap().id);
        }
        for id in ids {
            assert!(engine.get_node(id).is_ok());
        }
        assert_eq!(engine.statistics().node_count, 50);
    }

    #[test]
    fn reopen_recovers_state_via_wal_and_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let (a, b) = {
            let engine = open(&path);
            engine.memtable_rotate_for_test(4);
            let a = engine.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
            let b = engine.create_node(vec!["User".into()], BTreeMap::new()).unwrap();
            engine.create_edge(a.id, b.id, "KNOWS".into(), BTreeMap::new(), 1.0).unwrap();
            for _ in 0..10u64 {
                engine.create_node(vec!["Filler".into()], BTreeMap::new()).unwrap();
            }
            engine.close().unwrap();
            (a.id, b.id)
        };
        let engine = open(&path);
        assert!(engine.get_node(a).is_ok());
        assert_eq!(engine.outgoing_edges(a).unwrap().len(), 1);
        let _ = b;
    }

    impl LsmEngine {
        /// Test-only hook lowering the memtable rotation threshold so flush
        /// and compaction paths exercise without creating millions of rows.
        fn memtable_rotate_for_test(&self, limit: usize) {
            self.memtable_limit.store(limit, Ordering::SeqCst);
        }
    }
}
