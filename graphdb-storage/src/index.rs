//! Adjacency and property/label index layer. Pure data
//! structures with no locking of their own — the engine that owns an
//! instance decides what lock (if any) guards it, per its own concurrency
//! model.

use graphdb_api::{Error, EdgeId, NodeId, Result, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::codec::EdgeList;

/// Bidirectional adjacency: outgoing and incoming edge-id lists per node,
/// optionally compressed, with a small LRU cache of recently
/// decompressed lists so repeated traversal over the same node doesn't pay
/// the decode cost every time.
pub struct AdjacencyIndex {
    out: HashMap<NodeId, EdgeList>,
    incoming: HashMap<NodeId, EdgeList>,
    compress: bool,
    hot_cache: HotCache,
}

impl AdjacencyIndex {
    pub fn new(compress: bool, hot_cache_size: usize) -> Self {
        AdjacencyIndex {
            out: HashMap::new(),
            incoming: HashMap::new(),
            compress,
            hot_cache: HotCache::new(hot_cache_size),
        }
    }

    pub fn add_outgoing(&mut self, node: NodeId, edge: EdgeId) {
        Self::push(&mut self.out, self.compress, node, edge);
        self.hot_cache.invalidate(node);
    }

    pub fn add_incoming(&mut self, node: NodeId, edge: EdgeId) {
        Self::push(&mut self.incoming, self.compress, node, edge);
        self.hot_cache.invalidate(node);
    }

    fn push(map: &mut HashMap<NodeId, EdgeList>, compress: bool, node: NodeId, edge: EdgeId) {
        let mut ids = map.remove(&node).map(|list| list.decompress()).unwrap_or_default();
        ids.push(edge);
        let list = if compress {
            EdgeList::compress(&ids)
        } else {
            EdgeList::Uncompressed(ids)
        };
        map.insert(node, list);
    }

    fn remove(map: &mut HashMap<NodeId, EdgeList>, compress: bool, node: NodeId, edge: EdgeId) {
        if let Some(list) = map.remove(&node) {
            let mut ids = list.decompress();
            ids.retain(|&e| e != edge);
            if !ids.is_empty() {
                let list = if compress {
                    EdgeList::compress(&ids)
                } else {
                    EdgeList::Uncompressed(ids)
                };
                map.insert(node, list);
            }
        }
    }

    pub fn remove_outgoing(&mut self, node: NodeId, edge: EdgeId) {
        Self::remove(&mut self.out, self.compress, node, edge);
        self.hot_cache.invalidate(node);
    }

    pub fn remove_incoming(&mut self, node: NodeId, edge: EdgeId) {
        Self::remove(&mut self.incoming, self.compress, node, edge);
        self.hot_cache.invalidate(node);
    }

    pub fn drop_node(&mut self, node: NodeId) {
        self.out.remove(&node);
        self.incoming.remove(&node);
        self.hot_cache.invalidate(node);
    }

    pub fn outgoing(&mut self, node: NodeId) -> Vec<EdgeId> {
        if let Some(cached) = self.hot_cache.get(node) {
            return cached;
        }
        let ids = self
            .out
            .get(&node)
            .map(|list| list.decompress())
            .unwrap_or_default();
        self.hot_cache.put(node, ids.clone());
        ids
    }

    pub fn incoming(&self, node: NodeId) -> Vec<EdgeId> {
        self.incoming
            .get(&node)
            .map(|list| list.decompress())
            .unwrap_or_default()
    }
}

/// Bounded LRU cache of decompressed outgoing-edge lists, keyed by node.
/// Only caches the `out` side since traversal (§4.10) walks outgoing edges
/// far more often than it inspects incoming ones directly.
struct HotCache {
    capacity: usize,
    order: VecDeque<NodeId>,
    entries: HashMap<NodeId, Vec<EdgeId>>,
}

impl HotCache {
    fn new(capacity: usize) -> Self {
        HotCache {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, node: NodeId) -> Option<Vec<EdgeId>> {
        if let Some(ids) = self.entries.get(&node) {
            let ids = ids.clone();
            self.touch(node);
            Some(ids)
        } else {
            None
        }
    }

    fn put(&mut self, node: NodeId, ids: Vec<EdgeId>) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&node) && self.entries.len() >= self.capacity {
            if let Some(evict) = self.order.pop_front() {
                self.entries.remove(&evict);
            }
        }
        self.entries.insert(node, ids);
        self.touch(node);
    }

    fn touch(&mut self, node: NodeId) {
        self.order.retain(|&n| n != node);
        self.order.push_back(node);
    }

    fn invalidate(&mut self, node: NodeId) {
        self.entries.remove(&node);
        self.order.retain(|&n| n != node);
    }
}

/// `label -> set of node ids`.
#[derive(Default)]
pub struct LabelIndex {
    by_label: HashMap<String, HashSet<NodeId>>,
}

impl LabelIndex {
    pub fn add(&mut self, label: &str, node: NodeId) {
        self.by_label.entry(label.to_string()).or_default().insert(node);
    }

    pub fn remove_node(&mut self, labels: &[String], node: NodeId) {
        for label in labels {
            if let Some(set) = self.by_label.get_mut(label) {
                set.remove(&node);
                if set.is_empty() {
                    self.by_label.remove(label);
                }
            }
        }
    }

    pub fn nodes_with_label(&self, label: &str) -> Vec<NodeId> {
        self.by_label
            .get(label)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// An explicitly created index on one property key: point lookup plus
/// range/prefix scans over an ordered key space. Values of differing types
/// under the same key simply don't participate in range/prefix comparisons
/// against each other (each bucket is internally homogeneous by construction
/// since a property key is expected to carry one value type in practice).
#[derive(Default)]
pub struct PropertyIndex {
    // Encoded sort key -> (original value, node ids). BTreeMap gives range
    // scans for free; the encoded key preserves the natural ordering of
    // ints/floats/strings/timestamps via `Value::compare`.
    entries: BTreeMap<SortKey, HashSet<NodeId>>,
}

/// A value wrapped so it can live in a `BTreeMap` despite `Value` not
/// implementing `Ord` (cross-type comparisons are fallible, so `Value`
/// intentionally only offers `compare` -> `Result<Ordering>`).
#[derive(Clone, Debug)]
struct SortKey(Value);

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.compare(&other.0).map(|o| o == Ordering::Equal).unwrap_or(false)
    }
}
impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.compare(&other.0).unwrap_or_else(|_| {
            // Values of different types: order by type name so the BTreeMap
            // stays well-formed even if callers mix types under one key.
            self.0.type_name().cmp(other.0.type_name())
        })
    }
}

impl PropertyIndex {
    pub fn insert(&mut self, value: &Value, node: NodeId) {
        self.entries
            .entry(SortKey(value.clone()))
            .or_default()
            .insert(node);
    }

    pub fn remove(&mut self, value: &Value, node: NodeId) {
        let key = SortKey(value.clone());
        if let Some(set) = self.entries.get_mut(&key) {
            set.remove(&node);
            if set.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    pub fn point(&self, value: &Value) -> Vec<NodeId> {
        self.entries
            .get(&SortKey(value.clone()))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn range(&self, lo: &Value, hi: &Value) -> Result<Vec<NodeId>> {
        let lo_key = SortKey(lo.clone());
        let hi_key = SortKey(hi.clone());
        if lo.compare(hi).is_err() {
            return Err(Error::TypeError {
                expected: lo.type_name(),
                found: hi.type_name(),
            });
        }
        let mut out = Vec::new();
        for (key, set) in self.entries.range(lo_key..=hi_key) {
            if key.0.type_name() != lo.type_name() {
                continue;
            }
            out.extend(set.iter().copied());
        }
        Ok(out)
    }

    pub fn prefix(&self, prefix: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        for (key, set) in &self.entries {
            if let Value::String(s) = &key.0 {
                if s.starts_with(prefix) {
                    out.extend(set.iter().copied());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_add_remove_roundtrip() {
        let mut adj = AdjacencyIndex::new(true, 4);
        adj.add_outgoing(1, 10);
        adj.add_outgoing(1, 11);
        assert_eq!(adj.outgoing(1), vec![10, 11]);
        adj.remove_outgoing(1, 10);
        assert_eq!(adj.outgoing(1), vec![11]);
    }

    #[test]
    fn hot_cache_evicts_lru() {
        let mut adj = AdjacencyIndex::new(false, 1);
        adj.add_outgoing(1, 10);
        adj.add_outgoing(2, 20);
        adj.outgoing(1);
        adj.outgoing(2); // evicts node 1's cache entry, but not its data
        assert_eq!(adj.outgoing(1), vec![10]);
    }

    #[test]
    fn label_index_tracks_membership() {
        let mut idx = LabelIndex::default();
        idx.add("Person", 1);
        idx.add("Person", 2);
        idx.remove_node(&["Person".to_string()], 1);
        assert_eq!(idx.nodes_with_label("Person"), vec![2]);
    }

    #[test]
    fn property_index_point_and_range() {
        let mut idx = PropertyIndex::default();
        for age in [18, 25, 35, 45, 88] {
            idx.insert(&Value::Int(age), age as u64);
        }
        assert_eq!(idx.point(&Value::Int(25)), vec![25]);
        let mut in_range = idx.range(&Value::Int(30), &Value::Int(40)).unwrap();
        in_range.sort();
        assert_eq!(in_range, vec![35]);
    }

    #[test]
    fn property_index_prefix_matches_strings() {
        let mut idx = PropertyIndex::default();
        idx.insert(&Value::String("alice".into()), 1);
        idx.insert(&Value::String("alicia".into()), 2);
        idx.insert(&Value::String("bob".into()), 3);
        let mut matches = idx.prefix("ali");
        matches.sort();
        assert_eq!(matches, vec![1, 2]);
    }
}
