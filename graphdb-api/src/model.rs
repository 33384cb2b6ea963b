use crate::value::Value;
use std::collections::BTreeMap;

pub type NodeId = u64;
pub type EdgeId = u64;

/// A vertex with a deduplicated, insertion-ordered label set and a typed
/// property map.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Node {
    pub fn new(id: NodeId, labels: Vec<String>, properties: BTreeMap<String, Value>, now: i64) -> Self {
        Node {
            id,
            labels: dedup_preserve_order(labels),
            properties,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a node from already-deduplicated parts, e.g. when restoring
    /// from a snapshot or replaying the WAL. Callers are trusted to have
    /// maintained the label-dedup invariant themselves.
    pub fn from_parts(
        id: NodeId,
        labels: Vec<String>,
        properties: BTreeMap<String, Value>,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Node {
            id,
            labels,
            properties,
            created_at,
            updated_at,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Applies merge-patch semantics to `properties`: `Some(value)` sets the
    /// key, `None` removes it. The label set is untouched.
    pub fn merge_properties(&mut self, changes: &BTreeMap<String, Option<Value>>, now: i64) {
        for (key, value) in changes {
            match value {
                Some(v) => {
                    self.properties.insert(key.clone(), v.clone());
                }
                None => {
                    self.properties.remove(key);
                }
            }
        }
        self.updated_at = now;
    }
}

fn dedup_preserve_order(labels: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    labels
        .into_iter()
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

/// A directed, typed connection between two nodes with a weight and its own
/// property map.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub from_id: NodeId,
    pub to_id: NodeId,
    pub edge_type: String,
    pub properties: BTreeMap<String, Value>,
    pub weight: f64,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_labels_are_deduplicated_preserving_order() {
        let node = Node::new(
            1,
            vec!["User".into(), "Admin".into(), "User".into()],
            BTreeMap::new(),
            0,
        );
        assert_eq!(node.labels(), &["User".to_string(), "Admin".to_string()]);
    }
}
