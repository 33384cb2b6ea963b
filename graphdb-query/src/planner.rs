//! Picks how to produce the candidate set for a pattern's starting node:
//! an indexed property lookup when the pattern restricts an indexed
//! property, a label scan when it only restricts a label, or a full scan.

use crate::ast::{Literal, NodePattern};
use crate::error::Result;
use graphdb_api::{Error, GraphBackend, Node, Value};

pub fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

/// Produces the candidate nodes a pattern could bind to, before any
/// remaining property/label constraints or a `WHERE` clause are applied.
pub fn candidate_nodes(backend: &dyn GraphBackend, pattern: &NodePattern) -> Result<Vec<Node>> {
    if let Some((key, literal)) = pattern.properties.first() {
        let value = literal_to_value(literal);
        match backend.find_nodes_by_property_indexed(key, &value) {
            Ok(nodes) => return Ok(nodes),
            Err(Error::NoSuchIndex { .. }) => {}
            Err(other) => return Err(other.into()),
        }
    }
    if let Some(label) = &pattern.label {
        return Ok(backend.find_nodes_by_label(label));
    }
    Ok(backend.all_nodes())
}

/// True when a node satisfies every constraint embedded in its pattern
/// (label and inline property equalities), independent of how the
/// candidate set was produced.
pub fn node_matches_pattern(node: &Node, pattern: &NodePattern) -> bool {
    if let Some(label) = &pattern.label {
        if !node.has_label(label) {
            return false;
        }
    }
    pattern.properties.iter().all(|(key, literal)| {
        node.properties.get(key) == Some(&literal_to_value(literal))
    })
}
