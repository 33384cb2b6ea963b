//! Point-in-time snapshot: every node, every edge, the id
//! counters, and the WAL sequence at which the dump is consistent. Property
//! and label indexes are not serialized — they are cheap to rebuild from
//! the node/edge set on restore, so only the set of explicitly created
//! property-index keys is carried, marking them derivable rather than
//! duplicating their contents.
//!
//! Written to a temp path in the same directory then renamed into place, so
//! a reader never observes a half-written snapshot file.

use crate::binfmt::{write_properties, write_string, write_strings, write_u32, Cursor};
use graphdb_api::{Edge, EdgeId, Error, Node, NodeId, Result};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"GSNP";
const VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotData {
    pub node_id_high_water: NodeId,
    pub edge_id_high_water: EdgeId,
    /// WAL entries with sequence <= this are already captured here.
    pub wal_sequence: u64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Keys with an explicitly created property index; contents are
    /// rebuilt from `nodes` on restore.
    pub indexed_keys: Vec<String>,
}

impl SnapshotData {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        write_u32(&mut out, VERSION);
        out.extend_from_slice(&self.node_id_high_water.to_le_bytes());
        out.extend_from_slice(&self.edge_id_high_water.to_le_bytes());
        out.extend_from_slice(&self.wal_sequence.to_le_bytes());

        write_u32(&mut out, self.nodes.len() as u32);
        for node in &self.nodes {
            out.extend_from_slice(&node.id.to_le_bytes());
            write_strings(&mut out, node.labels());
            write_properties(&mut out, &node.properties);
            out.extend_from_slice(&node.created_at.to_le_bytes());
            out.extend_from_slice(&node.updated_at.to_le_bytes());
        }

        write_u32(&mut out, self.edges.len() as u32);
        for edge in &self.edges {
            out.extend_from_slice(&edge.id.to_le_bytes());
            out.extend_from_slice(&edge.from_id.to_le_bytes());
            out.extend_from_slice(&edge.to_id.to_le_bytes());
            write_string(&mut out, &edge.edge_type);
            write_properties(&mut out, &edge.properties);
            out.extend_from_slice(&edge.weight.to_le_bytes());
            out.extend_from_slice(&edge.created_at.to_le_bytes());
        }

        write_strings(&mut out, &self.indexed_keys);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 || &bytes[0..4] != MAGIC {
            return Err(Error::corrupt_format("bad snapshot magic"));
        }
        let mut cur = Cursor::new(&bytes[4..]);
        let version = cur.read_u32()?;
        if version != VERSION {
            return Err(Error::corrupt_format(format!(
                "unsupported snapshot version {version}"
            )));
        }

        let node_id_high_water = cur.read_u64()?;
        let edge_id_high_water = cur.read_u64()?;
        let wal_sequence = cur.read_u64()?;

        let node_count = cur.read_u32()?;
        let mut nodes = Vec::with_capacity(node_count as usize);
        for _ in 0..node_count {
            let id = cur.read_u64()?;
            let labels = cur.read_strings()?;
            let properties = cur.read_properties()?;
            let created_at = cur.read_i64()?;
            let updated_at = cur.read_i64()?;
            nodes.push(Node::from_parts(id, labels, properties, created_at, updated_at));
        }

        let edge_count = cur.read_u32()?;
        let mut edges = Vec::with_capacity(edge_count as usize);
        for _ in 0..edge_count {
            let id = cur.read_u64()?;
            let from_id = cur.read_u64()?;
            let to_id = cur.read_u64()?;
            let edge_type = cur.read_string()?;
            let properties = cur.read_properties()?;
            let weight = cur.read_f64()?;
            let created_at = cur.read_i64()?;
            edges.push(Edge {
                id,
                from_id,
                to_id,
                edge_type,
                properties,
                weight,
                created_at,
            });
        }

        let indexed_keys = cur.read_strings()?;

        Ok(SnapshotData {
            node_id_high_water,
            edge_id_high_water,
            wal_sequence,
            nodes,
            edges,
            indexed_keys,
        })
    }
}

/// Writes `data` to `path` atomically: serialize to `path.tmp`, fsync, then
/// rename over `path`.
pub fn write(path: &Path, data: &SnapshotData) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&data.encode())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read(path: &Path) -> Result<SnapshotData> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    SnapshotData::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphdb_api::Value;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample() -> SnapshotData {
        let mut props = BTreeMap::new();
        props.insert("name".to_string(), Value::String("ada".to_string()));
        let node = Node::new(1, vec!["Person".to_string()], props, 1000);
        let edge = Edge {
            id: 1,
            from_id: 1,
            to_id: 1,
            edge_type: "SELF".to_string(),
            properties: BTreeMap::new(),
            weight: 1.0,
            created_at: 1000,
        };
        SnapshotData {
            node_id_high_water: 1,
            edge_id_high_water: 1,
            wal_sequence: 42,
            nodes: vec![node],
            edges: vec![edge],
            indexed_keys: vec!["name".to_string()],
        }
    }

    #[test]
    fn roundtrips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap.bin");
        let data = sample();
        write(&path, &data).unwrap();
        let restored = read(&path).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn write_is_atomic_no_tmp_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap.bin");
        write(&path, &sample()).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert!(path.exists());
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap.bin");
        fs::write(&path, b"nope").unwrap();
        let err = read(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptFormat { .. }));
    }
}
