//! Storage configuration: a plain struct with direct defaults —
//! no builder macro, matching the teacher's `GraphEngine::open` style of
//! taking concrete arguments rather than a fluent builder.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Primary state lives entirely in memory, behind one RW lock.
    Memory,
    /// Primary state lives in an LSM tree of memtable + sorted runs.
    Lsm,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub backend: Backend,
    pub enable_batching: bool,
    pub batch_size: usize,
    pub flush_interval: std::time::Duration,
    pub enable_compression: bool,
    pub enable_edge_compression: bool,
    pub use_disk_backed_edges: bool,
    pub edge_cache_size: usize,
    pub bulk_import_mode: bool,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: data_dir.into(),
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            backend: Backend::Memory,
            enable_batching: false,
            batch_size: 100,
            flush_interval: std::time::Duration::from_millis(10),
            enable_compression: false,
            enable_edge_compression: false,
            use_disk_backed_edges: false,
            edge_cache_size: 1024,
            bulk_import_mode: false,
        }
    }
}
