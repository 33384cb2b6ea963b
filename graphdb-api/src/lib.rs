//! Shared types, errors, and storage traits for the embeddable graph
//! database core: the `Value` model, the `Node`/`Edge` data
//! model, the crate-wide `Error` kinds, and the
//! `GraphBackend` trait the query engine and traverser run against.

mod error;
mod model;
mod traits;
mod value;

pub use error::{Error, Result};
pub use model::{Edge, EdgeId, Node, NodeId};
pub use traits::{Direction, GraphBackend, GraphWriter, Statistics};
pub use value::Value;
