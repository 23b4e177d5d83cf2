//! Edge types stored in a Graphiti graph.
//!
//! - [`entity::EntityEdge`] — `RELATES_TO` fact edges, the only edges carrying vectors

pub mod entity;
