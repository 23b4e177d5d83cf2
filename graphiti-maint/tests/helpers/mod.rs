#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use graphiti_maint::driver::memory::MemoryGraph;
use graphiti_maint::index::{EntityType, IndexInfo, VectorProperty};
use graphiti_maint::nodes::entity::EntityNode;
use graphiti_maint::MigrationConfig;

pub const OLD_DIM: usize = 768;
pub const NEW_DIM: usize = 1024;

/// A vector index as `SHOW INDEXES` would report it.
pub fn vector_index(name: &str, target: &VectorProperty, dims: Option<usize>) -> IndexInfo {
    IndexInfo {
        name: name.to_string(),
        index_type: "VECTOR".to_string(),
        state: "ONLINE".to_string(),
        entity_type: Some(target.entity_type),
        labels_or_types: target.label_or_type.iter().cloned().collect(),
        properties: vec![target.property.clone()],
        dimensions: dims,
        similarity: Some("cosine".to_string()),
    }
}

pub fn range_index(name: &str, label: &str, property: &str) -> IndexInfo {
    IndexInfo {
        name: name.to_string(),
        index_type: "RANGE".to_string(),
        state: "ONLINE".to_string(),
        entity_type: Some(EntityType::Node),
        labels_or_types: vec![label.to_string()],
        properties: vec![property.to_string()],
        dimensions: None,
        similarity: None,
    }
}

pub fn entity_embedding() -> VectorProperty {
    VectorProperty::node("Entity", "embedding")
}

/// An entity with a summary and, when `dim` is set, an `embedding` of that length.
pub fn entity(i: usize, dim: Option<usize>) -> EntityNode {
    let node = EntityNode::new(format!("entity-{i}"), "test-group")
        .with_summary(format!("Entity number {i}."));
    match dim {
        Some(d) => node.with_embedding(vec![0.01 * (i % 7) as f32 + 0.1; d]),
        None => node,
    }
}

pub fn seed_entities(graph: &MemoryGraph, count: usize, dim: Option<usize>) -> Vec<EntityNode> {
    (0..count)
        .map(|i| {
            let node = entity(i, dim);
            graph.insert_entity(&node);
            node
        })
        .collect()
}

/// `count` entities with `dim`-length embeddings and one vector index at `dim`.
pub fn seeded_graph(count: usize, dim: usize) -> MemoryGraph {
    let graph = MemoryGraph::new();
    seed_entities(&graph, count, Some(dim));
    graph.add_index(vector_index("entity_embedding", &entity_embedding(), Some(dim)));
    graph
}

/// Temporary checkpoint location for one test.
pub struct TempCheckpoint {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TempCheckpoint {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp checkpoint dir");
        let path = dir.path().join("state").join("checkpoint.json");
        Self { dir, path }
    }

    pub fn config(&self, target_dim: usize) -> MigrationConfig {
        MigrationConfig {
            batch_size: 64,
            checkpoint_path: Some(self.path.clone()),
            lock_holder: "test-runner".to_string(),
            ..MigrationConfig::new(target_dim)
        }
    }
}
