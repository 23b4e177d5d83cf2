//! In-process graph backend.
//!
//! Stores nodes, relationships, indexes and locks in `DashMap`s and applies
//! the same semantics as the Neo4j backend (non-list vectors count as length
//! 0, clearing re-checks the length of each vector it removes). Failures can
//! be injected per operation to exercise error handling.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use super::{GraphDriver, LockOutcome};
use crate::edges::entity::{EntityEdge, RELATES_TO};
use crate::errors::{MaintError, Result};
use crate::index::{
    CreateOutcome, DropOutcome, EntityType, IndexInfo, VectorIndexSpec, VectorProperty,
};
use crate::inspect::{DuplicateUuid, GraphStats, VectorCensus, DUPLICATE_UUID_LIMIT};
use crate::nodes::entity::EntityNode;
use crate::nodes::{vector_len, vector_to_value, Properties};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub id: u64,
    pub labels: Vec<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRelationship {
    pub id: u64,
    pub rel_type: String,
    pub source: u64,
    pub target: u64,
    pub properties: Properties,
}

/// Operation at which an injected failure fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Ping,
    ListIndexes,
    DropIndex(String),
    CreateIndex(String),
    Census(VectorProperty),
    ClearVectors(VectorProperty),
    GraphStats,
    Lock,
}

/// Error raised by an injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Recoverable [`MaintError::Query`].
    Query,
    /// Fatal [`MaintError::Connection`].
    Connection,
}

/// A node property write applied in the middle of a clearing batch.
#[derive(Debug, Clone)]
struct InterleavedWrite {
    node: u64,
    property: String,
    vector: Vec<f32>,
}

/// In-memory [`GraphDriver`].
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: DashMap<u64, StoredNode>,
    relationships: DashMap<u64, StoredRelationship>,
    indexes: DashMap<String, IndexInfo>,
    locks: DashMap<String, String>,
    failures: DashMap<FailPoint, FailureKind>,
    interleaved: DashMap<VectorProperty, Vec<InterleavedWrite>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert a node with arbitrary labels and properties; returns its id.
    pub fn insert_node(&self, labels: Vec<String>, properties: Properties) -> u64 {
        let id = self.allocate_id();
        self.nodes.insert(
            id,
            StoredNode {
                id,
                labels,
                properties,
            },
        );
        id
    }

    pub fn insert_entity(&self, node: &EntityNode) -> u64 {
        self.insert_node(node.all_labels(), node.to_properties())
    }

    /// Insert a relationship between two existing nodes; returns its id.
    pub fn insert_relationship(
        &self,
        rel_type: impl Into<String>,
        source: u64,
        target: u64,
        properties: Properties,
    ) -> Result<u64> {
        for endpoint in [source, target] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(MaintError::Validation(format!("no node with id {endpoint}")));
            }
        }
        let id = self.allocate_id();
        self.relationships.insert(
            id,
            StoredRelationship {
                id,
                rel_type: rel_type.into(),
                source,
                target,
                properties,
            },
        );
        Ok(id)
    }

    /// Insert a `RELATES_TO` edge between the nodes holding its endpoint uuids.
    pub fn insert_edge(&self, edge: &EntityEdge) -> Result<u64> {
        let source = self.node_id_by_uuid(&edge.source_node_uuid.to_string())?;
        let target = self.node_id_by_uuid(&edge.target_node_uuid.to_string())?;
        self.insert_relationship(RELATES_TO, source, target, edge.to_properties())
    }

    fn node_id_by_uuid(&self, uuid: &str) -> Result<u64> {
        self.nodes
            .iter()
            .find(|n| n.properties.get("uuid").and_then(Value::as_str) == Some(uuid))
            .map(|n| n.id)
            .ok_or_else(|| MaintError::Validation(format!("no node with uuid {uuid}")))
    }

    /// Register an index as if the database reported it.
    pub fn add_index(&self, index: IndexInfo) {
        self.indexes.insert(index.name.clone(), index);
    }

    pub fn index(&self, name: &str) -> Option<IndexInfo> {
        self.indexes.get(name).map(|i| i.clone())
    }

    pub fn node(&self, id: u64) -> Option<StoredNode> {
        self.nodes.get(&id).map(|n| n.clone())
    }

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> Vec<StoredNode> {
        let mut nodes: Vec<StoredNode> = self.nodes.iter().map(|n| n.clone()).collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    /// All relationships, ordered by id.
    pub fn relationships(&self) -> Vec<StoredRelationship> {
        let mut rels: Vec<StoredRelationship> =
            self.relationships.iter().map(|r| r.clone()).collect();
        rels.sort_by_key(|r| r.id);
        rels
    }

    /// Decode every node labelled `Entity`.
    pub fn entities(&self) -> Result<Vec<EntityNode>> {
        self.nodes()
            .iter()
            .filter(|n| n.labels.iter().any(|l| l == crate::nodes::entity::ENTITY_LABEL))
            .map(|n| EntityNode::from_properties(&n.labels, &n.properties))
            .collect()
    }

    /// Decode every `RELATES_TO` relationship.
    pub fn edges(&self) -> Result<Vec<EntityEdge>> {
        self.relationships()
            .iter()
            .filter(|r| r.rel_type == RELATES_TO)
            .map(|r| {
                let source = self.endpoint_uuid(r.source)?;
                let target = self.endpoint_uuid(r.target)?;
                EntityEdge::from_properties(source, target, &r.properties)
            })
            .collect()
    }

    fn endpoint_uuid(&self, id: u64) -> Result<uuid::Uuid> {
        let node = self
            .node(id)
            .ok_or_else(|| MaintError::DataShape(format!("dangling endpoint {id}")))?;
        crate::nodes::required_uuid(&node.properties, "uuid")
    }

    /// Current holder of lock `name`.
    pub fn lock_holder(&self, name: &str) -> Option<String> {
        self.locks.get(name).map(|h| h.clone())
    }

    /// Make every later call reaching `point` fail with `kind`, until cleared.
    pub fn inject_failure(&self, point: FailPoint, kind: FailureKind) {
        self.failures.insert(point, kind);
    }

    /// Stand in for another writer: the next `clear_vector_batch` on `target`
    /// sets `property` of `node` to `vector` after choosing its candidates and
    /// before removing any of them. Fires once.
    pub fn write_during_clear(
        &self,
        target: VectorProperty,
        node: u64,
        property: impl Into<String>,
        vector: Vec<f32>,
    ) {
        self.interleaved.entry(target).or_default().push(InterleavedWrite {
            node,
            property: property.into(),
            vector,
        });
    }

    fn apply_interleaved_writes(&self, target: &VectorProperty) {
        let Some((_, writes)) = self.interleaved.remove(target) else {
            return;
        };
        for write in writes {
            if let Some(mut node) = self.nodes.get_mut(&write.node) {
                node.properties
                    .insert(write.property, vector_to_value(&write.vector));
            }
        }
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.is_closed() {
            return Err(MaintError::Connection("driver is closed".to_string()));
        }
        match self.failures.get(&point).map(|k| *k) {
            None => Ok(()),
            Some(FailureKind::Query) => {
                Err(MaintError::Query(format!("injected failure at {point:?}")))
            }
            Some(FailureKind::Connection) => Err(MaintError::Connection(format!(
                "injected connection loss at {point:?}"
            ))),
        }
    }

    /// Ids of the nodes or relationships in scope for `target` with a vector
    /// whose length differs from `keep_dim`.
    fn mismatched_ids(&self, target: &VectorProperty, keep_dim: usize) -> Vec<u64> {
        let mismatched = |props: &Properties| {
            matches!(vector_len(props, &target.property), Some(d) if d != keep_dim)
        };
        let mut ids: Vec<u64> = match target.entity_type {
            EntityType::Node => self
                .nodes
                .iter()
                .filter(|n| target.matches(n.labels.as_slice()) && mismatched(&n.properties))
                .map(|n| n.id)
                .collect(),
            EntityType::Relationship => self
                .relationships
                .iter()
                .filter(|r| target.matches(&[r.rel_type.as_str()]) && mismatched(&r.properties))
                .map(|r| r.id)
                .collect(),
        };
        ids.sort_unstable();
        ids
    }
}

impl GraphDriver for MemoryGraph {
    async fn ping(&self) -> Result<()> {
        self.check(FailPoint::Ping)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        self.check(FailPoint::ListIndexes)?;
        let mut indexes: Vec<IndexInfo> = self.indexes.iter().map(|i| i.clone()).collect();
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    async fn drop_index(&self, name: &str) -> Result<DropOutcome> {
        self.check(FailPoint::DropIndex(name.to_string()))?;
        Ok(match self.indexes.remove(name) {
            Some(_) => DropOutcome::Dropped,
            None => DropOutcome::AlreadyAbsent,
        })
    }

    async fn create_vector_index(&self, spec: &VectorIndexSpec) -> Result<CreateOutcome> {
        self.check(FailPoint::CreateIndex(spec.name.clone()))?;
        if let Some(existing) = self.indexes.get(&spec.name) {
            return Ok(if existing.dimensions == Some(spec.dimensions) {
                CreateOutcome::AlreadyExists
            } else {
                CreateOutcome::Conflicting {
                    dimensions: existing.dimensions,
                }
            });
        }
        self.add_index(IndexInfo {
            name: spec.name.clone(),
            index_type: "VECTOR".to_string(),
            state: "ONLINE".to_string(),
            entity_type: Some(spec.target.entity_type),
            labels_or_types: vec![spec.label_or_type().to_string()],
            properties: vec![spec.target.property.clone()],
            dimensions: Some(spec.dimensions),
            similarity: Some(spec.similarity.as_str().to_string()),
        });
        Ok(CreateOutcome::Created)
    }

    async fn vector_census(&self, target: &VectorProperty) -> Result<VectorCensus> {
        self.check(FailPoint::Census(target.clone()))?;
        let mut census = VectorCensus::new(target.clone());
        match target.entity_type {
            EntityType::Node => {
                for node in self.nodes.iter().filter(|n| target.matches(n.labels.as_slice())) {
                    if let Some(dim) = vector_len(&node.properties, &target.property) {
                        census.record(dim, 1);
                    }
                }
            }
            EntityType::Relationship => {
                for rel in self.relationships.iter().filter(|r| target.matches(&[r.rel_type.as_str()])) {
                    if let Some(dim) = vector_len(&rel.properties, &target.property) {
                        census.record(dim, 1);
                    }
                }
            }
        }
        Ok(census)
    }

    async fn clear_vector_batch(
        &self,
        target: &VectorProperty,
        keep_dim: usize,
        limit: usize,
    ) -> Result<u64> {
        self.check(FailPoint::ClearVectors(target.clone()))?;
        let still_mismatched =
            |props: &Properties| matches!(vector_len(props, &target.property), Some(d) if d != keep_dim);

        let candidates: Vec<u64> = self
            .mismatched_ids(target, keep_dim)
            .into_iter()
            .take(limit)
            .collect();
        self.apply_interleaved_writes(target);

        let mut cleared = 0;
        for id in candidates {
            let removed = match target.entity_type {
                EntityType::Node => self.nodes.get_mut(&id).map(|mut n| {
                    still_mismatched(&n.properties) && n.properties.remove(&target.property).is_some()
                }),
                EntityType::Relationship => self.relationships.get_mut(&id).map(|mut r| {
                    still_mismatched(&r.properties) && r.properties.remove(&target.property).is_some()
                }),
            };
            if removed == Some(true) {
                cleared += 1;
            }
        }
        debug!(target = %target, cleared, "Cleared vector batch");
        Ok(cleared)
    }

    async fn graph_stats(&self) -> Result<GraphStats> {
        self.check(FailPoint::GraphStats)?;
        let mut stats = GraphStats {
            node_count: self.nodes.len() as u64,
            relationship_count: self.relationships.len() as u64,
            ..GraphStats::default()
        };

        let mut uuid_copies = std::collections::BTreeMap::<String, u64>::new();
        for node in self.nodes.iter() {
            for label in &node.labels {
                *stats.nodes_by_label.entry(label.clone()).or_insert(0) += 1;
            }
            match node.properties.get("uuid") {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => *uuid_copies.entry(s.clone()).or_insert(0) += 1,
                Some(other) => *uuid_copies.entry(other.to_string()).or_insert(0) += 1,
            }
        }
        for rel in self.relationships.iter() {
            *stats.relationships_by_type.entry(rel.rel_type.clone()).or_insert(0) += 1;
        }

        let mut duplicates: Vec<DuplicateUuid> = uuid_copies
            .into_iter()
            .filter(|(_, copies)| *copies > 1)
            .map(|(uuid, copies)| DuplicateUuid { uuid, copies })
            .collect();
        duplicates.sort_by(|a, b| b.copies.cmp(&a.copies).then_with(|| a.uuid.cmp(&b.uuid)));
        duplicates.truncate(DUPLICATE_UUID_LIMIT);
        stats.duplicate_uuids = duplicates;
        Ok(stats)
    }

    async fn acquire_lock(&self, name: &str, holder: &str) -> Result<LockOutcome> {
        self.check(FailPoint::Lock)?;
        let current = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| holder.to_string())
            .clone();
        Ok(if current == holder {
            LockOutcome::Acquired
        } else {
            LockOutcome::HeldBy(current)
        })
    }

    async fn release_lock(&self, name: &str, holder: &str) -> Result<bool> {
        self.check(FailPoint::Lock)?;
        Ok(self.locks.remove_if(name, |_, h| h == holder).is_some())
    }
}
