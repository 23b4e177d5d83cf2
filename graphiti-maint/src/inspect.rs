//! Read-only inspection of vector indexes, stored vectors and graph shape.
//!
//! [`discover`] is the part the migration reuses: indexes, the vector
//! properties worth scanning, and a dimensionality census of each one.
//! [`inspect`] adds graph statistics on top.
//!
//! Each query runs on its own. A recoverable failure is recorded as a
//! [`QueryFailure`] and the remaining queries still run; a fatal failure
//! (see [`MaintError::is_fatal`]) is returned immediately.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver::GraphDriver;
use crate::errors::{MaintError, Result};
use crate::index::{default_vector_properties, merge_targets, IndexInfo, VectorProperty};

/// How many duplicated uuids graph statistics list at most.
pub const DUPLICATE_UUID_LIMIT: usize = 10;

/// Vector lengths found under one vector property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorCensus {
    pub target: VectorProperty,
    /// Vector length → number of nodes/relationships. Values that are not
    /// lists are counted under length 0.
    pub by_dimension: BTreeMap<usize, u64>,
}

impl VectorCensus {
    pub fn new(target: VectorProperty) -> Self {
        Self {
            target,
            by_dimension: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, dim: usize, count: u64) {
        *self.by_dimension.entry(dim).or_insert(0) += count;
    }

    pub fn total(&self) -> u64 {
        self.by_dimension.values().sum()
    }

    pub fn matching(&self, target_dim: usize) -> u64 {
        self.by_dimension.get(&target_dim).copied().unwrap_or(0)
    }

    pub fn mismatched(&self, target_dim: usize) -> u64 {
        self.total() - self.matching(target_dim)
    }

    pub fn dimensions(&self) -> Vec<usize> {
        self.by_dimension.keys().copied().collect()
    }
}

/// A uuid stored on more than one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateUuid {
    pub uuid: String,
    pub copies: u64,
}

/// Counts over the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: u64,
    pub nodes_by_label: BTreeMap<String, u64>,
    pub relationship_count: u64,
    pub relationships_by_type: BTreeMap<String, u64>,
    /// At most [`DUPLICATE_UUID_LIMIT`] entries, most copies first.
    pub duplicate_uuids: Vec<DuplicateUuid>,
}

/// A query that failed without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub operation: String,
    pub error: String,
}

/// Indexes, scan targets and census for one target dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub target_dim: usize,
    pub indexes: Vec<IndexInfo>,
    pub targets: Vec<VectorProperty>,
    pub census: Vec<VectorCensus>,
    #[serde(default)]
    pub failures: Vec<QueryFailure>,
}

impl Discovery {
    pub fn vector_indexes(&self) -> impl Iterator<Item = &IndexInfo> {
        self.indexes.iter().filter(|idx| idx.is_vector())
    }

    /// Vector indexes built for another dimensionality.
    pub fn stale_indexes(&self) -> Vec<&IndexInfo> {
        self.indexes
            .iter()
            .filter(|idx| idx.is_stale(self.target_dim))
            .collect()
    }

    /// Vector indexes whose dimensionality the database did not report.
    pub fn unknown_dimension_indexes(&self) -> Vec<&IndexInfo> {
        self.vector_indexes()
            .filter(|idx| idx.dimensions.is_none())
            .collect()
    }

    /// Mismatched vectors summed per target.
    ///
    /// Targets overlap (`(*).embedding` also covers `(:Entity).embedding`),
    /// so a vector is counted once for every target that covers it. Zero
    /// still means no mismatched vector anywhere.
    pub fn mismatched_vectors(&self) -> u64 {
        self.census
            .iter()
            .map(|c| c.mismatched(self.target_dim))
            .sum()
    }

    /// Targets holding at least one mismatched vector.
    pub fn mismatched_targets(&self) -> Vec<&VectorProperty> {
        self.census
            .iter()
            .filter(|c| c.mismatched(self.target_dim) > 0)
            .map(|c| &c.target)
            .collect()
    }

    /// No stale index, no mismatched vector, and every query succeeded.
    pub fn is_consistent(&self) -> bool {
        self.failures.is_empty()
            && self.stale_indexes().is_empty()
            && self.mismatched_vectors() == 0
    }
}

/// Everything `inspect` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub discovery: Discovery,
    /// `None` when the statistics queries failed.
    pub stats: Option<GraphStats>,
}

impl InspectionReport {
    pub fn failures(&self) -> &[QueryFailure] {
        &self.discovery.failures
    }
}

/// List indexes and take a census of every vector property.
///
/// `base_targets` empty means [`default_vector_properties`]; the properties of
/// every discovered vector index are added either way.
pub async fn discover<D: GraphDriver>(
    driver: &D,
    target_dim: usize,
    base_targets: &[VectorProperty],
) -> Result<Discovery> {
    let mut failures = Vec::new();

    let indexes = recover(driver.list_indexes().await, "list indexes", &mut failures)?
        .unwrap_or_default();
    debug!(count = indexes.len(), "Listed indexes");

    let base = if base_targets.is_empty() {
        default_vector_properties()
    } else {
        base_targets.to_vec()
    };
    let targets = merge_targets(base, &indexes);

    let mut census = Vec::with_capacity(targets.len());
    for target in &targets {
        let operation = format!("census {target}");
        if let Some(c) = recover(driver.vector_census(target).await, &operation, &mut failures)? {
            debug!(
                target = %target,
                total = c.total(),
                mismatched = c.mismatched(target_dim),
                "Vector census"
            );
            census.push(c);
        }
    }

    let discovery = Discovery {
        target_dim,
        indexes,
        targets,
        census,
        failures,
    };
    info!(
        target_dim,
        vector_indexes = discovery.vector_indexes().count(),
        stale_indexes = discovery.stale_indexes().len(),
        mismatched_per_target = discovery.mismatched_vectors(),
        failures = discovery.failures.len(),
        "Discovery complete"
    );
    Ok(discovery)
}

/// Full read-only inspection: [`discover`] plus graph statistics.
pub async fn inspect<D: GraphDriver>(
    driver: &D,
    target_dim: usize,
    base_targets: &[VectorProperty],
) -> Result<InspectionReport> {
    let mut discovery = discover(driver, target_dim, base_targets).await?;
    let stats = recover(driver.graph_stats().await, "graph statistics", &mut discovery.failures)?;
    if let Some(stats) = &stats {
        info!(
            nodes = stats.node_count,
            relationships = stats.relationship_count,
            duplicate_uuids = stats.duplicate_uuids.len(),
            "Graph statistics"
        );
    }
    Ok(InspectionReport { discovery, stats })
}

/// Turn a recoverable error into a recorded failure; pass fatal ones through.
pub(crate) fn recover<T>(
    result: Result<T>,
    operation: &str,
    failures: &mut Vec<QueryFailure>,
) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(operation, error = %e, "Operation failed, continuing");
            failures.push(QueryFailure {
                operation: operation.to_string(),
                error: e.to_string(),
            });
            Ok(None)
        }
    }
}

impl From<(&str, &MaintError)> for QueryFailure {
    fn from((operation, error): (&str, &MaintError)) -> Self {
        Self {
            operation: operation.to_string(),
            error: error.to_string(),
        }
    }
}
