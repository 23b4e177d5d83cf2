//! Graph database driver abstraction.
//!
//! Defines the [`GraphDriver`] trait every backend implements, plus two
//! backends:
//! - [`neo4j::Neo4jDriver`] — Bolt connection to a live Neo4j
//! - [`memory::MemoryGraph`] — in-process store with injectable failures
//!
//! Every method issues its work and waits for it before returning; callers
//! never have two requests in flight on one driver.

pub mod memory;
pub mod neo4j;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::index::{CreateOutcome, DropOutcome, IndexInfo, VectorIndexSpec, VectorProperty};
use crate::inspect::{GraphStats, VectorCensus};

/// Name of the lock taken by migrations.
pub const MIGRATION_LOCK: &str = "vector-migration";

/// Result of trying to take a maintenance lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOutcome {
    /// Newly taken, or already held by the same holder.
    Acquired,
    HeldBy(String),
}

/// Trait representing a graph database backend.
#[allow(async_fn_in_trait)]
pub trait GraphDriver: Send + Sync {
    /// Verify connectivity to the database.
    async fn ping(&self) -> Result<()>;

    /// Close the connection pool / session.
    async fn close(&self) -> Result<()>;

    /// Every index in the database, vector or not.
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>>;

    /// Drop an index by name. Dropping an absent index is not an error.
    async fn drop_index(&self, name: &str) -> Result<DropOutcome>;

    /// Create a vector index unless one with the same name exists.
    async fn create_vector_index(&self, spec: &VectorIndexSpec) -> Result<CreateOutcome>;

    /// Count the vectors stored under `target`, grouped by length.
    async fn vector_census(&self, target: &VectorProperty) -> Result<VectorCensus>;

    /// Remove `target` from at most `limit` nodes/relationships whose vector
    /// length differs from `keep_dim`. Returns how many were cleared; zero
    /// means none are left.
    ///
    /// Implementations must re-check the length inside the write so vectors
    /// of length `keep_dim` are never removed.
    async fn clear_vector_batch(
        &self,
        target: &VectorProperty,
        keep_dim: usize,
        limit: usize,
    ) -> Result<u64>;

    /// Node/relationship counts and duplicated uuids.
    async fn graph_stats(&self) -> Result<GraphStats>;

    /// Take the advisory lock `name` for `holder`.
    async fn acquire_lock(&self, name: &str, holder: &str) -> Result<LockOutcome>;

    /// Release `name` if `holder` owns it. Returns whether a lock was released.
    async fn release_lock(&self, name: &str, holder: &str) -> Result<bool>;
}
