//! Single mutating operations and their recorded outcomes.
//!
//! Each function attempts one operation, turns a recoverable error into an
//! [`ActionOutcome::Failed`] record and returns fatal errors to the caller.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver::GraphDriver;
use crate::errors::{MaintError, Result};
use crate::index::{CreateOutcome, DropOutcome, VectorIndexSpec, VectorProperty};

/// What happened to one index or vector property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ActionOutcome {
    Dropped,
    AlreadyAbsent,
    Cleared { count: u64 },
    Created,
    AlreadyExists,
    /// An index with the same name exists at another dimensionality.
    Conflicting { dimensions: Option<usize> },
    Skipped { reason: String },
    Failed { error: String },
}

impl From<DropOutcome> for ActionOutcome {
    fn from(outcome: DropOutcome) -> Self {
        match outcome {
            DropOutcome::Dropped => ActionOutcome::Dropped,
            DropOutcome::AlreadyAbsent => ActionOutcome::AlreadyAbsent,
        }
    }
}

impl From<CreateOutcome> for ActionOutcome {
    fn from(outcome: CreateOutcome) -> Self {
        match outcome {
            CreateOutcome::Created => ActionOutcome::Created,
            CreateOutcome::AlreadyExists => ActionOutcome::AlreadyExists,
            CreateOutcome::Conflicting { dimensions } => ActionOutcome::Conflicting { dimensions },
        }
    }
}

/// One attempted operation: the index or vector property it touched, and
/// how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub subject: String,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}

impl ActionRecord {
    pub fn new(subject: impl Into<String>, outcome: ActionOutcome) -> Self {
        Self {
            subject: subject.into(),
            outcome,
        }
    }

    /// Failed outright, or left a conflicting index in place.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            ActionOutcome::Failed { .. } | ActionOutcome::Conflicting { .. }
        )
    }

    fn failed(subject: impl Into<String>, error: &MaintError) -> Self {
        Self::new(
            subject,
            ActionOutcome::Failed {
                error: error.to_string(),
            },
        )
    }
}

pub async fn drop_index<D: GraphDriver>(driver: &D, name: &str) -> Result<ActionRecord> {
    match driver.drop_index(name).await {
        Ok(outcome) => {
            match outcome {
                DropOutcome::Dropped => info!(index = name, "Dropped index"),
                DropOutcome::AlreadyAbsent => info!(index = name, "Index already absent"),
            }
            Ok(ActionRecord::new(name, outcome.into()))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(index = name, error = %e, "Failed to drop index, continuing");
            Ok(ActionRecord::failed(name, &e))
        }
    }
}

pub async fn create_index<D: GraphDriver>(
    driver: &D,
    spec: &VectorIndexSpec,
) -> Result<ActionRecord> {
    match driver.create_vector_index(spec).await {
        Ok(outcome) => {
            match outcome {
                CreateOutcome::Created => {
                    info!(index = %spec.name, dims = spec.dimensions, "Created vector index")
                }
                CreateOutcome::AlreadyExists => info!(index = %spec.name, "Index already exists"),
                CreateOutcome::Conflicting { dimensions } => warn!(
                    index = %spec.name,
                    existing = ?dimensions,
                    wanted = spec.dimensions,
                    "Index exists with another dimensionality"
                ),
            }
            Ok(ActionRecord::new(&spec.name, outcome.into()))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(index = %spec.name, error = %e, "Failed to create index, continuing");
            Ok(ActionRecord::failed(&spec.name, &e))
        }
    }
}

/// Clear every vector under `target` whose length is not `keep_dim`, at most
/// `batch_size` per write.
///
/// Stops after a batch that cleared fewer than `batch_size`. A recoverable
/// failure mid-way is recorded; batches already cleared stay cleared.
pub async fn clear_vectors<D: GraphDriver>(
    driver: &D,
    target: &VectorProperty,
    keep_dim: usize,
    batch_size: usize,
) -> Result<ActionRecord> {
    let subject = target.to_string();
    let mut total = 0u64;
    loop {
        match driver.clear_vector_batch(target, keep_dim, batch_size).await {
            Ok(cleared) => {
                total += cleared;
                debug!(target = %subject, cleared, total, "Batch cleared");
                if cleared < batch_size as u64 {
                    break;
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(target = %subject, cleared = total, error = %e, "Failed to clear vectors, continuing");
                return Ok(ActionRecord::failed(subject, &e));
            }
        }
    }
    if total > 0 {
        info!(target = %subject, cleared = total, "Cleared mismatched vectors");
    }
    Ok(ActionRecord::new(subject, ActionOutcome::Cleared { count: total }))
}

/// Drop each named index; one failure does not stop the rest.
pub async fn drop_indexes<D: GraphDriver>(driver: &D, names: &[String]) -> Result<Vec<ActionRecord>> {
    let mut records = Vec::with_capacity(names.len());
    for name in names {
        records.push(drop_index(driver, name).await?);
    }
    Ok(records)
}

/// Create each index unless present; one failure does not stop the rest.
pub async fn ensure_indexes<D: GraphDriver>(
    driver: &D,
    specs: &[VectorIndexSpec],
) -> Result<Vec<ActionRecord>> {
    let mut records = Vec::with_capacity(specs.len());
    for spec in specs {
        records.push(create_index(driver, spec).await?);
    }
    Ok(records)
}
