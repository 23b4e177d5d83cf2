//! Embedding-dimension migration.
//!
//! Moves a graph from one embedding dimensionality to another through the
//! stages of [`Stage`]:
//!
//! 1. **Discover** — list indexes, derive vector properties, take a census
//! 2. **DropIndexes** — drop vector indexes built for another dimensionality
//! 3. **ClearVectors** — remove vectors of any other length, in batches
//! 4. **CreateIndexes** — optionally create the required indexes at the target
//! 5. **Verify** — rediscover and expect nothing stale or mismatched
//!
//! The run holds the advisory maintenance lock for its whole duration. After
//! each stage that finished without failures a [`Checkpoint`] is written; a
//! run interrupted by a fatal error resumes after the last recorded stage.
//! Once Verify has run the checkpoint is deleted. There is no rollback.

pub mod actions;
pub mod checkpoint;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use actions::{ActionOutcome, ActionRecord};
pub use checkpoint::Checkpoint;

use crate::driver::{GraphDriver, LockOutcome, MIGRATION_LOCK};
use crate::errors::{MaintError, Result};
use crate::index::{required_indexes, VectorProperty};
use crate::inspect::{discover, Discovery, QueryFailure};
use crate::types::MigrationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    DropIndexes,
    ClearVectors,
    CreateIndexes,
    Verify,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Discover,
        Stage::DropIndexes,
        Stage::ClearVectors,
        Stage::CreateIndexes,
        Stage::Verify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::DropIndexes => "drop_indexes",
            Stage::ClearVectors => "clear_vectors",
            Stage::CreateIndexes => "create_indexes",
            Stage::Verify => "verify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    CompletedWithFailures,
    /// Recorded as completed by a previous run's checkpoint.
    Resumed,
    /// Optional stage not enabled for this run.
    NotRequested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub actions: Vec<ActionRecord>,
    /// Read queries that failed during the stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<QueryFailure>,
}

impl StageReport {
    fn new(stage: Stage, actions: Vec<ActionRecord>, failures: Vec<QueryFailure>) -> Self {
        let clean = failures.is_empty() && actions.iter().all(|a| !a.is_failure());
        Self {
            stage,
            status: if clean {
                StageStatus::Completed
            } else {
                StageStatus::CompletedWithFailures
            },
            actions,
            failures,
        }
    }

    fn with_status(stage: Stage, status: StageStatus) -> Self {
        Self {
            stage,
            status,
            actions: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len() + self.actions.iter().filter(|a| a.is_failure()).count()
    }
}

/// Mismatched vectors remaining under one property after the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    pub target: VectorProperty,
    pub count: u64,
}

/// Outcome of the Verify stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub passed: bool,
    /// Names of vector indexes still at another dimensionality.
    pub stale_indexes: Vec<String>,
    pub mismatched: Vec<Remaining>,
    pub failures: Vec<QueryFailure>,
}

impl Verification {
    pub fn from_discovery(discovery: &Discovery) -> Self {
        Self {
            passed: discovery.is_consistent(),
            stale_indexes: discovery
                .stale_indexes()
                .iter()
                .map(|idx| idx.name.clone())
                .collect(),
            mismatched: discovery
                .census
                .iter()
                .filter(|c| c.mismatched(discovery.target_dim) > 0)
                .map(|c| Remaining {
                    target: c.target.clone(),
                    count: c.mismatched(discovery.target_dim),
                })
                .collect(),
            failures: discovery.failures.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub target_dim: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Whether the run continued from a checkpoint.
    pub resumed: bool,
    /// The discovery ClearVectors and DropIndexes acted on.
    pub discovery: Discovery,
    pub stages: Vec<StageReport>,
    pub verification: Verification,
}

impl MigrationReport {
    /// Failed operations over all stages, Verify excluded.
    pub fn failure_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.stage != Stage::Verify)
            .map(StageReport::failure_count)
            .sum()
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Cleared vector count over all ClearVectors actions.
    pub fn cleared_vectors(&self) -> u64 {
        self.stage(Stage::ClearVectors)
            .map(|s| {
                s.actions
                    .iter()
                    .filter_map(|a| match a.outcome {
                        ActionOutcome::Cleared { count } => Some(count),
                        _ => None,
                    })
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn succeeded(&self) -> bool {
        self.verification.passed && self.failure_count() == 0
    }
}

/// Runs one migration against a driver.
pub struct Migrator<'a, D: GraphDriver> {
    driver: &'a D,
    config: MigrationConfig,
}

impl<'a, D: GraphDriver> Migrator<'a, D> {
    /// # Errors
    /// [`MaintError::Validation`] when `config` is invalid.
    pub fn new(driver: &'a D, config: MigrationConfig) -> Result<Self> {
        config.check()?;
        Ok(Self { driver, config })
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run every stage under the maintenance lock.
    ///
    /// Returns `Err` only for fatal errors (connection loss, a lock held by
    /// someone else) and checkpoint problems; everything else ends up in the
    /// report.
    pub async fn run(&self) -> Result<MigrationReport> {
        let holder = &self.config.lock_holder;
        match self.driver.acquire_lock(MIGRATION_LOCK, holder).await? {
            LockOutcome::Acquired => info!(lock = MIGRATION_LOCK, holder = %holder, "Lock acquired"),
            LockOutcome::HeldBy(other) => {
                return Err(MaintError::Locked {
                    name: MIGRATION_LOCK.to_string(),
                    holder: other,
                })
            }
        }

        let result = self.run_locked().await;

        match self.driver.release_lock(MIGRATION_LOCK, holder).await {
            Ok(true) => info!(lock = MIGRATION_LOCK, "Lock released"),
            Ok(false) => warn!(lock = MIGRATION_LOCK, holder = %holder, "Lock was not held on release"),
            Err(e) => warn!(lock = MIGRATION_LOCK, error = %e, "Failed to release lock"),
        }
        result
    }

    async fn run_locked(&self) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let target_dim = self.config.target_dim;
        let mut checkpoint = self.load_checkpoint().await?;
        let resumed = !checkpoint.completed.is_empty();
        if resumed {
            info!(completed = ?checkpoint.completed, "Resuming from checkpoint");
        }
        // Only an unbroken prefix of clean stages is checkpointed.
        let mut clean_so_far = true;
        let mut stages = Vec::with_capacity(Stage::ALL.len());

        info!(stage = %Stage::Discover, target_dim, "Stage started");
        let discovery = match checkpoint.discovery.clone() {
            Some(discovery) if checkpoint.is_completed(Stage::Discover) => {
                stages.push(StageReport::with_status(Stage::Discover, StageStatus::Resumed));
                discovery
            }
            _ => {
                let discovery = discover(self.driver, target_dim, &self.config.targets).await?;
                let report =
                    StageReport::new(Stage::Discover, Vec::new(), discovery.failures.clone());
                checkpoint.discovery = Some(discovery.clone());
                self.finish_stage(report, &mut stages, &mut checkpoint, &mut clean_so_far)
                    .await?;
                discovery
            }
        };

        self.run_stage(Stage::DropIndexes, &mut stages, &mut checkpoint, &mut clean_so_far, || {
            self.drop_stale_indexes(&discovery)
        })
        .await?;

        self.run_stage(Stage::ClearVectors, &mut stages, &mut checkpoint, &mut clean_so_far, || {
            self.clear_mismatched_vectors(&discovery)
        })
        .await?;

        if self.config.recreate_indexes {
            self.run_stage(Stage::CreateIndexes, &mut stages, &mut checkpoint, &mut clean_so_far, || {
                self.create_required_indexes()
            })
            .await?;
        } else {
            stages.push(StageReport::with_status(
                Stage::CreateIndexes,
                StageStatus::NotRequested,
            ));
        }

        info!(stage = %Stage::Verify, "Stage started");
        // Rescan everything the first discovery covered, including properties
        // whose index was dropped, plus any index created since.
        let after = discover(self.driver, target_dim, &discovery.targets).await?;
        let verification = Verification::from_discovery(&after);
        stages.push(StageReport::new(Stage::Verify, Vec::new(), after.failures.clone()));
        if let Some(path) = &self.config.checkpoint_path {
            Checkpoint::remove(path).await?;
        }

        let report = MigrationReport {
            target_dim,
            started_at,
            finished_at: Utc::now(),
            resumed,
            discovery,
            stages,
            verification,
        };
        if report.verification.passed {
            info!(
                cleared = report.cleared_vectors(),
                failures = report.failure_count(),
                "Migration verified"
            );
        } else {
            warn!(
                stale_indexes = ?report.verification.stale_indexes,
                mismatched = report.verification.mismatched.len(),
                "Migration verification failed"
            );
        }
        Ok(report)
    }

    async fn run_stage<F, Fut>(
        &self,
        stage: Stage,
        stages: &mut Vec<StageReport>,
        checkpoint: &mut Checkpoint,
        clean_so_far: &mut bool,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<ActionRecord>>>,
    {
        if checkpoint.is_completed(stage) {
            info!(stage = %stage, "Stage already completed, skipping");
            stages.push(StageReport::with_status(stage, StageStatus::Resumed));
            return Ok(());
        }
        info!(stage = %stage, "Stage started");
        let actions = body().await?;
        let report = StageReport::new(stage, actions, Vec::new());
        self.finish_stage(report, stages, checkpoint, clean_so_far).await
    }

    async fn finish_stage(
        &self,
        report: StageReport,
        stages: &mut Vec<StageReport>,
        checkpoint: &mut Checkpoint,
        clean_so_far: &mut bool,
    ) -> Result<()> {
        let failures = report.failure_count();
        if failures == 0 {
            info!(stage = %report.stage, "Stage completed");
        } else {
            warn!(stage = %report.stage, failures, "Stage completed with failures");
            *clean_so_far = false;
        }
        if *clean_so_far {
            checkpoint.mark_completed(report.stage);
            if let Some(path) = &self.config.checkpoint_path {
                checkpoint.save(path).await?;
            }
        }
        stages.push(report);
        Ok(())
    }

    async fn load_checkpoint(&self) -> Result<Checkpoint> {
        let target_dim = self.config.target_dim;
        let Some(path) = &self.config.checkpoint_path else {
            return Ok(Checkpoint::new(target_dim));
        };
        if self.config.reset {
            Checkpoint::remove(path).await?;
            return Ok(Checkpoint::new(target_dim));
        }
        match Checkpoint::load(path).await? {
            None => Ok(Checkpoint::new(target_dim)),
            Some(existing) if existing.target_dim != target_dim => {
                Err(MaintError::Checkpoint(format!(
                    "{} was recorded for dimensionality {}, not {target_dim}; rerun with reset to discard it",
                    path.display(),
                    existing.target_dim
                )))
            }
            Some(existing) => Ok(existing),
        }
    }

    async fn drop_stale_indexes(&self, discovery: &Discovery) -> Result<Vec<ActionRecord>> {
        let mut records = Vec::new();
        for index in discovery.unknown_dimension_indexes() {
            warn!(index = %index.name, "Vector index has unknown dimensionality, leaving it");
            records.push(ActionRecord::new(
                &index.name,
                ActionOutcome::Skipped {
                    reason: "dimensionality unknown".to_string(),
                },
            ));
        }
        for index in discovery.stale_indexes() {
            records.push(actions::drop_index(self.driver, &index.name).await?);
        }
        Ok(records)
    }

    async fn clear_mismatched_vectors(&self, discovery: &Discovery) -> Result<Vec<ActionRecord>> {
        let mut records = Vec::with_capacity(discovery.targets.len());
        for target in &discovery.targets {
            records.push(
                actions::clear_vectors(
                    self.driver,
                    target,
                    self.config.target_dim,
                    self.config.batch_size,
                )
                .await?,
            );
        }
        Ok(records)
    }

    async fn create_required_indexes(&self) -> Result<Vec<ActionRecord>> {
        let specs = required_indexes(self.config.target_dim, self.config.similarity)?;
        actions::ensure_indexes(self.driver, &specs).await
    }
}
