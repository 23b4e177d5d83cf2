//! One function per subcommand. Database commands are generic over
//! [`GraphDriver`] and write their report to any [`Write`].

use std::io::{self, Write};
use std::process::ExitCode;

use serde::Serialize;
use tracing::{info, warn};

use graphiti_maint::driver::neo4j::Neo4jDriver;
use graphiti_maint::driver::{GraphDriver, MIGRATION_LOCK};
use graphiti_maint::embedder::openai::OpenAiEmbedder;
use graphiti_maint::index::{required_indexes, SimilarityFunction};
use graphiti_maint::inspect::inspect;
use graphiti_maint::llm_client::openai::OpenAiClient;
use graphiti_maint::migration::actions::{drop_indexes, ensure_indexes};
use graphiti_maint::migration::{ActionRecord, Migrator};
use graphiti_maint::probe::{probe_embedder, probe_llm, DEFAULT_COMPARE_TEXT, DEFAULT_LLM_PROMPT};
use graphiti_maint::{report, MaintConfig, MigrationConfig};

use crate::cli::{Command, ProbeTarget};

/// How a command ended, short of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Some operations failed and were skipped.
    Failures,
    /// The migration finished but the graph is still inconsistent.
    VerificationFailed,
}

impl Outcome {
    fn from_failures(count: usize) -> Self {
        if count == 0 {
            Outcome::Success
        } else {
            Outcome::Failures
        }
    }

    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failures => ExitCode::from(1),
            Outcome::VerificationFailed => ExitCode::from(2),
        }
    }
}

/// Run `command` against the configured Neo4j database or inference endpoint.
pub async fn run(command: Command, config: &MaintConfig, json: bool) -> anyhow::Result<Outcome> {
    let mut out = io::stdout().lock();
    if let Command::Probe { target } = command {
        return run_probe(target, config, json, &mut out).await;
    }

    let driver = Neo4jDriver::from_config(config).await?;
    let result = run_database(&driver, command, config, json, &mut out).await;
    if let Err(e) = driver.close().await {
        warn!(error = %e, "Failed to close driver");
    }
    result
}

pub async fn run_database<D: GraphDriver, W: Write>(
    driver: &D,
    command: Command,
    config: &MaintConfig,
    json: bool,
    out: &mut W,
) -> anyhow::Result<Outcome> {
    match command {
        Command::Inspect { target_dim } => {
            let target_dim = target_dim.unwrap_or(config.embedding_dim);
            let inspection = inspect(driver, target_dim, &[]).await?;
            emit(out, json, &inspection, |w| report::write_inspection(w, &inspection))?;
            Ok(Outcome::from_failures(inspection.failures().len()))
        }

        Command::Migrate {
            target_dim,
            batch_size,
            recreate_indexes,
            checkpoint,
            no_checkpoint,
            reset,
        } => {
            let mut migration = MigrationConfig::from(config);
            if let Some(dim) = target_dim {
                migration.target_dim = dim;
            }
            if let Some(size) = batch_size {
                migration.batch_size = size;
            }
            if no_checkpoint {
                migration.checkpoint_path = None;
            } else if let Some(path) = checkpoint {
                migration.checkpoint_path = Some(path);
            }
            migration.recreate_indexes = recreate_indexes;
            migration.reset = reset;

            let result = Migrator::new(driver, migration)?.run().await?;
            emit(out, json, &result, |w| report::write_migration(w, &result))?;
            if !result.verification.passed {
                Ok(Outcome::VerificationFailed)
            } else {
                Ok(Outcome::from_failures(result.failure_count()))
            }
        }

        Command::DropIndex { names } => {
            let records = drop_indexes(driver, &names).await?;
            emit_actions(out, json, "Drop indexes", &records)
        }

        Command::EnsureIndexes { dim } => {
            let specs = required_indexes(dim.unwrap_or(config.embedding_dim), SimilarityFunction::Cosine)?;
            let records = ensure_indexes(driver, &specs).await?;
            emit_actions(out, json, "Ensure indexes", &records)
        }

        Command::Unlock { holder } => {
            let holder = holder.unwrap_or_else(|| config.lock_holder.clone());
            let released = driver.release_lock(MIGRATION_LOCK, &holder).await?;
            info!(lock = MIGRATION_LOCK, holder = %holder, released, "Unlock");
            let status = UnlockStatus {
                lock: MIGRATION_LOCK,
                holder: &holder,
                released,
            };
            emit(out, json, &status, |w| {
                if released {
                    writeln!(w, "Released lock {MIGRATION_LOCK} held by {holder}.")
                } else {
                    writeln!(w, "Lock {MIGRATION_LOCK} is not held by {holder}; nothing released.")
                }
            })?;
            Ok(Outcome::Success)
        }

        Command::Probe { target } => run_probe(target, config, json, out).await,
    }
}

async fn run_probe<W: Write>(
    target: ProbeTarget,
    config: &MaintConfig,
    json: bool,
    out: &mut W,
) -> anyhow::Result<Outcome> {
    match target {
        ProbeTarget::Embedder { text } => {
            let embedder = OpenAiEmbedder::new(
                config.embedding_api_key.as_str(),
                config.embedding_model.as_str(),
                &config.embedding_base_url,
                Some(config.embedding_dim),
            )?;
            let compare = text.as_deref().unwrap_or(DEFAULT_COMPARE_TEXT);
            let probe = probe_embedder(&embedder, compare).await?;
            emit(out, json, &probe, |w| report::write_embedder_probe(w, &probe))?;
            Ok(if probe.passed() {
                Outcome::Success
            } else {
                Outcome::Failures
            })
        }
        ProbeTarget::Llm { prompt } => {
            let client = OpenAiClient::new(
                config.embedding_api_key.as_str(),
                config.llm_model.as_str(),
                &config.llm_base_url,
            );
            let prompt = prompt.as_deref().unwrap_or(DEFAULT_LLM_PROMPT);
            let probe = probe_llm(&client, prompt).await?;
            emit(out, json, &probe, |w| report::write_llm_probe(w, &probe))?;
            Ok(Outcome::Success)
        }
    }
}

#[derive(Serialize)]
struct UnlockStatus<'a> {
    lock: &'a str,
    holder: &'a str,
    released: bool,
}

fn emit<W, T, F>(out: &mut W, json: bool, value: &T, text: F) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&mut W) -> io::Result<()>,
{
    if json {
        report::write_json(out, value)
    } else {
        text(out)
    }
}

fn emit_actions<W: Write>(
    out: &mut W,
    json: bool,
    title: &str,
    records: &[ActionRecord],
) -> anyhow::Result<Outcome> {
    emit(out, json, &records, |w| report::write_actions(w, title, records))?;
    Ok(Outcome::from_failures(
        records.iter().filter(|r| r.is_failure()).count(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphiti_maint::driver::memory::{FailPoint, FailureKind, MemoryGraph};
    use graphiti_maint::index::{EntityType, IndexInfo, VectorProperty};
    use graphiti_maint::nodes::entity::EntityNode;

    fn config() -> MaintConfig {
        MaintConfig {
            neo4j_password: Some("secret".into()),
            embedding_dim: 4,
            batch_size: 2,
            checkpoint_path: None,
            ..MaintConfig::default()
        }
    }

    fn graph_with(dims: &[usize]) -> MemoryGraph {
        let graph = MemoryGraph::new();
        for (i, dim) in dims.iter().enumerate() {
            let node = EntityNode::new(format!("n{i}"), "g").with_embedding(vec![0.5; *dim]);
            graph.insert_entity(&node);
        }
        graph.add_index(IndexInfo {
            name: "entity_embedding".into(),
            index_type: "VECTOR".into(),
            state: "ONLINE".into(),
            entity_type: Some(EntityType::Node),
            labels_or_types: vec!["Entity".into()],
            properties: vec!["embedding".into()],
            dimensions: Some(3),
            similarity: Some("cosine".into()),
        });
        graph
    }

    async fn run_on(graph: &MemoryGraph, command: Command, json: bool) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = run_database(graph, command, &config(), json, &mut out)
            .await
            .unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    fn migrate() -> Command {
        Command::Migrate {
            target_dim: None,
            batch_size: None,
            recreate_indexes: false,
            checkpoint: None,
            no_checkpoint: true,
            reset: false,
        }
    }

    #[tokio::test]
    async fn inspect_renders_text() {
        let graph = graph_with(&[3, 3, 4]);
        let (outcome, text) = run_on(&graph, Command::Inspect { target_dim: None }, false).await;
        assert_eq!(outcome, Outcome::Success);
        assert!(text.contains("entity_embedding"));
        assert!(text.contains("STALE"));
    }

    #[tokio::test]
    async fn migrate_succeeds_then_inspect_is_clean() {
        let graph = graph_with(&[3, 3, 3, 4, 4]);
        let (outcome, text) = run_on(&graph, migrate(), false).await;
        assert_eq!(outcome, Outcome::Success);
        assert!(text.contains("Verification passed"));

        let (_, json) = run_on(&graph, Command::Inspect { target_dim: None }, true).await;
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["discovery"]["indexes"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn failed_clear_exits_with_verification_failure() {
        let graph = graph_with(&[3, 4]);
        graph.inject_failure(
            FailPoint::ClearVectors(VectorProperty::any_node("embedding")),
            FailureKind::Query,
        );
        graph.inject_failure(
            FailPoint::ClearVectors(VectorProperty::node("Entity", "embedding")),
            FailureKind::Query,
        );
        let (outcome, text) = run_on(&graph, migrate(), false).await;
        assert_eq!(outcome, Outcome::VerificationFailed);
        assert!(text.contains("Verification FAILED"));
        assert_eq!(outcome.exit_code(), ExitCode::from(2));
    }

    #[tokio::test]
    async fn drop_index_reports_absent_names() {
        let graph = graph_with(&[]);
        let command = Command::DropIndex {
            names: vec!["entity_embedding".into(), "missing".into()],
        };
        let (outcome, json) = run_on(&graph, command, true).await;
        assert_eq!(outcome, Outcome::Success);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["outcome"], "dropped");
        assert_eq!(value[1]["outcome"], "already_absent");
    }

    #[tokio::test]
    async fn ensure_indexes_flags_conflicts() {
        let graph = graph_with(&[]);
        let (outcome, text) = run_on(&graph, Command::EnsureIndexes { dim: None }, false).await;
        assert_eq!(outcome, Outcome::Failures);
        assert!(text.contains("CONFLICT: exists with 3d"));

        let fresh = graph_with(&[]);
        let (outcome, _) = run_on(&fresh, Command::EnsureIndexes { dim: Some(3) }, false).await;
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(fresh.index("edge_fact_embedding").unwrap().dimensions, Some(3));
    }

    #[tokio::test]
    async fn unlock_releases_only_matching_holder() {
        let graph = graph_with(&[]);
        graph.acquire_lock(MIGRATION_LOCK, "crashed-run").await.unwrap();

        let (_, text) = run_on(&graph, Command::Unlock { holder: None }, false).await;
        assert!(text.contains("not held by graphiti-maint"));
        assert!(graph.lock_holder(MIGRATION_LOCK).is_some());

        let command = Command::Unlock {
            holder: Some("crashed-run".into()),
        };
        let (outcome, json) = run_on(&graph, command, true).await;
        assert_eq!(outcome, Outcome::Success);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["released"], true);
        assert!(graph.lock_holder(MIGRATION_LOCK).is_none());
    }

    #[tokio::test]
    async fn lock_held_elsewhere_is_an_error() {
        let graph = graph_with(&[3]);
        graph.acquire_lock(MIGRATION_LOCK, "someone-else").await.unwrap();
        let mut out = Vec::new();
        let err = run_database(&graph, migrate(), &config(), false, &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("someone-else"));
        assert!(out.is_empty());
    }
}
