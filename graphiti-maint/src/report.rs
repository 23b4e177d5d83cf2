//! Plain-text rendering of inspection, migration, index and probe results.
//!
//! Every renderer writes to any [`io::Write`]; the CLI passes stdout, tests
//! pass a `Vec<u8>`. [`write_json`] is the machine-readable alternative.

use std::io::{self, Write};

use serde::Serialize;

use crate::index::IndexInfo;
use crate::inspect::{Discovery, GraphStats, InspectionReport, QueryFailure};
use crate::migration::{ActionOutcome, ActionRecord, MigrationReport, StageStatus};
use crate::probe::{EmbedderProbe, LlmProbe};
use crate::utils::one_line;

/// Error messages are cut to this many characters.
const ERROR_WIDTH: usize = 160;

/// Pretty-printed JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(w: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)
}

pub fn write_inspection<W: Write>(w: &mut W, report: &InspectionReport) -> io::Result<()> {
    write_discovery(w, &report.discovery)?;
    if let Some(stats) = &report.stats {
        writeln!(w)?;
        write_stats(w, stats)?;
    }
    write_failures(w, report.failures())
}

pub fn write_discovery<W: Write>(w: &mut W, discovery: &Discovery) -> io::Result<()> {
    let target_dim = discovery.target_dim;
    writeln!(w, "Indexes ({}):", discovery.indexes.len())?;
    if discovery.indexes.is_empty() {
        writeln!(w, "  (none)")?;
    }
    for index in &discovery.indexes {
        writeln!(w, "  {}", index_line(index, target_dim))?;
    }

    writeln!(w)?;
    writeln!(w, "Vectors (target dimensionality {target_dim}):")?;
    for census in &discovery.census {
        if census.total() == 0 {
            writeln!(w, "  {:<32} none", census.target.to_string())?;
            continue;
        }
        let dims: Vec<String> = census
            .by_dimension
            .iter()
            .map(|(dim, count)| format!("{dim}d x {count}"))
            .collect();
        writeln!(
            w,
            "  {:<32} {} ({} matching, {} mismatched)",
            census.target.to_string(),
            dims.join(", "),
            census.matching(target_dim),
            census.mismatched(target_dim)
        )?;
    }
    Ok(())
}

fn index_line(index: &IndexInfo, target_dim: usize) -> String {
    let on = format!(
        "{}({})",
        index.labels_or_types.join("|"),
        index.properties.join(", ")
    );
    let mut line = format!("{:<28} {:<9} {:<8} {on}", index.name, index.index_type, index.state);
    if index.is_vector() {
        match index.dimensions {
            Some(d) => line.push_str(&format!(" {d}d")),
            None => line.push_str(" dims unknown"),
        }
        if let Some(sim) = &index.similarity {
            line.push_str(&format!(" {sim}"));
        }
        if index.is_stale(target_dim) {
            line.push_str("  STALE");
        }
    }
    line
}

pub fn write_stats<W: Write>(w: &mut W, stats: &GraphStats) -> io::Result<()> {
    writeln!(w, "Nodes: {}", stats.node_count)?;
    for (label, count) in &stats.nodes_by_label {
        writeln!(w, "  {label:<30} {count}")?;
    }
    writeln!(w, "Relationships: {}", stats.relationship_count)?;
    for (rel_type, count) in &stats.relationships_by_type {
        writeln!(w, "  {rel_type:<30} {count}")?;
    }
    if stats.duplicate_uuids.is_empty() {
        writeln!(w, "Duplicate uuids: none")?;
    } else {
        writeln!(w, "Duplicate uuids:")?;
        for dup in &stats.duplicate_uuids {
            writeln!(w, "  {} x {}", dup.uuid, dup.copies)?;
        }
    }
    Ok(())
}

fn write_failures<W: Write>(w: &mut W, failures: &[QueryFailure]) -> io::Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "Failed queries ({}):", failures.len())?;
    for failure in failures {
        writeln!(w, "  {}: {}", failure.operation, one_line(&failure.error, ERROR_WIDTH))?;
    }
    Ok(())
}

pub fn write_actions<W: Write>(w: &mut W, title: &str, actions: &[ActionRecord]) -> io::Result<()> {
    writeln!(w, "{title}:")?;
    if actions.is_empty() {
        writeln!(w, "  (nothing to do)")?;
    }
    for action in actions {
        writeln!(w, "  {:<32} {}", action.subject, outcome_text(&action.outcome))?;
    }
    Ok(())
}

fn outcome_text(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Dropped => "dropped".to_string(),
        ActionOutcome::AlreadyAbsent => "already absent".to_string(),
        ActionOutcome::Cleared { count } => format!("cleared {count}"),
        ActionOutcome::Created => "created".to_string(),
        ActionOutcome::AlreadyExists => "already exists".to_string(),
        ActionOutcome::Conflicting {
            dimensions: Some(d),
        } => format!("CONFLICT: exists with {d}d"),
        ActionOutcome::Conflicting { dimensions: None } => {
            "CONFLICT: exists with unknown dimensionality".to_string()
        }
        ActionOutcome::Skipped { reason } => format!("skipped ({reason})"),
        ActionOutcome::Failed { error } => format!("FAILED: {}", one_line(error, ERROR_WIDTH)),
    }
}

pub fn write_migration<W: Write>(w: &mut W, report: &MigrationReport) -> io::Result<()> {
    writeln!(
        w,
        "Migration to {}d{}",
        report.target_dim,
        if report.resumed { " (resumed)" } else { "" }
    )?;
    writeln!(w)?;
    for stage in &report.stages {
        let status = match stage.status {
            StageStatus::Completed => "completed",
            StageStatus::CompletedWithFailures => "completed with failures",
            StageStatus::Resumed => "already completed",
            StageStatus::NotRequested => "not requested",
        };
        writeln!(w, "[{}] {status}", stage.stage)?;
        for action in &stage.actions {
            writeln!(w, "  {:<32} {}", action.subject, outcome_text(&action.outcome))?;
        }
        for failure in &stage.failures {
            writeln!(
                w,
                "  {:<32} FAILED: {}",
                failure.operation,
                one_line(&failure.error, ERROR_WIDTH)
            )?;
        }
    }

    writeln!(w)?;
    let verification = &report.verification;
    if verification.passed {
        writeln!(
            w,
            "Verification passed: no stale indexes, every vector is {}d.",
            report.target_dim
        )?;
    } else {
        writeln!(w, "Verification FAILED:")?;
        for name in &verification.stale_indexes {
            writeln!(w, "  stale index {name}")?;
        }
        for remaining in &verification.mismatched {
            writeln!(
                w,
                "  {} still holds {} mismatched vectors",
                remaining.target, remaining.count
            )?;
        }
        for failure in &verification.failures {
            writeln!(w, "  {}: {}", failure.operation, one_line(&failure.error, ERROR_WIDTH))?;
        }
    }
    writeln!(
        w,
        "Cleared {} vectors; {} failed operations.",
        report.cleared_vectors(),
        report.failure_count()
    )
}

pub fn write_embedder_probe<W: Write>(w: &mut W, probe: &EmbedderProbe) -> io::Result<()> {
    writeln!(w, "Embedding model: {}", probe.model)?;
    writeln!(
        w,
        "Dimensions: {:?} (expected {}) {}",
        probe.returned_dims,
        probe.expected_dim,
        if probe.dimension_ok() { "OK" } else { "MISMATCH" }
    )?;
    let norms: Vec<String> = probe.norms.iter().map(|n| format!("{n:.4}")).collect();
    writeln!(w, "Norms: {}", norms.join(", "))?;
    match probe.similarity {
        Some(s) => writeln!(w, "Cosine similarity: {s:.4}")?,
        None => writeln!(w, "Cosine similarity: n/a")?,
    }
    if !probe.finite {
        writeln!(w, "Vectors contain NaN or infinite components")?;
    }
    writeln!(w, "Latency: {} ms", probe.latency_ms)
}

pub fn write_llm_probe<W: Write>(w: &mut W, probe: &LlmProbe) -> io::Result<()> {
    writeln!(w, "Model: {}", probe.model)?;
    writeln!(w, "Prompt: {}", probe.prompt)?;
    writeln!(w, "Reply: {}", probe.reply)?;
    writeln!(w, "Latency: {} ms", probe.latency_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{EntityType, VectorProperty};
    use crate::inspect::{DuplicateUuid, VectorCensus};

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn sample_discovery() -> Discovery {
        let mut census = VectorCensus::new(VectorProperty::node("Entity", "embedding"));
        census.record(768, 500);
        Discovery {
            target_dim: 1024,
            indexes: vec![IndexInfo {
                name: "entity_embedding".into(),
                index_type: "VECTOR".into(),
                state: "ONLINE".into(),
                entity_type: Some(EntityType::Node),
                labels_or_types: vec!["Entity".into()],
                properties: vec!["embedding".into()],
                dimensions: Some(768),
                similarity: Some("cosine".into()),
            }],
            targets: vec![census.target.clone()],
            census: vec![census],
            failures: vec![QueryFailure {
                operation: "census [*].embedding".into(),
                error: "Query error:\n  timeout".into(),
            }],
        }
    }

    #[test]
    fn inspection_lists_indexes_census_and_failures() {
        let report = InspectionReport {
            discovery: sample_discovery(),
            stats: Some(GraphStats {
                node_count: 500,
                duplicate_uuids: vec![DuplicateUuid {
                    uuid: "abc".into(),
                    copies: 2,
                }],
                ..GraphStats::default()
            }),
        };
        let text = render(|w| write_inspection(w, &report));
        assert!(text.contains("entity_embedding"));
        assert!(text.contains("768d cosine  STALE"));
        assert!(text.contains("768d x 500 (0 matching, 500 mismatched)"));
        assert!(text.contains("Nodes: 500"));
        assert!(text.contains("abc x 2"));
        assert!(text.contains("census [*].embedding: Query error: timeout"));
    }

    #[test]
    fn actions_render_each_outcome() {
        let text = render(|w| {
            write_actions(
                w,
                "Indexes",
                &[
                    ActionRecord::new("a", ActionOutcome::Dropped),
                    ActionRecord::new(
                        "b",
                        ActionOutcome::Conflicting {
                            dimensions: Some(768),
                        },
                    ),
                    ActionRecord::new(
                        "c",
                        ActionOutcome::Failed {
                            error: "boom".into(),
                        },
                    ),
                ],
            )
        });
        assert!(text.starts_with("Indexes:\n"));
        assert!(text.contains("dropped"));
        assert!(text.contains("CONFLICT: exists with 768d"));
        assert!(text.contains("FAILED: boom"));
    }

    #[test]
    fn json_output_ends_with_newline() {
        let text = render(|w| write_json(w, &sample_discovery()));
        assert!(text.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["target_dim"], 1024);
    }
}
