use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "graphiti-maint")]
#[command(about = "Maintenance and migration tooling for a Graphiti knowledge graph on Neo4j")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print reports as JSON on stdout instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Neo4j URI (overrides NEO4J_URI)
    #[arg(long, global = true)]
    pub neo4j_uri: Option<String>,

    /// Neo4j database (overrides NEO4J_DATABASE)
    #[arg(long, global = true)]
    pub database: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List indexes, count stored vectors by dimensionality and summarize the graph
    Inspect {
        /// Dimensionality vectors are compared against (default: EMBEDDING_DIM)
        #[arg(long)]
        target_dim: Option<usize>,
    },

    /// Drop stale vector indexes and clear vectors of any other dimensionality
    Migrate {
        /// Dimensionality every stored vector must have afterwards (default: EMBEDDING_DIM)
        #[arg(long)]
        target_dim: Option<usize>,

        /// Maximum nodes or relationships cleared per write (default: MIGRATION_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Create the required vector indexes at the target dimensionality
        #[arg(long)]
        recreate_indexes: bool,

        /// Checkpoint file (default: MIGRATION_CHECKPOINT)
        #[arg(long, conflicts_with = "no_checkpoint")]
        checkpoint: Option<PathBuf>,

        /// Run without reading or writing a checkpoint
        #[arg(long)]
        no_checkpoint: bool,

        /// Discard an existing checkpoint and start over
        #[arg(long)]
        reset: bool,
    },

    /// Drop indexes by name; absent indexes are reported, not errors
    DropIndex {
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },

    /// Create the vector indexes Graphiti's search needs
    EnsureIndexes {
        /// Index dimensionality (default: EMBEDDING_DIM)
        #[arg(long)]
        dim: Option<usize>,
    },

    /// Release the migration lock left behind by an interrupted run
    Unlock {
        /// Holder recorded in the lock (default: MAINT_LOCK_HOLDER)
        #[arg(long)]
        holder: Option<String>,
    },

    /// Check the inference endpoints
    Probe {
        #[command(subcommand)]
        target: ProbeTarget,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProbeTarget {
    /// Embed two related texts and check dimensionality and similarity
    Embedder {
        /// Text compared against the built-in probe sentence
        #[arg(long)]
        text: Option<String>,
    },

    /// One chat completion round-trip
    Llm {
        #[arg(long)]
        prompt: Option<String>,
    },
}

impl Command {
    /// Whether the command talks to Neo4j.
    pub fn needs_database(&self) -> bool {
        !matches!(self, Command::Probe { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["graphiti-maint"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn migrate_flags() {
        let cli = parse(&[
            "migrate",
            "--target-dim",
            "1024",
            "--batch-size",
            "200",
            "--recreate-indexes",
            "--reset",
        ]);
        match cli.command {
            Command::Migrate {
                target_dim,
                batch_size,
                recreate_indexes,
                checkpoint,
                no_checkpoint,
                reset,
            } => {
                assert_eq!(target_dim, Some(1024));
                assert_eq!(batch_size, Some(200));
                assert!(recreate_indexes);
                assert!(checkpoint.is_none());
                assert!(!no_checkpoint);
                assert!(reset);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(!cli.json);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn checkpoint_and_no_checkpoint_conflict() {
        let err = Cli::try_parse_from([
            "graphiti-maint",
            "migrate",
            "--checkpoint",
            "x.json",
            "--no-checkpoint",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn drop_index_needs_a_name() {
        assert!(Cli::try_parse_from(["graphiti-maint", "drop-index"]).is_err());
        let cli = parse(&["drop-index", "a", "b", "--json"]);
        assert!(cli.json);
        match cli.command {
            Command::DropIndex { names } => assert_eq!(names, vec!["a", "b"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn probe_subcommands() {
        let cli = parse(&["--log-format", "text", "probe", "embedder", "--text", "hello"]);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(!cli.command.needs_database());
        assert!(matches!(
            cli.command,
            Command::Probe {
                target: ProbeTarget::Embedder { text: Some(ref t) }
            } if t == "hello"
        ));

        let cli = parse(&["probe", "llm"]);
        assert!(matches!(
            cli.command,
            Command::Probe {
                target: ProbeTarget::Llm { prompt: None }
            }
        ));
    }

    #[test]
    fn database_commands() {
        assert!(parse(&["inspect"]).command.needs_database());
        assert!(parse(&["unlock", "--holder", "ci"]).command.needs_database());
        assert!(parse(&["ensure-indexes", "--dim", "768"]).command.needs_database());
    }
}
