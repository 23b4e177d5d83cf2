//! Configuration shared by every command.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::{MaintError, Result};
use crate::index::{SimilarityFunction, VectorProperty};

pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_NEO4J_DATABASE: &str = "neo4j";
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "mxbai-embed-large";
pub const DEFAULT_LLM_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_CHECKPOINT_PATH: &str = ".graphiti-maint/checkpoint.json";
pub const DEFAULT_LOCK_HOLDER: &str = "graphiti-maint";

/// Env files read before the process environment, in order. Values already
/// present in the environment are never overwritten.
const ENV_FILES: &[&str] = &[".env.graphiti", ".env"];

/// Central configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MaintConfig {
    /// Neo4j connection URI (e.g. `bolt://localhost:7687`).
    #[validate(length(min = 1))]
    pub neo4j_uri: String,

    #[validate(length(min = 1))]
    pub neo4j_user: String,

    /// Only commands that touch the database require it.
    #[serde(skip_serializing, default)]
    #[validate(length(min = 1))]
    pub neo4j_password: Option<String>,

    #[validate(length(min = 1))]
    pub neo4j_database: String,

    /// Target embedding dimensionality.
    #[validate(range(min = 1, max = 65536))]
    pub embedding_dim: usize,

    /// OpenAI-compatible base URL of the embedding endpoint.
    #[validate(length(min = 1))]
    pub embedding_base_url: String,

    pub embedding_model: String,

    #[serde(skip_serializing, default)]
    pub embedding_api_key: String,

    #[validate(length(min = 1))]
    pub llm_base_url: String,

    pub llm_model: String,

    /// Maximum nodes/edges cleared per write transaction.
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Where migration checkpoints are written; `None` disables checkpointing.
    pub checkpoint_path: Option<PathBuf>,

    /// Identity recorded in the maintenance lock.
    #[validate(length(min = 1))]
    pub lock_holder: String,
}

impl Default for MaintConfig {
    fn default() -> Self {
        Self {
            neo4j_uri: DEFAULT_NEO4J_URI.to_string(),
            neo4j_user: "neo4j".to_string(),
            neo4j_password: None,
            neo4j_database: DEFAULT_NEO4J_DATABASE.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            embedding_base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_api_key: "ollama".to_string(),
            llm_base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint_path: Some(PathBuf::from(DEFAULT_CHECKPOINT_PATH)),
            lock_holder: DEFAULT_LOCK_HOLDER.to_string(),
        }
    }
}

impl MaintConfig {
    /// Load configuration from env files and the process environment.
    ///
    /// Calls `dotenvy` on `.env.graphiti` and `.env` first (non-fatal if
    /// absent), then reads each variable.
    pub fn from_env() -> Result<Self> {
        for file in ENV_FILES {
            dotenvy::from_filename(file).ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Unset variables take their defaults. Numeric variables that fail to
    /// parse, and values that fail validation, return
    /// [`MaintError::Validation`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let embedding_base_url =
            lookup("EMBEDDING_BASE_URL").unwrap_or(defaults.embedding_base_url);
        let llm_base_url = lookup("LLM_BASE_URL").unwrap_or_else(|| embedding_base_url.clone());

        // An explicitly empty MIGRATION_CHECKPOINT disables checkpointing.
        let checkpoint_path = match lookup("MIGRATION_CHECKPOINT") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => defaults.checkpoint_path,
        };

        let config = Self {
            neo4j_uri: lookup("NEO4J_URI").unwrap_or(defaults.neo4j_uri),
            neo4j_user: lookup("NEO4J_USER").unwrap_or(defaults.neo4j_user),
            neo4j_password: lookup("NEO4J_PASSWORD"),
            neo4j_database: lookup("NEO4J_DATABASE").unwrap_or(defaults.neo4j_database),
            embedding_dim: parse_usize(&lookup, "EMBEDDING_DIM", defaults.embedding_dim)?,
            embedding_base_url,
            embedding_model: lookup("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_api_key: lookup("EMBEDDING_API_KEY").unwrap_or(defaults.embedding_api_key),
            llm_base_url,
            llm_model: lookup("LLM_MODEL").unwrap_or(defaults.llm_model),
            batch_size: parse_usize(&lookup, "MIGRATION_BATCH_SIZE", defaults.batch_size)?,
            checkpoint_path,
            lock_holder: lookup("MAINT_LOCK_HOLDER").unwrap_or(defaults.lock_holder),
        };

        config
            .validate()
            .map_err(|e| MaintError::Validation(e.to_string()))?;

        Ok(config)
    }

    /// The Neo4j password, or a validation error naming the missing variable.
    pub fn neo4j_password(&self) -> Result<&str> {
        self.neo4j_password
            .as_deref()
            .ok_or_else(|| MaintError::Validation("NEO4J_PASSWORD is required".to_string()))
    }
}

fn parse_usize<F>(lookup: &F, name: &str, default: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val.trim().parse::<usize>().map_err(|_| {
            MaintError::Validation(format!("{name} must be a positive integer, got '{val}'"))
        }),
        None => Ok(default),
    }
}

fn validate_not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn validate_targets(targets: &[VectorProperty]) -> std::result::Result<(), ValidationError> {
    for target in targets {
        if let Err(e) = target.validate() {
            let mut err = ValidationError::new("vector_property");
            err.message = Some(e.to_string().into());
            return Err(err);
        }
    }
    Ok(())
}

/// Inputs of one migration run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MigrationConfig {
    /// Dimensionality every stored vector must have afterwards.
    #[validate(range(min = 1))]
    pub target_dim: usize,

    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Create the required vector indexes at `target_dim` before verifying.
    pub recreate_indexes: bool,

    pub similarity: SimilarityFunction,

    /// Vector properties to scan. Empty means the built-in defaults.
    #[validate(custom(function = "validate_targets"))]
    pub targets: Vec<VectorProperty>,

    pub checkpoint_path: Option<PathBuf>,

    #[validate(length(min = 1), custom(function = "validate_not_blank"))]
    pub lock_holder: String,

    /// Discard any existing checkpoint instead of resuming from it.
    pub reset: bool,
}

impl MigrationConfig {
    pub fn new(target_dim: usize) -> Self {
        Self {
            target_dim,
            batch_size: DEFAULT_BATCH_SIZE,
            recreate_indexes: false,
            similarity: SimilarityFunction::Cosine,
            targets: Vec::new(),
            checkpoint_path: None,
            lock_holder: DEFAULT_LOCK_HOLDER.to_string(),
            reset: false,
        }
    }

    /// [`Validate::validate`] with errors as [`MaintError::Validation`].
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| MaintError::Validation(e.to_string()))
    }
}

impl From<&MaintConfig> for MigrationConfig {
    fn from(config: &MaintConfig) -> Self {
        Self {
            target_dim: config.embedding_dim,
            batch_size: config.batch_size,
            checkpoint_path: config.checkpoint_path.clone(),
            lock_holder: config.lock_holder.clone(),
            ..Self::new(config.embedding_dim)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<MaintConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MaintConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[]).expect("config should load");
        assert_eq!(config.neo4j_uri, "bolt://localhost:7687");
        assert_eq!(config.neo4j_user, "neo4j");
        assert_eq!(config.neo4j_database, "neo4j");
        assert!(config.neo4j_password.is_none());
        assert_eq!(config.embedding_dim, 1024);
        assert_eq!(config.embedding_model, "mxbai-embed-large");
        assert_eq!(config.llm_base_url, config.embedding_base_url);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(
            config.checkpoint_path,
            Some(PathBuf::from(".graphiti-maint/checkpoint.json"))
        );
        assert_eq!(config.lock_holder, "graphiti-maint");
    }

    #[test]
    fn test_config_custom_values() {
        let config = load(&[
            ("NEO4J_URI", "bolt://neo4j.graphiti.local:7687"),
            ("NEO4J_USER", "admin"),
            ("NEO4J_PASSWORD", "mysecret"),
            ("NEO4J_DATABASE", "memory"),
            ("EMBEDDING_DIM", "768"),
            ("EMBEDDING_BASE_URL", "http://gpu-box:11434"),
            ("EMBEDDING_MODEL", "nomic-embed-text"),
            ("LLM_MODEL", "llama3.2:3b"),
            ("MIGRATION_BATCH_SIZE", "250"),
            ("MIGRATION_CHECKPOINT", "/tmp/ckpt.json"),
            ("MAINT_LOCK_HOLDER", "ops-alice"),
        ])
        .expect("config should load");

        assert_eq!(config.neo4j_uri, "bolt://neo4j.graphiti.local:7687");
        assert_eq!(config.neo4j_user, "admin");
        assert_eq!(config.neo4j_password().unwrap(), "mysecret");
        assert_eq!(config.neo4j_database, "memory");
        assert_eq!(config.embedding_dim, 768);
        assert_eq!(config.llm_base_url, "http://gpu-box:11434");
        assert_eq!(config.embedding_model, "nomic-embed-text");
        assert_eq!(config.llm_model, "llama3.2:3b");
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.checkpoint_path, Some(PathBuf::from("/tmp/ckpt.json")));
        assert_eq!(config.lock_holder, "ops-alice");
    }

    #[test]
    fn test_config_missing_password_is_reported_on_use() {
        let config = load(&[]).expect("config should load");
        match config.neo4j_password() {
            Err(MaintError::Validation(msg)) => assert!(msg.contains("NEO4J_PASSWORD")),
            other => panic!("expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_empty_password_rejected() {
        assert!(load(&[("NEO4J_PASSWORD", "")]).is_err());
    }

    #[test]
    fn test_config_invalid_embedding_dim() {
        match load(&[("EMBEDDING_DIM", "not-a-number")]) {
            Err(MaintError::Validation(msg)) => assert!(msg.contains("EMBEDDING_DIM")),
            other => panic!("expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_zero_embedding_dim() {
        assert!(load(&[("EMBEDDING_DIM", "0")]).is_err());
    }

    #[test]
    fn test_config_zero_batch_size() {
        assert!(load(&[("MIGRATION_BATCH_SIZE", "0")]).is_err());
    }

    #[test]
    fn test_config_empty_checkpoint_disables_it() {
        let config = load(&[("MIGRATION_CHECKPOINT", "")]).expect("config should load");
        assert!(config.checkpoint_path.is_none());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let config = load(&[("NEO4J_PASSWORD", "hunter2")]).expect("config should load");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("embedding_api_key"));
    }

    #[test]
    fn test_migration_config_from_maint_config() {
        let config = load(&[("EMBEDDING_DIM", "1536"), ("MIGRATION_BATCH_SIZE", "10")])
            .expect("config should load");
        let migration = MigrationConfig::from(&config);
        assert_eq!(migration.target_dim, 1536);
        assert_eq!(migration.batch_size, 10);
        assert!(!migration.recreate_indexes);
        assert!(!migration.reset);
        assert!(migration.targets.is_empty());
        assert_eq!(migration.lock_holder, "graphiti-maint");
    }

    #[test]
    fn test_migration_config_validation() {
        assert!(MigrationConfig::new(1024).check().is_ok());

        let err = MigrationConfig::new(0).check().unwrap_err();
        assert!(matches!(&err, MaintError::Validation(msg) if msg.contains("target_dim")));

        let mut config = MigrationConfig::new(1024);
        config.batch_size = 0;
        assert!(matches!(config.check(), Err(MaintError::Validation(msg)) if msg.contains("batch_size")));

        let mut config = MigrationConfig::new(1024);
        config.lock_holder = "  ".into();
        assert!(matches!(config.check(), Err(MaintError::Validation(msg)) if msg.contains("lock_holder")));

        let mut config = MigrationConfig::new(1024);
        config.targets = vec![VectorProperty::node("Entity", "embedding"), VectorProperty::any_node("")];
        assert!(matches!(config.check(), Err(MaintError::Validation(msg)) if msg.contains("targets")));
    }
}
