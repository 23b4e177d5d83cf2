//! Migration checkpoint file.
//!
//! A JSON document recording which stages of a run finished cleanly and the
//! discovery they acted on. Written with `tokio::fs` to a temporary sibling
//! and renamed into place, so a crash mid-write leaves the previous
//! checkpoint intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::Stage;
use crate::errors::{MaintError, Result};
use crate::inspect::Discovery;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub target_dim: usize,
    /// Stages finished without failures, in execution order.
    pub completed: Vec<Stage>,
    /// Discovery the completed stages acted on.
    pub discovery: Option<Discovery>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(target_dim: usize) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            target_dim,
            completed: Vec::new(),
            discovery: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    pub fn mark_completed(&mut self, stage: Stage) {
        if !self.is_completed(stage) {
            self.completed.push(stage);
        }
        self.updated_at = Utc::now();
    }

    /// Read a checkpoint; `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// [`MaintError::Checkpoint`] for unreadable JSON or an unknown version.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checkpoint: Checkpoint = serde_json::from_str(&raw).map_err(|e| {
            MaintError::Checkpoint(format!("{} is not a valid checkpoint: {e}", path.display()))
        })?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(MaintError::Checkpoint(format!(
                "{} has version {}, expected {CHECKPOINT_VERSION}",
                path.display(),
                checkpoint.version
            )));
        }
        Ok(Some(checkpoint))
    }

    /// Write the checkpoint, creating parent directories as needed.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = tmp_path(path);
        fs::write(&tmp, serde_json::to_vec_pretty(self)?).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), completed = ?self.completed, "Checkpoint saved");
        Ok(())
    }

    /// Delete the checkpoint at `path`. A missing file is not an error.
    pub async fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let loaded = Checkpoint::load(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("checkpoint.json");

        let mut checkpoint = Checkpoint::new(1024);
        checkpoint.mark_completed(Stage::Discover);
        checkpoint.mark_completed(Stage::Discover);
        checkpoint.mark_completed(Stage::DropIndexes);
        checkpoint.save(&path).await.unwrap();

        let loaded = Checkpoint::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.completed, vec![Stage::Discover, Stage::DropIndexes]);
        assert_eq!(loaded.target_dim, 1024);
        assert!(!tmp_path(&path).exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_checkpoint_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(matches!(
            Checkpoint::load(&path).await,
            Err(MaintError::Checkpoint(_))
        ));
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        let mut checkpoint = Checkpoint::new(768);
        checkpoint.version = CHECKPOINT_VERSION + 1;
        checkpoint.save(&path).await.unwrap();
        assert!(matches!(
            Checkpoint::load(&path).await,
            Err(MaintError::Checkpoint(msg)) if msg.contains("version")
        ));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        Checkpoint::new(1024).save(&path).await.unwrap();
        Checkpoint::remove(&path).await.unwrap();
        Checkpoint::remove(&path).await.unwrap();
        assert!(!path.exists());
    }
}
