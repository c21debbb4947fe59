//! Storage backends for experiment tracking
//!
//! A backend persists the experiment index (runs with their params and
//! metrics) and the raw artifact blobs attached to runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use super::tracker::Experiment;
use crate::error::{PipelineError, Result};

/// Storage backend trait
pub trait StorageBackend: Send + Sync {
    /// Save experiments to storage, replacing what was there
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()>;

    /// Load experiments from storage; an empty store yields no experiments
    fn load_experiments(&self) -> Result<Vec<Experiment>>;

    /// Store an artifact blob under `run_id`/`name`
    fn put_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch an artifact blob
    fn get_artifact(&self, run_id: &str, name: &str) -> Result<Vec<u8>>;

    /// Check if storage is available
    fn is_available(&self) -> bool;
}

/// Artifact names are single path components
fn check_artifact_key(run_id: &str, name: &str) -> Result<()> {
    let valid = |s: &str| !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\']);
    if valid(run_id) && valid(name) {
        Ok(())
    } else {
        Err(PipelineError::TrackingError(format!(
            "invalid artifact key '{}/{}'",
            run_id, name
        )))
    }
}

/// Local file system storage backend
///
/// Layout:
/// ```text
/// <base_dir>/experiments.json
/// <base_dir>/artifacts/<run_id>/<name>
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn experiments_file(&self) -> PathBuf {
        self.base_dir.join("experiments.json")
    }

    fn artifact_path(&self, run_id: &str, name: &str) -> PathBuf {
        self.base_dir.join("artifacts").join(run_id).join(name)
    }
}

impl StorageBackend for LocalStorage {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()> {
        fs::create_dir_all(&self.base_dir).map_err(|e| {
            PipelineError::TrackingError(format!("failed to create {}: {}", self.base_dir.display(), e))
        })?;

        let json = serde_json::to_string_pretty(experiments)?;

        // write-then-rename so a crash never leaves a truncated index
        let tmp = self.base_dir.join(format!("experiments.json.{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, self.experiments_file()))
            .map_err(|e| PipelineError::TrackingError(format!("failed to write experiment index: {}", e)))
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        let file_path = self.experiments_file();
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&file_path).map_err(|e| {
            PipelineError::TrackingError(format!("failed to read {}: {}", file_path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            PipelineError::TrackingError(format!("corrupt experiment index {}: {}", file_path.display(), e))
        })
    }

    fn put_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> Result<()> {
        check_artifact_key(run_id, name)?;
        let path = self.artifact_path(run_id, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::TrackingError(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        fs::write(&path, bytes)
            .map_err(|e| PipelineError::TrackingError(format!("failed to write {}: {}", path.display(), e)))
    }

    fn get_artifact(&self, run_id: &str, name: &str) -> Result<Vec<u8>> {
        check_artifact_key(run_id, name)?;
        let path = self.artifact_path(run_id, name);
        fs::read(&path).map_err(|e| {
            PipelineError::TrackingError(format!("artifact '{}' of run {} unavailable: {}", name, run_id, e))
        })
    }

    fn is_available(&self) -> bool {
        fs::create_dir_all(&self.base_dir).is_ok()
    }
}

/// Process-local backend, used by tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    experiments: RwLock<Vec<Experiment>>,
    artifacts: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().len()
    }
}

impl StorageBackend for InMemoryStorage {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()> {
        *self.experiments.write() = experiments.to_vec();
        Ok(())
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.experiments.read().clone())
    }

    fn put_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> Result<()> {
        check_artifact_key(run_id, name)?;
        self.artifacts
            .write()
            .insert((run_id.to_string(), name.to_string()), bytes.to_vec());
        Ok(())
    }

    fn get_artifact(&self, run_id: &str, name: &str) -> Result<Vec<u8>> {
        self.artifacts
            .read()
            .get(&(run_id.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| PipelineError::TrackingError(format!("artifact '{}' of run {} not found", name, run_id)))
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("store"));
        assert!(storage.load_experiments().unwrap().is_empty());

        let experiments = vec![Experiment::new("churn")];
        storage.save_experiments(&experiments).unwrap();

        let loaded = storage.load_experiments().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "churn");
        assert_eq!(loaded[0].experiment_id, experiments[0].experiment_id);
    }

    #[test]
    fn test_local_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.put_artifact("run-1", "model.json", b"{}").unwrap();
        assert_eq!(storage.get_artifact("run-1", "model.json").unwrap(), b"{}");
        assert!(dir.path().join("artifacts/run-1/model.json").exists());
        assert!(storage.get_artifact("run-1", "missing.json").is_err());
    }

    #[test]
    fn test_artifact_names_cannot_escape() {
        let storage = InMemoryStorage::new();
        assert!(storage.put_artifact("run", "../x", b"").is_err());
        assert!(storage.put_artifact("..", "x", b"").is_err());
        assert!(storage.put_artifact("run", "", b"").is_err());
        assert_eq!(storage.artifact_count(), 0);
    }

    #[test]
    fn test_corrupt_index_is_tracking_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("experiments.json"), "not json").unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(
            storage.load_experiments(),
            Err(PipelineError::TrackingError(_))
        ));
    }
}
