//! Experiment tracker implementation
//!
//! Track runs, their parameters, metrics and artifacts.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::storage::{InMemoryStorage, LocalStorage, StorageBackend};
use crate::error::{PipelineError, Result};

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is currently running
    Running,
    /// Run completed successfully
    Finished,
    /// Run failed
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        })
    }
}

/// A run within an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    /// Set for nested runs
    pub parent_run_id: Option<String>,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    /// None while still running
    pub end_time: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    /// Latest value per metric
    pub metrics: BTreeMap<String, f64>,
    /// Names of artifacts stored for this run
    pub artifacts: Vec<String>,
}

impl Run {
    fn new(run_name: &str, parent_run_id: Option<&str>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            run_name: run_name.to_string(),
            parent_run_id: parent_run_id.map(str::to_string),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    /// Get run duration in seconds
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn is_active(&self) -> bool {
        self.status == RunStatus::Running
    }
}

/// An experiment containing multiple runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub runs: Vec<Run>,
}

impl Experiment {
    /// Create a new, empty experiment
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experiment_id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            runs: Vec::new(),
        }
    }

    /// Get the best run by a metric; on ties the earliest run wins
    pub fn best_run(&self, metric_name: &str, maximize: bool) -> Option<&Run> {
        let mut best: Option<(&Run, f64)> = None;
        for run in &self.runs {
            let Some(&value) = run.metrics.get(metric_name) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, current)) if maximize => value > current,
                Some((_, current)) => value < current,
            };
            if better {
                best = Some((run, value));
            }
        }
        best.map(|(run, _)| run)
    }
}

/// Narrow logging seam between the pipeline and a run store.
///
/// All calls address a run by the id returned from [`RunLogger::start_run`].
pub trait RunLogger: Send + Sync {
    /// Open a run, optionally nested under `parent_run_id`, and return its id
    fn start_run(&self, run_name: &str, parent_run_id: Option<&str>) -> Result<String>;

    fn log_params(&self, run_id: &str, params: &BTreeMap<String, String>) -> Result<()>;

    fn log_metrics(&self, run_id: &str, metrics: &BTreeMap<String, f64>) -> Result<()>;

    fn log_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> Result<()>;

    /// Close a run with its final status
    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()>;
}

/// Experiment tracker
///
/// Owns one named experiment inside a [`StorageBackend`]. Every change
/// reloads the stored index, applies itself to this tracker's experiment and
/// writes the merged index back, so trackers sharing a store keep each
/// other's experiments and runs.
pub struct ExperimentTracker {
    storage: Box<dyn StorageBackend>,
    experiment_id: String,
    experiments: RwLock<Vec<Experiment>>,
}

impl ExperimentTracker {
    /// Open (or create) the experiment called `experiment_name` in `storage`
    pub fn open(storage: Box<dyn StorageBackend>, experiment_name: &str) -> Result<Self> {
        if !storage.is_available() {
            return Err(PipelineError::TrackingError("tracking store is not available".to_string()));
        }

        let mut experiments = storage.load_experiments()?;
        let experiment_id = match experiments.iter().find(|e| e.name == experiment_name) {
            Some(existing) => {
                debug!(experiment = experiment_name, runs = existing.runs.len(), "Reusing experiment");
                existing.experiment_id.clone()
            }
            None => {
                let experiment = Experiment::new(experiment_name);
                let id = experiment.experiment_id.clone();
                info!(experiment = experiment_name, id = %id, "Created experiment");
                experiments.push(experiment);
                storage.save_experiments(&experiments)?;
                id
            }
        };

        Ok(Self {
            storage,
            experiment_id,
            experiments: RwLock::new(experiments),
        })
    }

    /// Tracker over a directory on the local file system
    pub fn local(dir: impl Into<PathBuf>, experiment_name: &str) -> Result<Self> {
        Self::open(Box::new(LocalStorage::new(dir)), experiment_name)
    }

    /// Tracker that keeps everything in memory
    pub fn in_memory(experiment_name: &str) -> Result<Self> {
        Self::open(Box::new(InMemoryStorage::new()), experiment_name)
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Snapshot of the tracked experiment as currently stored
    pub fn experiment(&self) -> Result<Experiment> {
        let mut experiments = self.experiments.write();
        self.refresh(&mut experiments)?;
        experiments
            .iter()
            .find(|e| e.experiment_id == self.experiment_id)
            .cloned()
            .ok_or_else(|| self.vanished())
    }

    /// All runs of the experiment, oldest first
    pub fn list_runs(&self) -> Result<Vec<Run>> {
        Ok(self.experiment()?.runs)
    }

    pub fn get_run(&self, run_id: &str) -> Result<Run> {
        self.experiment()?
            .runs
            .into_iter()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| PipelineError::TrackingError(format!("unknown run {}", run_id)))
    }

    /// Nested runs started under `parent_run_id`
    pub fn child_runs(&self, parent_run_id: &str) -> Result<Vec<Run>> {
        Ok(self
            .list_runs()?
            .into_iter()
            .filter(|r| r.parent_run_id.as_deref() == Some(parent_run_id))
            .collect())
    }

    /// Fetch an artifact previously logged to `run_id`
    pub fn load_artifact(&self, run_id: &str, name: &str) -> Result<Vec<u8>> {
        let run = self.get_run(run_id)?;
        if !run.artifacts.iter().any(|a| a == name) {
            return Err(PipelineError::TrackingError(format!(
                "run {} has no artifact '{}'",
                run_id, name
            )));
        }
        self.storage.get_artifact(run_id, name)
    }

    fn vanished(&self) -> PipelineError {
        PipelineError::TrackingError(format!("experiment {} vanished", self.experiment_id))
    }

    /// Replace `experiments` with the stored index. If the store no longer
    /// holds this tracker's experiment, the last known copy is kept.
    fn refresh(&self, experiments: &mut Vec<Experiment>) -> Result<()> {
        let mut latest = self.storage.load_experiments()?;
        if !latest.iter().any(|e| e.experiment_id == self.experiment_id) {
            if let Some(ours) = experiments.iter().find(|e| e.experiment_id == self.experiment_id) {
                latest.push(ours.clone());
            }
        }
        *experiments = latest;
        Ok(())
    }

    /// Apply `f` to this tracker's experiment on top of the stored index and
    /// write the result back
    fn modify<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Experiment) -> Result<T>,
    {
        let mut experiments = self.experiments.write();
        self.refresh(&mut experiments)?;
        let experiment = experiments
            .iter_mut()
            .find(|e| e.experiment_id == self.experiment_id)
            .ok_or_else(|| self.vanished())?;
        let value = f(experiment)?;
        self.storage.save_experiments(&experiments)?;
        Ok(value)
    }

    /// Apply `f` to an active run
    fn update_run<F>(&self, run_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Run) -> Result<()>,
    {
        self.modify(|experiment| {
            let run = experiment
                .runs
                .iter_mut()
                .find(|r| r.run_id == run_id)
                .ok_or_else(|| PipelineError::TrackingError(format!("unknown run {}", run_id)))?;
            if !run.is_active() {
                return Err(PipelineError::TrackingError(format!(
                    "run {} is already {}",
                    run_id, run.status
                )));
            }
            f(run)
        })
    }
}

impl RunLogger for ExperimentTracker {
    fn start_run(&self, run_name: &str, parent_run_id: Option<&str>) -> Result<String> {
        let run_id = self.modify(|experiment| {
            if let Some(parent) = parent_run_id {
                if !experiment.runs.iter().any(|r| r.run_id == parent) {
                    return Err(PipelineError::TrackingError(format!("unknown parent run {}", parent)));
                }
            }

            let run = Run::new(run_name, parent_run_id);
            let run_id = run.run_id.clone();
            experiment.runs.push(run);
            Ok(run_id)
        })?;

        debug!(run = run_name, run_id = %run_id, parent = ?parent_run_id, "Started run");
        Ok(run_id)
    }

    fn log_params(&self, run_id: &str, params: &BTreeMap<String, String>) -> Result<()> {
        self.update_run(run_id, |run| {
            run.params.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        })
    }

    fn log_metrics(&self, run_id: &str, metrics: &BTreeMap<String, f64>) -> Result<()> {
        if let Some((name, value)) = metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PipelineError::TrackingError(format!(
                "metric '{}' is not finite: {}",
                name, value
            )));
        }
        self.update_run(run_id, |run| {
            run.metrics.extend(metrics.iter().map(|(k, v)| (k.clone(), *v)));
            Ok(())
        })
    }

    fn log_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> Result<()> {
        self.update_run(run_id, |run| {
            self.storage.put_artifact(run_id, name, bytes)?;
            if !run.artifacts.iter().any(|a| a == name) {
                run.artifacts.push(name.to_string());
            }
            Ok(())
        })?;
        info!(run_id, artifact = name, bytes = bytes.len(), "Logged artifact");
        Ok(())
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        if status == RunStatus::Running {
            return Err(PipelineError::TrackingError("a run cannot end as running".to_string()));
        }
        self.update_run(run_id, |run| {
            run.status = status;
            run.end_time = Some(Utc::now());
            Ok(())
        })?;
        if status == RunStatus::Failed {
            warn!(run_id, "Run failed");
        } else {
            debug!(run_id, "Run finished");
        }
        Ok(())
    }
}
