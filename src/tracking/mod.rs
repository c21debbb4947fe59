//! Experiment tracking module
//!
//! Records runs with their parameters, metrics and artifacts in a pluggable
//! store. The training pipeline only sees the [`RunLogger`] trait.

mod storage;
mod tracker;

pub use storage::{InMemoryStorage, LocalStorage, StorageBackend};
pub use tracker::{Experiment, ExperimentTracker, Run, RunLogger, RunStatus};
