//! Churn Pipeline - customer churn model training
//!
//! This crate trains and selects binary churn classifiers and hands the
//! winner to a serving collaborator:
//! - Data ingestion, quality checks and synthetic data generation
//! - Imputation, categorical encoding and scaling
//! - Model training with several algorithms and metric-based selection
//! - Experiment tracking of runs, metrics and artifacts
//!
//! # Modules
//!
//! - [`data`] - Loading customer tables and generating synthetic ones
//! - [`preprocessing`] - Fitted feature preprocessing
//! - [`training`] - Candidate models and selection
//! - [`evaluation`] - Binary classification metrics
//! - [`tracking`] - Experiment tracking
//! - [`export`] - Model artifacts
//! - [`pipeline`] - End-to-end training runs
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod evaluation;

// Persistence
pub mod tracking;
pub mod export;

// Orchestration and services
pub mod pipeline;
pub mod cli;

pub use error::{ErrorKind, PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ErrorKind, PipelineError, Result};

    // Data
    pub use crate::data::{generate_customer_data, load, validate_quality, SyntheticConfig, Table};

    // Preprocessing
    pub use crate::preprocessing::{DataPreprocessor, PreprocessingConfig};

    // Training
    pub use crate::training::{Model, ModelType, TrainEngine, TrainedModel, TrainingConfig};

    // Evaluation
    pub use crate::evaluation::{evaluate, EvaluationResult, Metric};

    // Experiment tracking
    pub use crate::tracking::{ExperimentTracker, RunLogger, RunStatus};

    // Export
    pub use crate::export::ModelArtifact;

    // Pipeline
    pub use crate::pipeline::{PipelineConfig, PipelineOutcome, TrainingPipeline};
}
