//! End-to-end training pipeline
//!
//! Ingest → preprocess (fit) → train and evaluate every candidate → select →
//! persist. Each run is recorded through a [`RunLogger`]: a parent run holds
//! the selected model, its metrics and artifacts; every candidate gets a
//! nested child run. Any failure marks the parent run failed and is returned
//! to the caller unchanged.

mod config;

pub use config::PipelineConfig;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::data::{self, Table};
use crate::error::Result;
use crate::export::{ModelArtifact, IMPORTANCE_ARTIFACT, MODEL_ARTIFACT};
use crate::preprocessing::DataPreprocessor;
use crate::tracking::{ExperimentTracker, RunLogger, RunStatus};
use crate::training::{CandidateResult, ModelType, TrainEngine};

/// Per-candidate summary of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub model_type: ModelType,
    /// Child run holding this candidate's params and metrics
    pub run_id: String,
    pub metrics: BTreeMap<String, f64>,
    pub training_time_secs: f64,
}

/// Result of a successful pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Parent run id; the serving side loads the artifact with it
    pub run_id: String,
    pub selected: ModelType,
    /// Held-out metrics of the selected model
    pub metrics: BTreeMap<String, f64>,
    /// Candidates in registration order
    pub candidates: Vec<CandidateSummary>,
    pub n_rows: usize,
    pub n_train: usize,
    pub n_validation: usize,
    pub artifact: ModelArtifact,
}

/// Churn model training pipeline
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Train from `config.data_path`, tracking into `config.tracking_dir`
    pub fn run(&self) -> Result<PipelineOutcome> {
        self.config.validate()?;
        let tracker = ExperimentTracker::local(&self.config.tracking_dir, &self.config.experiment_name)?;
        self.tracked(&tracker, || data::load(&self.config.data_path))
    }

    /// Train on an in-memory table, logging to `logger`
    pub fn run_on_table(&self, table: &Table, logger: &dyn RunLogger) -> Result<PipelineOutcome> {
        self.config.validate()?;
        self.tracked(logger, || Ok(table.clone()))
    }

    /// Open the parent run, execute, and close the run with the outcome
    fn tracked<F>(&self, logger: &dyn RunLogger, source: F) -> Result<PipelineOutcome>
    where
        F: FnOnce() -> Result<Table>,
    {
        let run_id = logger.start_run(&self.config.run_name, None)?;
        info!(run_id = %run_id, experiment = %self.config.experiment_name, "Started training run");

        match source().and_then(|table| self.execute(&table, logger, &run_id)) {
            Ok(outcome) => {
                logger.end_run(&run_id, RunStatus::Finished)?;
                Ok(outcome)
            }
            Err(e) => {
                error!(run_id = %run_id, kind = %e.kind(), error = %e, "Training run failed");
                if let Err(end_err) = logger.end_run(&run_id, RunStatus::Failed) {
                    warn!(run_id = %run_id, error = %end_err, "Could not mark run as failed");
                }
                Err(e)
            }
        }
    }

    fn execute(&self, table: &Table, logger: &dyn RunLogger, run_id: &str) -> Result<PipelineOutcome> {
        let start = Instant::now();
        data::validate_quality(table, self.config.max_missing_ratio)?;
        logger.log_params(run_id, &self.run_params(table))?;

        let mut preprocessor = DataPreprocessor::with_config(self.config.preprocessing.clone());
        let (x, y) = preprocessor.fit_transform(table)?;

        let engine = TrainEngine::new(self.config.training.clone());
        let selection = engine.train_and_select(&x, &y)?;

        let candidates = selection
            .candidates
            .iter()
            .map(|candidate| log_candidate(logger, run_id, candidate))
            .collect::<Result<Vec<_>>>()?;

        let (n_train, n_validation, metric) = (selection.n_train, selection.n_validation, selection.metric);
        let best = selection.into_best();
        let metrics = best.evaluation.to_map();

        let mut selected_params = BTreeMap::from([
            ("selected_model".to_string(), best.model_type.name().to_string()),
            ("n_train".to_string(), n_train.to_string()),
            ("n_validation".to_string(), n_validation.to_string()),
        ]);
        for (key, value) in best.params() {
            selected_params.insert(format!("selected.{}", key), value);
        }
        logger.log_params(run_id, &selected_params)?;
        logger.log_metrics(run_id, &metrics)?;

        let artifact = ModelArtifact::new(preprocessor, best.model, metrics.clone())?;
        logger.log_artifact(run_id, MODEL_ARTIFACT, &artifact.to_bytes()?)?;

        let importances = artifact.feature_importances();
        if !importances.is_empty() {
            logger.log_artifact(run_id, IMPORTANCE_ARTIFACT, &serde_json::to_vec_pretty(&importances)?)?;
        }

        if let Some(path) = &self.config.model_output {
            artifact.save(path)?;
        }

        info!(
            run_id,
            model = %best.model_type,
            metric = %metric,
            score = metrics.get(metric.as_str()).copied().unwrap_or_default(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training run complete"
        );

        Ok(PipelineOutcome {
            run_id: run_id.to_string(),
            selected: best.model_type,
            metrics,
            candidates,
            n_rows: table.height(),
            n_train,
            n_validation,
            artifact,
        })
    }

    fn run_params(&self, table: &Table) -> BTreeMap<String, String> {
        let training = &self.config.training;
        let preprocessing = &self.config.preprocessing;
        let models: Vec<&str> = training.models.iter().map(|m| m.name()).collect();

        BTreeMap::from([
            ("data_path".to_string(), self.config.data_path.display().to_string()),
            ("n_rows".to_string(), table.height().to_string()),
            ("candidates".to_string(), models.join(",")),
            ("selection_metric".to_string(), training.selection_metric.to_string()),
            ("validation_split".to_string(), training.validation_split.to_string()),
            (
                "random_state".to_string(),
                training.random_state.map_or_else(|| "none".to_string(), |s| s.to_string()),
            ),
            (
                "numeric_impute".to_string(),
                format!("{:?}", preprocessing.numeric_impute_strategy).to_lowercase(),
            ),
            ("scaler".to_string(), format!("{:?}", preprocessing.scaler_type).to_lowercase()),
        ])
    }
}

/// Record one candidate as a child run of `parent_run_id`
fn log_candidate(logger: &dyn RunLogger, parent_run_id: &str, candidate: &CandidateResult) -> Result<CandidateSummary> {
    let run_id = logger.start_run(candidate.model_type.name(), Some(parent_run_id))?;

    let mut params = candidate.params();
    params.insert("model_type".to_string(), candidate.model_type.name().to_string());
    if !candidate.evaluation.undefined.is_empty() {
        let undefined: Vec<&str> = candidate.evaluation.undefined.iter().map(|m| m.as_str()).collect();
        params.insert("undefined_metrics".to_string(), undefined.join(","));
    }

    let mut metrics = candidate.evaluation.to_map();
    metrics.insert("training_time_secs".to_string(), candidate.training_time_secs);

    let logged = logger
        .log_params(&run_id, &params)
        .and_then(|_| logger.log_metrics(&run_id, &metrics));
    match logged {
        Ok(()) => logger.end_run(&run_id, RunStatus::Finished)?,
        Err(e) => {
            let _ = logger.end_run(&run_id, RunStatus::Failed);
            return Err(e);
        }
    }

    metrics.remove("training_time_secs");
    Ok(CandidateSummary {
        model_type: candidate.model_type,
        run_id,
        metrics,
        training_time_secs: candidate.training_time_secs,
    })
}
