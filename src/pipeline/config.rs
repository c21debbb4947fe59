//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::preprocessing::PreprocessingConfig;
use crate::training::TrainingConfig;

/// End-to-end training run configuration.
///
/// `Default` honours these environment variables:
/// - `CHURN_DATA_PATH`: input table (default `data/customers.csv`)
/// - `CHURN_TRACKING_DIR`: tracking store directory (default `./mlruns`)
/// - `CHURN_EXPERIMENT`: experiment name (default `churn_prediction`)
/// - `CHURN_SEED`: random seed for splitting and models (default 42)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub tracking_dir: PathBuf,
    pub experiment_name: String,
    /// Name of the parent run
    pub run_name: String,
    /// Largest tolerated share of missing cells in the input table
    pub max_missing_ratio: f64,
    /// Also write the selected artifact here
    pub model_output: Option<PathBuf>,
    pub preprocessing: PreprocessingConfig,
    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut training = TrainingConfig::default();
        if let Some(seed) = std::env::var("CHURN_SEED").ok().and_then(|s| s.parse().ok()) {
            training.random_state = Some(seed);
        }

        Self {
            data_path: std::env::var("CHURN_DATA_PATH")
                .unwrap_or_else(|_| "data/customers.csv".to_string())
                .into(),
            tracking_dir: std::env::var("CHURN_TRACKING_DIR")
                .unwrap_or_else(|_| "./mlruns".to_string())
                .into(),
            experiment_name: std::env::var("CHURN_EXPERIMENT")
                .unwrap_or_else(|_| "churn_prediction".to_string()),
            run_name: "churn_training".to_string(),
            max_missing_ratio: 0.5,
            model_output: None,
            preprocessing: PreprocessingConfig::default(),
            training,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_tracking_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tracking_dir = dir.into();
        self
    }

    pub fn with_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    pub fn with_model_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_output = Some(path.into());
        self
    }

    pub fn with_preprocessing(mut self, config: PreprocessingConfig) -> Self {
        self.preprocessing = config;
        self
    }

    pub fn with_training(mut self, config: TrainingConfig) -> Self {
        self.training = config;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.experiment_name.trim().is_empty() {
            return Err(PipelineError::ConfigError("experiment_name must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.max_missing_ratio) {
            return Err(PipelineError::ConfigError(format!(
                "max_missing_ratio must be in [0, 1], got {}",
                self.max_missing_ratio
            )));
        }
        self.preprocessing.validate()?;
        self.training.validate()
    }

    /// Read a configuration saved as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| PipelineError::ConfigError(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
