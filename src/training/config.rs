//! Training configuration

use crate::error::{PipelineError, Result};
use crate::evaluation::Metric;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of model to train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Logistic Regression
    LogisticRegression,
    /// Decision Tree
    DecisionTree,
    /// Random Forest
    RandomForest,
    /// Gradient Boosted Trees
    GradientBoosting,
}

impl ModelType {
    pub const ALL: [ModelType; 4] = [
        ModelType::LogisticRegression,
        ModelType::DecisionTree,
        ModelType::RandomForest,
        ModelType::GradientBoosting,
    ];

    /// Stable name used in logs, run names and artifacts
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression => "logistic_regression",
            ModelType::DecisionTree => "decision_tree",
            ModelType::RandomForest => "random_forest",
            ModelType::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "logistic_regression" | "logistic" | "lr" => Ok(ModelType::LogisticRegression),
            "decision_tree" | "tree" | "dt" => Ok(ModelType::DecisionTree),
            "random_forest" | "rf" => Ok(ModelType::RandomForest),
            "gradient_boosting" | "gbm" | "gb" => Ok(ModelType::GradientBoosting),
            other => Err(PipelineError::ConfigError(format!("unknown model type '{}'", other))),
        }
    }
}

/// Configuration for model training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Candidate models, in registration order
    pub models: Vec<ModelType>,

    /// Metric used to pick the winner
    pub selection_metric: Metric,

    /// Fraction of rows held out for evaluation
    pub validation_split: f64,

    /// Random seed for reproducibility
    pub random_state: Option<u64>,

    /// Train candidates concurrently
    pub parallel: bool,

    // Tree-specific parameters
    /// Maximum depth of trees (gradient boosting uses 3 when unset)
    pub max_depth: Option<usize>,

    /// Minimum samples per leaf
    pub min_samples_leaf: usize,

    /// Number of trees (for ensemble methods)
    pub n_estimators: usize,

    /// Learning rate (for boosting)
    pub learning_rate: f64,

    /// Iteration cap for logistic regression
    pub max_iter: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            models: vec![
                ModelType::LogisticRegression,
                ModelType::RandomForest,
                ModelType::GradientBoosting,
            ],
            selection_metric: Metric::F1,
            validation_split: 0.2,
            random_state: Some(42),
            parallel: true,
            max_depth: None,
            min_samples_leaf: 1,
            n_estimators: 100,
            learning_rate: 0.1,
            max_iter: 1000,
        }
    }
}

impl TrainingConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(mut self, models: Vec<ModelType>) -> Self {
        self.models = models;
        self
    }

    pub fn with_selection_metric(mut self, metric: Metric) -> Self {
        self.selection_metric = metric;
        self
    }

    pub fn with_validation_split(mut self, split: f64) -> Self {
        self.validation_split = split;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(PipelineError::ConfigError("no candidate models configured".to_string()));
        }
        for (i, m) in self.models.iter().enumerate() {
            if self.models[..i].contains(m) {
                return Err(PipelineError::ConfigError(format!("model '{}' registered twice", m)));
            }
        }
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "validation_split must be in (0, 1), got {}",
                self.validation_split
            )));
        }
        if self.n_estimators == 0 || self.max_iter == 0 || self.min_samples_leaf == 0 {
            return Err(PipelineError::ConfigError(
                "n_estimators, max_iter and min_samples_leaf must be positive".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(PipelineError::ConfigError("learning_rate must be positive".to_string()));
        }
        if self.max_depth == Some(0) {
            return Err(PipelineError::ConfigError("max_depth must be positive".to_string()));
        }
        Ok(())
    }
}
