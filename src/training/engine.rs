//! Training engine implementation

use crate::error::{PipelineError, Result};
use crate::evaluation::{evaluate, EvaluationResult, Metric};
use super::{ModelType, TrainingConfig};
use super::decision_tree::DecisionTree;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::models::Model;
use super::random_forest::RandomForest;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
}

impl TrainedModel {
    /// Unfitted model of `model_type` with hyperparameters from `config`
    pub fn new(model_type: ModelType, config: &TrainingConfig) -> Self {
        match model_type {
            ModelType::LogisticRegression => {
                TrainedModel::LogisticRegression(LogisticRegression::new().with_max_iter(config.max_iter))
            }
            ModelType::DecisionTree => {
                let mut tree = DecisionTree::new_classifier().with_min_samples_leaf(config.min_samples_leaf);
                tree.max_depth = config.max_depth;
                tree.random_state = config.random_state;
                TrainedModel::DecisionTree(tree)
            }
            ModelType::RandomForest => {
                let mut forest = RandomForest::new(config.n_estimators)
                    .with_min_samples_leaf(config.min_samples_leaf);
                forest.max_depth = config.max_depth;
                forest.random_state = config.random_state;
                TrainedModel::RandomForest(forest)
            }
            ModelType::GradientBoosting => {
                TrainedModel::GradientBoosting(GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: config.n_estimators,
                    learning_rate: config.learning_rate,
                    max_depth: config.max_depth.unwrap_or(3),
                    min_samples_leaf: config.min_samples_leaf,
                    random_state: config.random_state,
                    ..Default::default()
                }))
            }
        }
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            TrainedModel::LogisticRegression(_) => ModelType::LogisticRegression,
            TrainedModel::DecisionTree(_) => ModelType::DecisionTree,
            TrainedModel::RandomForest(_) => ModelType::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelType::GradientBoosting,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn Model {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
        }
    }

    /// Fit the wrapped model; any failure is reported as a training error
    /// naming the variant
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let name = self.model_type().name();
        self.as_model_mut().fit(x, y).map_err(|e| match e {
            PipelineError::TrainingError { .. } => e,
            other => PipelineError::training(name, other.to_string()),
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict_proba(x)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.as_model().feature_importances()
    }

    pub fn params(&self) -> BTreeMap<String, String> {
        self.as_model().params()
    }

    pub fn is_fitted(&self) -> bool {
        self.as_model().is_fitted()
    }
}

/// One trained and evaluated candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub model_type: ModelType,
    pub model: TrainedModel,
    pub evaluation: EvaluationResult,
    pub training_time_secs: f64,
}

impl CandidateResult {
    pub fn params(&self) -> BTreeMap<String, String> {
        self.model.params()
    }
}

/// Outcome of training every candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Candidates in registration order
    pub candidates: Vec<CandidateResult>,
    pub best_index: usize,
    pub metric: Metric,
    pub n_train: usize,
    pub n_validation: usize,
}

impl SelectionResult {
    pub fn best(&self) -> &CandidateResult {
        &self.candidates[self.best_index]
    }

    pub fn best_score(&self) -> f64 {
        self.best().evaluation.get(self.metric)
    }

    pub fn into_best(mut self) -> CandidateResult {
        self.candidates.swap_remove(self.best_index)
    }
}

/// Train/validation partition of a feature matrix
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_val: Array2<f64>,
    pub y_val: Array1<f64>,
}

/// Main training engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainEngine {
    config: TrainingConfig,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train every configured candidate on a held-out split and pick the one
    /// with the highest selection metric.
    ///
    /// The first candidate that fails aborts the whole selection.
    pub fn train_and_select(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SelectionResult> {
        self.config.validate()?;
        check_inputs(x, y)?;

        let split = self.stratified_split(x, y)?;
        info!(
            train = split.y_train.len(),
            validation = split.y_val.len(),
            candidates = self.config.models.len(),
            "Training candidates"
        );

        let results: Vec<Result<CandidateResult>> = if self.config.parallel {
            self.config
                .models
                .par_iter()
                .map(|&model_type| self.train_candidate(model_type, &split))
                .collect()
        } else {
            self.config
                .models
                .iter()
                .map(|&model_type| self.train_candidate(model_type, &split))
                .collect()
        };
        let candidates = results.into_iter().collect::<Result<Vec<_>>>()?;

        let metric = self.config.selection_metric;
        let best_index = select_best(&candidates, metric)
            .ok_or_else(|| PipelineError::training("selection", "no candidates were trained"))?;

        let best = &candidates[best_index];
        if !best.evaluation.is_defined(metric) {
            warn!(metric = %metric, "Selection metric is undefined on the validation split");
        }
        info!(
            model = %best.model_type,
            metric = %metric,
            score = best.evaluation.get(metric),
            "Selected best model"
        );

        Ok(SelectionResult {
            best_index,
            metric,
            n_train: split.y_train.len(),
            n_validation: split.y_val.len(),
            candidates,
        })
    }

    /// Fit one candidate on the training part and score it on the held-out part
    pub fn train_candidate(&self, model_type: ModelType, split: &DataSplit) -> Result<CandidateResult> {
        let start = Instant::now();
        let mut model = TrainedModel::new(model_type, &self.config);
        model.fit(&split.x_train, &split.y_train)?;

        let y_pred = model.predict(&split.x_val)?;
        let evaluation = evaluate(&split.y_val, &y_pred)?;
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(
            model = %model_type,
            accuracy = evaluation.accuracy,
            precision = evaluation.precision,
            recall = evaluation.recall,
            f1 = evaluation.f1,
            secs = training_time_secs,
            "Evaluated candidate"
        );

        Ok(CandidateResult {
            model_type,
            model,
            evaluation,
            training_time_secs,
        })
    }

    /// Seeded, shuffled split that keeps class proportions.
    ///
    /// Each class with at least two rows contributes at least one held-out
    /// row; a singleton class stays in training.
    pub fn stratified_split(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<DataSplit> {
        let val_ratio = self.config.validation_split;

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            class_indices.entry(label as i64).or_default().push(i);
        }

        let mut rng = match self.config.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut train_indices = Vec::new();
        let mut val_indices = Vec::new();

        for indices in class_indices.values_mut() {
            indices.shuffle(&mut rng);
            let n = indices.len();
            let class_val_size = if n < 2 {
                0
            } else {
                (((n as f64) * val_ratio).round() as usize).clamp(1, n - 1)
            };
            val_indices.extend_from_slice(&indices[..class_val_size]);
            train_indices.extend_from_slice(&indices[class_val_size..]);
        }

        if train_indices.is_empty() || val_indices.is_empty() {
            return Err(PipelineError::ValidationError(format!(
                "cannot hold out a validation split from {} rows",
                y.len()
            )));
        }

        train_indices.sort_unstable();
        val_indices.sort_unstable();
        debug!(train = train_indices.len(), validation = val_indices.len(), "Stratified split");

        Ok(DataSplit {
            x_train: x.select(Axis(0), &train_indices),
            y_train: y.select(Axis(0), &train_indices),
            x_val: x.select(Axis(0), &val_indices),
            y_val: y.select(Axis(0), &val_indices),
        })
    }
}

/// Index of the highest-scoring candidate; the earliest wins ties
pub fn select_best(candidates: &[CandidateResult], metric: Metric) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let score = candidate.evaluation.get(metric);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

fn check_inputs(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::training("input", "feature matrix contains NaN or infinite values"));
    }
    let classes: BTreeSet<i64> = y.iter().map(|&v| v as i64).collect();
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(PipelineError::ValidationError("labels must be 0 or 1".to_string()));
    }
    if classes.len() < 2 {
        return Err(PipelineError::training("input", "target has a single class"));
    }
    Ok(())
}
