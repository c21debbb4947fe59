//! Gradient Boosting implementation
//!
//! Binary gradient boosted regression trees on the log loss, with optional
//! row and column subsampling per round.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::decision_tree::{opt_to_string, DecisionTree};
use super::models::{check_features, check_training_data, normalize, Model};
use crate::error::{PipelineError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn sigmoid(v: f64) -> f64 {
        1.0 / (1.0 + (-v).exp())
    }

    /// Sorted random subset of `0..n` of size `ceil(n * ratio)`, at least one
    fn sample_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if ratio >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        if c.n_estimators == 0 || c.learning_rate <= 0.0 || c.max_depth == 0 {
            return Err(PipelineError::ConfigError(
                "gradient boosting needs positive n_estimators, learning_rate and max_depth".to_string(),
            ));
        }
        if !(c.subsample > 0.0 && c.subsample <= 1.0) || !(c.colsample_bytree > 0.0 && c.colsample_bytree <= 1.0) {
            return Err(PipelineError::ConfigError(
                "subsample ratios must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

impl Model for GradientBoostingClassifier {
    /// Fit binary classification
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        self.validate_config()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();

        // a one-class target would give an infinite prior
        let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            // negative gradient of the log loss
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, lo)| yi - Self::sigmoid(*lo))
                .collect();

            let row_indices = Self::sample_indices(n_samples, self.config.subsample, &mut rng);
            let col_indices = Self::sample_indices(n_features, self.config.colsample_bytree, &mut rng);

            let x_cols = x.select(Axis(1), &col_indices);
            let x_sub = x_cols.select(Axis(0), &row_indices);
            let r_sub = residuals.select(Axis(0), &row_indices);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit_values(&x_sub, &r_sub)?;

            // every row moves, not only the sampled ones
            let update = tree.predict_values(&x_cols)?;
            log_odds.scaled_add(self.config.learning_rate, &update);

            if let Some(tree_importance) = Model::feature_importances(&tree) {
                for (j, &col_idx) in col_indices.iter().enumerate() {
                    self.feature_importances[col_idx] += tree_importance[j];
                }
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        self.n_features = n_features;
        self.feature_importances = normalize(std::mem::take(&mut self.feature_importances)).to_vec();
        Ok(())
    }

    /// Predict probabilities
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_features(x, self.n_features)?;

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, col_indices) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let x_sub = x.select(Axis(1), col_indices);
            log_odds.scaled_add(self.config.learning_rate, &tree.predict_values(&x_sub)?);
        }

        Ok(log_odds.mapv(Self::sigmoid))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.feature_importances.is_empty() {
            None
        } else {
            Some(Array1::from_vec(self.feature_importances.clone()))
        }
    }

    fn params(&self) -> BTreeMap<String, String> {
        let c = &self.config;
        BTreeMap::from([
            ("n_estimators".to_string(), c.n_estimators.to_string()),
            ("learning_rate".to_string(), c.learning_rate.to_string()),
            ("max_depth".to_string(), c.max_depth.to_string()),
            ("min_samples_leaf".to_string(), c.min_samples_leaf.to_string()),
            ("subsample".to_string(), c.subsample.to_string()),
            ("colsample_bytree".to_string(), c.colsample_bytree.to_string()),
            ("random_state".to_string(), opt_to_string(c.random_state)),
        ])
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
