//! Random Forest implementation

use crate::error::{PipelineError, Result};
use super::decision_tree::{opt_to_string, Criterion, DecisionTree};
use super::models::{check_features, check_training_data, normalize, Model};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// Bagged ensemble of classification trees with per-split feature sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        seed: u64,
        max_features: usize,
    ) -> Result<DecisionTree> {
        let n_samples = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut tree = DecisionTree::new_classifier()
            .with_criterion(self.criterion)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(max_features)
            .with_random_state(seed);
        tree.max_depth = self.max_depth;

        if self.bootstrap {
            let sample_indices: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            let x_boot = x.select(Axis(0), &sample_indices);
            let y_boot = y.select(Axis(0), &sample_indices);
            tree.fit_values(&x_boot, &y_boot)?;
        } else {
            tree.fit_values(x, y)?;
        }

        Ok(tree)
    }
}

impl Model for RandomForest {
    /// Fit the forest; trees are grown in parallel, each from its own seed
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.n_estimators == 0 {
            return Err(PipelineError::ConfigError("n_estimators must be positive".to_string()));
        }

        let n_features = x.ncols();
        let max_features = self.compute_max_features(n_features);
        // without a random_state every fit draws a fresh base seed
        let base_seed = self.random_state.unwrap_or_else(rand::random::<u64>);

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| self.build_tree(x, y, base_seed.wrapping_add(tree_idx as u64), max_features))
            .collect::<Result<_>>()?;

        let mut total = vec![0.0; n_features];
        for tree in &trees {
            if let Some(imp) = tree.feature_importances() {
                for (t, v) in total.iter_mut().zip(imp.iter()) {
                    *t += v;
                }
            }
        }

        self.n_features = n_features;
        self.trees = trees;
        self.feature_importances = Some(normalize(total));
        Ok(())
    }

    /// Mean of the per-tree positive-class fractions
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_features(x, self.n_features)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_values(x))
            .collect::<Result<_>>()?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for p in &per_tree {
            sum += p;
        }
        Ok(sum / per_tree.len() as f64)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("n_estimators".to_string(), self.n_estimators.to_string()),
            ("max_depth".to_string(), opt_to_string(self.max_depth)),
            ("max_features".to_string(), format!("{:?}", self.max_features).to_lowercase()),
            ("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()),
            ("bootstrap".to_string(), self.bootstrap.to_string()),
            ("random_state".to_string(), opt_to_string(self.random_state)),
        ])
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((120, 4), |(i, j)| ((i * 7 + j * 13) % 17) as f64 + (j as f64) * 0.1);
        let y: Array1<f64> = x.rows().into_iter().map(|r| if r[0] + r[1] > 16.0 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_forest_fits_training_data() {
        let (x, y) = classification_data();
        let mut forest = RandomForest::new(20).with_random_state(7);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.n_trees(), 20);
        let predictions = forest.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct as f64 / y.len() as f64 > 0.9, "training accuracy too low: {}", correct);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = classification_data();
        let fit = || {
            let mut forest = RandomForest::new(10).with_random_state(11);
            forest.fit(&x, &y).unwrap();
            forest.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_unseeded_forests_differ() {
        let (x, y) = classification_data();
        let fit = || {
            let mut forest = RandomForest::new(10);
            forest.fit(&x, &y).unwrap();
            forest.predict_proba(&x).unwrap()
        };
        assert_ne!(fit(), fit());
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = classification_data();
        let mut forest = RandomForest::new(10).with_random_state(1);
        forest.fit(&x, &y).unwrap();

        let importances = forest.feature_importances().unwrap();
        assert_eq!(importances.len(), 4);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_features_bounds() {
        let forest = RandomForest::new(1);
        assert_eq!(forest.compute_max_features(13), 4);
        assert_eq!(forest.clone().with_max_features(MaxFeatures::Fixed(50)).compute_max_features(13), 13);
        assert_eq!(forest.with_max_features(MaxFeatures::Fraction(0.0)).compute_max_features(13), 1);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let forest = RandomForest::new(3);
        assert!(matches!(
            forest.predict(&Array2::zeros((1, 2))),
            Err(PipelineError::ModelNotFitted)
        ));
    }
}
