//! Decision tree implementation

use crate::error::{PipelineError, Result};
use super::models::{check_features, check_shapes, check_training_data, normalize, Model};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decision tree node.
///
/// Nodes live in a flat arena and children are referenced by index, so the
/// serialized form stays shallow no matter how deep the tree grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

impl Criterion {
    pub fn is_classification(&self) -> bool {
        matches!(self, Criterion::Gini | Criterion::Entropy)
    }
}

/// Running label statistics of a node.
///
/// For 0/1 labels the mean is the positive-class fraction, so every
/// criterion can be evaluated from these three sums.
#[derive(Debug, Clone, Copy, Default)]
struct NodeStats {
    count: f64,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn from_indices(y: &Array1<f64>, indices: &[usize]) -> Self {
        let mut stats = Self::default();
        for &i in indices {
            stats.add(y[i]);
        }
        stats
    }

    fn add(&mut self, v: f64) {
        self.count += 1.0;
        self.sum += v;
        self.sq_sum += v * v;
    }

    fn remove(&mut self, v: f64) {
        self.count -= 1.0;
        self.sum -= v;
        self.sq_sum -= v * v;
    }

    fn mean(&self) -> f64 {
        if self.count > 0.0 {
            self.sum / self.count
        } else {
            0.0
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count <= 0.0 {
            return 0.0;
        }
        let p = self.mean();
        match criterion {
            Criterion::Gini => 2.0 * p * (1.0 - p),
            Criterion::Entropy => {
                if p <= 0.0 || p >= 1.0 {
                    0.0
                } else {
                    -(p * p.ln() + (1.0 - p) * (1.0 - p).ln())
                }
            }
            Criterion::MSE => (self.sq_sum / self.count - p * p).max(0.0),
        }
    }
}

/// CART decision tree.
///
/// With a classification criterion the leaves hold the fraction of positive
/// labels, which doubles as the predicted probability. With `MSE` the leaves
/// hold the mean target, which is what gradient boosting needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for every split (`None` = all)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature sampling
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            nodes: Vec::new(),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Grow the tree on `x`, `y`.
    ///
    /// Classification criteria require 0/1 labels; `MSE` accepts any finite
    /// target. A set too small to split becomes a single leaf.
    pub fn fit_values(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if self.criterion.is_classification() {
            check_training_data(x, y)?;
        } else {
            check_shapes(x, y)?;
        }

        let n_features = x.ncols();
        self.n_features = n_features;
        self.nodes.clear();

        let mut importances = vec![0.0; n_features];
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let indices: Vec<usize> = (0..x.nrows()).collect();

        let mut nodes = Vec::new();
        self.build_tree(x, y, &indices, 0, &mut importances, &mut rng, &mut nodes);
        self.nodes = nodes;
        self.feature_importances = Some(normalize(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
        nodes: &mut Vec<TreeNode>,
    ) -> usize {
        let n_samples = indices.len();
        let stats = NodeStats::from_indices(y, indices);
        let impurity = stats.impurity(self.criterion);

        let id = nodes.len();
        nodes.push(TreeNode::Leaf {
            value: stats.mean(),
            n_samples,
        });

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;
        if should_stop {
            return id;
        }

        let features = self.candidate_features(rng);
        let Some((feature_idx, threshold, gain)) =
            self.find_best_split(x, y, indices, &features, &stats, impurity)
        else {
            return id;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);
        if left_indices.is_empty() || right_indices.is_empty() {
            return id;
        }

        importances[feature_idx] += n_samples as f64 * gain;

        let left = self.build_tree(x, y, &left_indices, depth + 1, importances, rng, nodes);
        let right = self.build_tree(x, y, &right_indices, depth + 1, importances, rng, nodes);

        nodes[id] = TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        };
        id
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut features = rand::seq::index::sample(rng, self.n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Best (feature, threshold, gain) over `features`; ties keep the
    /// lowest feature index
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                self.best_threshold(x, y, indices, feature_idx, parent, parent_impurity)
                    .map(|(threshold, gain)| (feature_idx, threshold, gain))
            })
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, f64, f64)>, candidate| match best {
                Some(b) if candidate.2 <= b.2 => Some(b),
                _ => Some(candidate),
            })
    }

    /// Sweep the rows sorted by one feature, moving one row at a time from the
    /// right child to the left child
    fn best_threshold(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
        parent: &NodeStats,
        parent_impurity: f64,
    ) -> Option<(f64, f64)> {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

        let n = order.len();
        let mut left = NodeStats::default();
        let mut right = *parent;
        let mut best: Option<(f64, f64)> = None;

        for k in 0..n - 1 {
            let yi = y[order[k]];
            left.add(yi);
            right.remove(yi);

            let current = x[[order[k], feature_idx]];
            let next = x[[order[k + 1], feature_idx]];
            if current == next {
                continue;
            }

            let n_left = k + 1;
            if n_left < self.min_samples_leaf || n - n_left < self.min_samples_leaf {
                continue;
            }

            let weighted = (left.count * left.impurity(self.criterion)
                + right.count * right.impurity(self.criterion))
                / n as f64;
            let gain = parent_impurity - weighted;

            if gain > 1e-12 && best.map_or(true, |(_, g)| gain > g) {
                best = Some(((current + next) / 2.0, gain));
            }
        }

        best
    }

    /// Leaf value for every row
    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_features(x, self.n_features)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut id = 0;
                loop {
                    match &self.nodes[id] {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            id = if row[*feature_idx] <= *threshold { *left } else { *right };
                        }
                    }
                }
            })
            .collect())
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        if self.nodes.is_empty() {
            0
        } else {
            self.node_depth(0)
        }
    }

    fn node_depth(&self, id: usize) -> usize {
        match &self.nodes[id] {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + self.node_depth(*left).max(self.node_depth(*right)),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }
}

impl Model for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if !self.criterion.is_classification() {
            return Err(PipelineError::ConfigError(
                "a regression tree cannot be used as a classifier".to_string(),
            ));
        }
        self.fit_values(x, y)?;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_values(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("criterion".to_string(), format!("{:?}", self.criterion).to_lowercase()),
            ("max_depth".to_string(), opt_to_string(self.max_depth)),
            ("min_samples_split".to_string(), self.min_samples_split.to_string()),
            ("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()),
        ])
    }

    fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }
}

pub(crate) fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit_values(&x, &y).unwrap();

        let predictions = tree.predict_values(&x).unwrap();
        let mse: f64 = predictions.iter().zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>() / y.len() as f64;
        assert!(mse < 1.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3, "depth counts the root level");
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_single_row_becomes_leaf() {
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&array![[1.0]], &array![1.0]).unwrap();
        assert_eq!(tree.get_n_leaves(), 1);
        assert_eq!(tree.predict_proba(&array![[5.0]]).unwrap()[0], 1.0);
    }

    #[test]
    fn test_probabilities_are_leaf_fractions() {
        let x = array![[0.0], [0.0], [0.0], [0.0]];
        let y = array![1.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict_proba(&array![[0.0]]).unwrap()[0], 0.75);
    }

    #[test]
    fn test_feature_sampling_is_seeded() {
        let x = Array2::from_shape_fn((40, 6), |(i, j)| ((i * (j + 3)) % 11) as f64);
        let y: Array1<f64> = (0..40).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();

        let fit = |seed| {
            let mut tree = DecisionTree::new_classifier().with_max_features(2).with_random_state(seed);
            tree.fit(&x, &y).unwrap();
            tree.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(3), fit(3));
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let mut tree = DecisionTree::new_classifier();
        assert!(tree.fit(&array![[1.0], [2.0]], &array![0.0, 0.5]).is_err());
    }

    #[test]
    fn test_tree_serializes_flat() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..64).map(|i| (i % 2) as f64).collect();

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() > 6);

        let json = serde_json::to_string(&tree).unwrap();
        let restored: DecisionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), tree.predict(&x).unwrap());
    }
}
