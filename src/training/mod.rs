//! Model training module
//!
//! Binary classifiers behind one [`Model`] contract:
//! - Logistic regression
//! - Decision tree (CART)
//! - Random forest
//! - Gradient boosted trees
//!
//! [`TrainEngine`] trains the configured candidates on a stratified split,
//! evaluates each on the held-out rows and selects the best one.

mod config;
mod engine;
mod models;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;

pub use config::{ModelType, TrainingConfig};
pub use engine::{select_best, CandidateResult, DataSplit, SelectionResult, TrainEngine, TrainedModel};
pub use models::{threshold, Model};
pub use linear_models::LogisticRegression;
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForest};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
