//! Model evaluation
//!
//! Pure, deterministic binary classification metrics.

mod metrics;

pub use metrics::{evaluate, ConfusionMatrix, EvaluationResult, Metric};
