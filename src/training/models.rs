//! Model trait and shared input checks

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Uniform contract over the binary classifiers.
///
/// Labels are 0.0 / 1.0 and `predict_proba` returns the probability of
/// class 1 for every row.
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of the positive class
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Class labels, thresholded at 0.5
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold(&self.predict_proba(x)?))
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Hyperparameters as loggable strings
    fn params(&self) -> BTreeMap<String, String>;

    fn is_fitted(&self) -> bool;
}

/// Map probabilities to 0/1 labels
pub fn threshold(proba: &Array1<f64>) -> Array1<f64> {
    proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 })
}

/// Validate a training set for a binary classifier
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    check_shapes(x, y)?;

    if let Some(i) = y.iter().position(|&v| v != 0.0 && v != 1.0) {
        return Err(PipelineError::ValidationError(format!(
            "label at row {} is {}, expected 0 or 1",
            i, y[i]
        )));
    }
    Ok(())
}

/// Validate sizes and finiteness without constraining label values
pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(PipelineError::ValidationError("training set is empty".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::ValidationError(
            "training data contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Validate the width of a matrix passed to a fitted model
pub(crate) fn check_features(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(PipelineError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Scale a vector of importances to sum to one (left as is when all zero)
pub(crate) fn normalize(mut values: Vec<f64>) -> Array1<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in &mut values {
            *v /= total;
        }
    }
    Array1::from_vec(values)
}
