//! Binary classification metrics

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A metric reported for every candidate model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Accuracy,
    Precision,
    Recall,
    F1,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Accuracy, Metric::Precision, Metric::Recall, Metric::F1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::F1 => "f1",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Metric::Accuracy),
            "precision" => Ok(Metric::Precision),
            "recall" => Ok(Metric::Recall),
            "f1" | "f1_score" => Ok(Metric::F1),
            other => Err(PipelineError::ConfigError(format!("unknown metric '{}'", other))),
        }
    }
}

/// Counts of a binary confusion matrix (positive class is 1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

/// Scores of one model on one split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub n_samples: usize,
    pub confusion: ConfusionMatrix,
    /// Metrics whose denominator was zero; they carry the 0.0 sentinel
    pub undefined: Vec<Metric>,
}

impl EvaluationResult {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::Precision => self.precision,
            Metric::Recall => self.recall,
            Metric::F1 => self.f1,
        }
    }

    pub fn is_defined(&self, metric: Metric) -> bool {
        !self.undefined.contains(&metric)
    }

    /// Metric name to score, in a stable order
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Metric::ALL
            .iter()
            .map(|m| (m.as_str().to_string(), self.get(*m)))
            .collect()
    }
}

/// Score binary predictions against ground truth.
///
/// Labels must be exactly 0.0 or 1.0. Precision without predicted positives,
/// recall without actual positives and F1 when both are zero report 0.0 and
/// are listed in [`EvaluationResult::undefined`].
pub fn evaluate(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<EvaluationResult> {
    if y_true.is_empty() {
        return Err(PipelineError::MetricError("cannot evaluate an empty split".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::MetricError(format!(
            "length mismatch: {} labels vs {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }

    let cm = confusion_counts(y_true, y_pred)?;
    let mut undefined = Vec::new();

    let accuracy = (cm.tp + cm.tn) as f64 / cm.total() as f64;

    let precision = if cm.tp + cm.fp > 0 {
        cm.tp as f64 / (cm.tp + cm.fp) as f64
    } else {
        undefined.push(Metric::Precision);
        0.0
    };

    let recall = if cm.tp + cm.fn_ > 0 {
        cm.tp as f64 / (cm.tp + cm.fn_) as f64
    } else {
        undefined.push(Metric::Recall);
        0.0
    };

    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        undefined.push(Metric::F1);
        0.0
    };

    Ok(EvaluationResult {
        accuracy,
        precision,
        recall,
        f1,
        n_samples: cm.total(),
        confusion: cm,
        undefined,
    })
}

fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<ConfusionMatrix> {
    let mut cm = ConfusionMatrix::default();

    for (i, (&t, &p)) in y_true.iter().zip(y_pred.iter()).enumerate() {
        match (as_label(t), as_label(p)) {
            (Some(true), Some(true)) => cm.tp += 1,
            (Some(false), Some(true)) => cm.fp += 1,
            (Some(false), Some(false)) => cm.tn += 1,
            (Some(true), Some(false)) => cm.fn_ += 1,
            _ => {
                return Err(PipelineError::MetricError(format!(
                    "non-binary label at index {}: true={}, predicted={}",
                    i, t, p
                )))
            }
        }
    }

    Ok(cm)
}

fn as_label(v: f64) -> Option<bool> {
    if v == 1.0 {
        Some(true)
    } else if v == 0.0 {
        Some(false)
    } else {
        None
    }
}
