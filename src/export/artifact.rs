//! Model artifact
//!
//! The unit a training run hands to the serving side: the selected model
//! together with the fitted preprocessing state it was trained behind.

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::data::Table;
use crate::error::{PipelineError, Result};
use crate::preprocessing::DataPreprocessor;
use crate::tracking::ExperimentTracker;
use crate::training::{ModelType, TrainedModel};

/// Artifact layout version written into every artifact
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Name of the model artifact inside a tracked run
pub const MODEL_ARTIFACT: &str = "model.json";

/// Name of the feature importance artifact inside a tracked run
pub const IMPORTANCE_ARTIFACT: &str = "feature_importance.json";

/// Importance of one input feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Serialized trained model plus fitted preprocessing state.
///
/// Read-only once created: scoring goes through [`predict`](Self::predict)
/// on raw tables, which are preprocessed with the stored state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub model_type: ModelType,
    /// Matrix column order the model was trained on
    pub feature_names: Vec<String>,
    /// Held-out metrics of the model at selection time
    pub metrics: BTreeMap<String, f64>,
    preprocessor: DataPreprocessor,
    model: TrainedModel,
}

impl ModelArtifact {
    /// Bundle a fitted preprocessor and model
    pub fn new(
        preprocessor: DataPreprocessor,
        model: TrainedModel,
        metrics: BTreeMap<String, f64>,
    ) -> Result<Self> {
        if !preprocessor.is_fitted() || !model.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: Utc::now(),
            model_type: model.model_type(),
            feature_names: preprocessor.feature_names(),
            metrics,
            preprocessor,
            model,
        })
    }

    pub fn preprocessor(&self) -> &DataPreprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Churn labels (0/1) for each row of `table`
    pub fn predict(&self, table: &Table) -> Result<Array1<f64>> {
        let x = self.preprocessor.transform(table)?;
        self.model.predict(&x)
    }

    /// Churn probabilities for each row of `table`
    pub fn predict_proba(&self, table: &Table) -> Result<Array1<f64>> {
        let x = self.preprocessor.transform(table)?;
        self.model.predict_proba(&x)
    }

    /// Feature importances of the model, highest first.
    ///
    /// Empty when the model does not expose importances.
    pub fn feature_importances(&self) -> Vec<FeatureImportance> {
        let Some(values) = self.model.feature_importances() else {
            return Vec::new();
        };
        let mut ranked: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .zip(values.iter())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        // stable: equal importances keep matrix order
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(bytes)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(PipelineError::SerializationError(format!(
                "unsupported artifact format version {} (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if !artifact.preprocessor.is_fitted() || !artifact.model.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        Ok(artifact)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes()?)?;
        info!(path = %path.display(), model = %self.model_type, "Saved model artifact");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    /// Load the model artifact logged to `run_id`
    pub fn from_run(tracker: &ExperimentTracker, run_id: &str) -> Result<Self> {
        Self::from_bytes(&tracker.load_artifact(run_id, MODEL_ARTIFACT)?)
    }
}
