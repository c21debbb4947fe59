//! Preprocessing configuration

use crate::data::schema;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use super::{ImputeStrategy, ScalerType};

/// Configuration for data preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Numeric feature columns, in output order
    pub numeric_columns: Vec<String>,

    /// Categorical feature columns, placed after the numeric ones
    pub categorical_columns: Vec<String>,

    /// Label column
    pub target_column: String,

    /// Strategy for handling missing numeric values
    pub numeric_impute_strategy: ImputeStrategy,

    /// Strategy for handling missing categorical values
    pub categorical_impute_strategy: ImputeStrategy,

    /// Type of scaler to use for numeric features
    pub scaler_type: ScalerType,

    /// Numeric columns where a negative value is rejected
    pub non_negative_columns: Vec<String>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_columns: to_owned(&schema::NUMERIC_COLUMNS),
            categorical_columns: to_owned(&schema::CATEGORICAL_COLUMNS),
            target_column: schema::TARGET_COLUMN.to_string(),
            numeric_impute_strategy: ImputeStrategy::Median,
            categorical_impute_strategy: ImputeStrategy::MissingCategory,
            scaler_type: ScalerType::Standard,
            non_negative_columns: to_owned(&schema::NUMERIC_COLUMNS),
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set numeric impute strategy
    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute_strategy = strategy;
        self
    }

    /// Builder method to set categorical impute strategy
    pub fn with_categorical_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.categorical_impute_strategy = strategy;
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to set the feature columns
    pub fn with_columns(mut self, numeric: &[&str], categorical: &[&str]) -> Self {
        self.numeric_columns = to_owned(numeric);
        self.categorical_columns = to_owned(categorical);
        self.non_negative_columns.retain(|c| numeric.contains(&c.as_str()));
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    /// All feature columns in matrix order
    pub fn feature_columns(&self) -> Vec<&str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(|s| s.as_str())
            .collect()
    }

    /// Check that the strategies fit their column kinds and that no column is
    /// used twice
    pub fn validate(&self) -> Result<()> {
        if !self.numeric_impute_strategy.is_numeric() {
            return Err(PipelineError::ConfigError(format!(
                "{:?} cannot impute numeric columns",
                self.numeric_impute_strategy
            )));
        }
        if self.categorical_impute_strategy.is_numeric() {
            return Err(PipelineError::ConfigError(format!(
                "{:?} cannot impute categorical columns",
                self.categorical_impute_strategy
            )));
        }

        let features = self.feature_columns();
        if features.is_empty() {
            return Err(PipelineError::ConfigError("no feature columns configured".to_string()));
        }
        for (i, name) in features.iter().enumerate() {
            if features[..i].contains(name) {
                return Err(PipelineError::ConfigError(format!("column '{}' listed twice", name)));
            }
            if *name == self.target_column {
                return Err(PipelineError::ConfigError(format!(
                    "target column '{}' cannot also be a feature",
                    name
                )));
            }
        }
        if let Some(col) = self
            .non_negative_columns
            .iter()
            .find(|c| !self.numeric_columns.contains(c))
        {
            return Err(PipelineError::ConfigError(format!(
                "non-negative column '{}' is not numeric",
                col
            )));
        }

        Ok(())
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
