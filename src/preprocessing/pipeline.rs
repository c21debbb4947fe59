//! Data preprocessing pipeline

use crate::data::Table;
use crate::error::{PipelineError, Result};
use super::{
    config::PreprocessingConfig,
    encoder::Encoder,
    imputer::Imputer,
    scaler::Scaler,
};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Main data preprocessing pipeline.
///
/// `fit` learns imputation values, the categorical vocabulary and scaling
/// statistics from a training table. `transform` reuses them unchanged, so a
/// fitted preprocessor can be shipped next to a model and applied at serving
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
    numeric_imputer: Imputer,
    categorical_imputer: Imputer,
    scaler: Scaler,
    encoder: Encoder,
    is_fitted: bool,
}

impl Default for DataPreprocessor {
    fn default() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }
}

impl DataPreprocessor {
    /// Create a new preprocessor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new preprocessor with custom configuration
    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            numeric_imputer: Imputer::new(config.numeric_impute_strategy.clone()),
            categorical_imputer: Imputer::new(config.categorical_impute_strategy.clone()),
            scaler: Scaler::new(config.scaler_type.clone()),
            encoder: Encoder::new(),
            config,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Output column names, in matrix order
    pub fn feature_names(&self) -> Vec<String> {
        self.config
            .feature_columns()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Learn the preprocessing state from the feature columns of `table`.
    /// The target column is ignored.
    pub fn fit(&mut self, table: &Table) -> Result<&mut Self> {
        let start = Instant::now();
        self.config.validate()?;

        let df = self.prepare(table.frame())?;
        let numeric_columns = self.config.numeric_columns.clone();
        let categorical_columns = self.config.categorical_columns.clone();
        let numeric: Vec<&str> = numeric_columns.iter().map(String::as_str).collect();
        let categorical: Vec<&str> = categorical_columns.iter().map(String::as_str).collect();

        let imputed = self.numeric_imputer.fit_transform(&df, &numeric)?;
        let imputed = self.categorical_imputer.fit_transform(&imputed, &categorical)?;

        self.scaler.fit(&imputed, &numeric)?;
        self.encoder.fit(&imputed, &categorical)?;
        self.is_fitted = true;

        info!(
            rows = table.height(),
            numeric = numeric.len(),
            categorical = categorical.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted preprocessor"
        );
        Ok(self)
    }

    /// Transform the feature columns of `table` into a dense matrix.
    ///
    /// Uses only fitted state; unseen categories map to the unknown code.
    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let df = self.impute(table.frame())?;
        let df = self.scaler.transform(&df)?;
        let df = self.encoder.transform(&df)?;

        let matrix = columns_to_array2(&df, &self.config.feature_columns())?;
        debug!(rows = matrix.nrows(), cols = matrix.ncols(), "Transformed table");
        Ok(matrix)
    }

    /// Fit on `table`, then return its feature matrix and target vector.
    ///
    /// The target column is checked before anything is fitted.
    pub fn fit_transform(&mut self, table: &Table) -> Result<(Array2<f64>, Array1<f64>)> {
        let y = self.target_vector(table)?;
        self.fit(table)?;
        let x = self.transform(table)?;
        Ok((x, y))
    }

    /// Feature matrix and target vector of `table` using fitted state
    pub fn split_features_target(&self, table: &Table) -> Result<(Array2<f64>, Array1<f64>)> {
        let y = self.target_vector(table)?;
        let x = self.transform(table)?;
        Ok((x, y))
    }

    /// Binary target vector of `table`
    pub fn target_vector(&self, table: &Table) -> Result<Array1<f64>> {
        encode_target(table.frame(), &self.config.target_column)
    }

    /// Impute the feature columns of `table` and leave every other column as
    /// is. Numeric features come back as `Float64`, missing categoricals as
    /// the explicit missing category.
    pub fn clean(&self, table: &Table) -> Result<Table> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        Table::new(self.impute(table.frame())?)
    }

    /// Save the fitted state as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a preprocessor saved with [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn impute(&self, df: &DataFrame) -> Result<DataFrame> {
        let df = self.prepare(df)?;
        let df = self.numeric_imputer.transform(&df)?;
        self.categorical_imputer.transform(&df)
    }

    /// Check presence and types of the feature columns.
    ///
    /// Numerics are cast to `Float64` and must be finite; configured
    /// non-negative columns reject values below zero. Categoricals are cast to
    /// `String`.
    fn prepare(&self, df: &DataFrame) -> Result<DataFrame> {
        let missing: Vec<String> = self
            .config
            .feature_columns()
            .into_iter()
            .filter(|c| df.column(c).is_err())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaError(missing));
        }

        let mut result = df.clone();

        for name in &self.config.numeric_columns {
            let series = df.column(name)?.as_materialized_series();
            let casted = series.strict_cast(&DataType::Float64).map_err(|_| {
                PipelineError::ValidationError(format!("column '{}' is not numeric", name))
            })?;

            let non_negative = self.config.non_negative_columns.contains(name);
            for value in casted.f64()?.into_iter().flatten() {
                if value.is_infinite() {
                    return Err(PipelineError::ValidationError(format!(
                        "column '{}' contains an infinite value",
                        name
                    )));
                }
                if non_negative && value < 0.0 {
                    return Err(PipelineError::ValidationError(format!(
                        "column '{}' contains negative value {}",
                        name, value
                    )));
                }
            }

            result.with_column(casted)?;
        }

        for name in &self.config.categorical_columns {
            let series = df.column(name)?.as_materialized_series();
            if series.dtype() != &DataType::String {
                let casted = series.cast(&DataType::String)?;
                result.with_column(casted)?;
            }
        }

        Ok(result)
    }
}

/// Encode a binary label column as 0.0 / 1.0.
///
/// Accepts "Yes"/"No", "true"/"false" and 1/0 in any case or numeric type.
/// A missing column, a null label or any other value is a validation error.
pub fn encode_target(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let column = df.column(target).map_err(|_| {
        PipelineError::ValidationError(format!("target column '{}' not found", target))
    })?;
    let labels = column.as_materialized_series().cast(&DataType::String)?;

    let values = labels
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "yes" | "true" | "1" | "1.0") => Ok(1.0),
            Some(v) if matches!(v.as_str(), "no" | "false" | "0" | "0.0") => Ok(0.0),
            Some(v) => Err(PipelineError::ValidationError(format!(
                "target '{}' has non-binary value '{}' at row {}",
                target, v, row
            ))),
            None => Err(PipelineError::ValidationError(format!(
                "target '{}' is missing at row {}",
                target, row
            ))),
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(Array1::from_vec(values))
}

/// Stack `Float64` columns into a row-major matrix
fn columns_to_array2(df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let data: Vec<Vec<f64>> = columns
        .iter()
        .map(|name| {
            let ca = df.column(name)?.f64()?;
            ca.into_iter()
                .map(|v| {
                    v.filter(|x| x.is_finite()).ok_or_else(|| {
                        PipelineError::ValidationError(format!(
                            "column '{}' still has missing values after imputation",
                            name
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| data[j][i]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{MISSING_CODE, MISSING_TOKEN, UNKNOWN_CODE};

    fn customers() -> Table {
        let df = df!(
            "customer_id" => &["C1", "C2", "C3", "C4", "C5"],
            "tenure" => &[1i64, 12, 24, 36, 72],
            "monthly_charges" => &[20.0, 50.0, 70.0, 90.0, 110.0],
            "total_charges" => &[Some(20.0), Some(600.0), None, Some(3240.0), Some(7920.0)],
            "contract_type" => &["Month-to-month", "One year", "Two year", "Month-to-month", "Two year"],
            "payment_method" => &[Some("Electronic check"), None, Some("Credit card"), Some("Mailed check"), Some("Credit card")],
            "paperless_billing" => &["Yes", "No", "Yes", "No", "Yes"],
            "internet_service" => &["DSL", "Fiber optic", "No", "DSL", "Fiber optic"],
            "online_security" => &["Yes", "No", "No internet service", "No", "Yes"],
            "online_backup" => &["No", "Yes", "No internet service", "No", "Yes"],
            "device_protection" => &["No", "No", "No internet service", "Yes", "Yes"],
            "tech_support" => &["Yes", "No", "No internet service", "No", "Yes"],
            "streaming_tv" => &["No", "Yes", "No internet service", "Yes", "No"],
            "streaming_movies" => &["No", "No", "No internet service", "Yes", "Yes"],
            "churn" => &["Yes", "No", "No", "Yes", "No"]
        )
        .unwrap();
        Table::new(df).unwrap()
    }

    fn with_column(table: &Table, column: Column) -> Table {
        let mut df = table.frame().clone();
        df.with_column(column).unwrap();
        Table::new(df).unwrap()
    }

    #[test]
    fn test_fit_transform_shapes() {
        let mut pre = DataPreprocessor::new();
        let (x, y) = pre.fit_transform(&customers()).unwrap();

        assert_eq!(x.dim(), (5, 13));
        assert_eq!(y.len(), 5);
        assert!(x.iter().all(|v| v.is_finite()), "matrix must not contain NaN");
        assert_eq!(y.to_vec(), vec![1.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(pre.feature_names().len(), 13);
    }

    #[test]
    fn test_missing_category_gets_reserved_code() {
        let mut pre = DataPreprocessor::new();
        let (x, _) = pre.fit_transform(&customers()).unwrap();

        let payment_idx = pre.feature_names().iter().position(|c| c == "payment_method").unwrap();
        assert_eq!(x[[1, payment_idx]], MISSING_CODE as f64);
    }

    #[test]
    fn test_unseen_category_maps_to_unknown() {
        let mut pre = DataPreprocessor::new();
        pre.fit(&customers()).unwrap();

        let serve = with_column(
            &customers(),
            Column::new("contract_type".into(), &["Ten year", "One year", "Two year", "Month-to-month", "Two year"]),
        );
        let x = pre.transform(&serve).unwrap();
        let idx = pre.feature_names().iter().position(|c| c == "contract_type").unwrap();
        assert_eq!(x[[0, idx]], UNKNOWN_CODE as f64);
    }

    #[test]
    fn test_transform_is_repeatable() {
        let mut pre = DataPreprocessor::new();
        let table = customers();
        pre.fit(&table).unwrap();

        let a = pre.transform(&table).unwrap();
        let b = pre.transform(&table).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_refit_replaces_state() {
        let mut pre = DataPreprocessor::new();
        pre.fit(&customers()).unwrap();
        let idx = pre.feature_names().iter().position(|c| c == "contract_type").unwrap();
        assert_ne!(pre.transform(&customers()).unwrap()[[1, idx]], UNKNOWN_CODE as f64);

        let refit_on = with_column(
            &customers(),
            Column::new("contract_type".into(), &["Ten year"; 5]),
        );
        pre.fit(&refit_on).unwrap();
        assert!(pre.is_fitted());
        assert_eq!(pre.transform(&customers()).unwrap()[[1, idx]], UNKNOWN_CODE as f64);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let mut pre = DataPreprocessor::new();
        let table = customers();
        pre.fit(&table).unwrap();

        let once = pre.clean(&table).unwrap();
        let twice = pre.clean(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.null_count(), 0);
        assert_eq!(
            once.frame().column("payment_method").unwrap().str().unwrap().get(1),
            Some(MISSING_TOKEN)
        );
        assert_eq!(pre.transform(&once).unwrap(), pre.transform(&table).unwrap());
    }

    #[test]
    fn test_missing_target_is_validation_error() {
        let mut pre = DataPreprocessor::new();
        let table = customers().without_target();
        let err = pre.fit_transform(&table).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationError(_)));
        assert!(!pre.is_fitted(), "nothing is fitted when the target is absent");
    }

    #[test]
    fn test_negative_total_charges_rejected() {
        let table = with_column(
            &customers(),
            Column::new("total_charges".into(), &[20.0, -1.0, 100.0, 3240.0, 7920.0]),
        );
        let mut pre = DataPreprocessor::new();
        assert!(matches!(pre.fit(&table), Err(PipelineError::ValidationError(_))));
    }

    #[test]
    fn test_non_numeric_tenure_rejected() {
        let table = with_column(
            &customers(),
            Column::new("tenure".into(), &["1", "twelve", "24", "36", "72"]),
        );
        let mut pre = DataPreprocessor::new();
        assert!(matches!(pre.fit(&table), Err(PipelineError::ValidationError(_))));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let pre = DataPreprocessor::new();
        assert!(matches!(pre.transform(&customers()), Err(PipelineError::ModelNotFitted)));
    }

    #[test]
    fn test_encode_target_variants() {
        let df = df!("churn" => &[1i64, 0, 1]).unwrap();
        assert_eq!(encode_target(&df, "churn").unwrap().to_vec(), vec![1.0, 0.0, 1.0]);

        let df = df!("churn" => &["TRUE", "no", "Yes"]).unwrap();
        assert_eq!(encode_target(&df, "churn").unwrap().to_vec(), vec![1.0, 0.0, 1.0]);

        let df = df!("churn" => &["maybe"]).unwrap();
        assert!(matches!(encode_target(&df, "churn"), Err(PipelineError::ValidationError(_))));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preprocessor.json");

        let mut pre = DataPreprocessor::new();
        pre.fit(&customers()).unwrap();
        pre.save(&path).unwrap();

        let loaded = DataPreprocessor::load(&path).unwrap();
        assert!(loaded.is_fitted());
        assert_eq!(loaded.transform(&customers()).unwrap(), pre.transform(&customers()).unwrap());
    }
}
