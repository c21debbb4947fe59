//! Feature scaling implementations

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// No scaling
    None,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// mean or min
    pub center: f64,
    /// std or range; never zero
    pub scale: f64,
}

/// Feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: BTreeMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: BTreeMap::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the scaler to `Float64` columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.params.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::SchemaError(vec![col_name.to_string()]))?;

            let params = self.compute_params(column.as_materialized_series())?;
            self.params.insert(col_name.to_string(), params);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data.
    /// Builds all replacement columns first, then applies them in a single pass.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .filter_map(|(col_name, params)| {
                df.column(col_name)
                    .ok()
                    .map(|column| Self::scale_series(column.as_materialized_series(), params))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fitted parameters of a column
    pub fn params(&self, column: &str) -> Option<&ScalerParams> {
        self.params.get(column)
    }

    fn compute_params(&self, series: &Series) -> Result<ScalerParams> {
        let ca = series
            .f64()
            .map_err(|e| PipelineError::ValidationError(format!("{}: {}", series.name(), e)))?;
        let values: Vec<f64> = ca.into_iter().flatten().filter(|v| !v.is_nan()).collect();

        if values.is_empty() {
            return Ok(ScalerParams { center: 0.0, scale: 1.0 });
        }

        match self.scaler_type {
            ScalerType::Standard => {
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                // population std, matching the usual z-score definition
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                Ok(ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                })
            }
            ScalerType::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                Ok(ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                })
            }
            ScalerType::None => Ok(ScalerParams { center: 0.0, scale: 1.0 }),
        }
    }

    fn scale_series(series: &Series, params: &ScalerParams) -> Result<Series> {
        let ca = series
            .f64()
            .map_err(|e| PipelineError::ValidationError(format!("{}: {}", series.name(), e)))?;

        let scaled: Float64Chunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| (v - params.center) / params.scale))
            .collect();

        Ok(scaled.with_name(series.name().clone()).into_series())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("a".into(), &[1.0, 2.0, 3.0, 4.0, 5.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_standard_scaler() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        let result = scaler.fit_transform(&frame(), &["a"]).unwrap();

        let values: Vec<f64> = result.column("a").unwrap().f64().unwrap().into_iter().flatten().collect();
        let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        let var: f64 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 1e-10);
        assert!((var - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_minmax_scaler() {
        let mut scaler = Scaler::new(ScalerType::MinMax);
        let result = scaler.fit_transform(&frame(), &["a"]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        assert!((col.get(0).unwrap() - 0.0).abs() < 1e-10);
        assert!((col.get(4).unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_constant_column_has_unit_scale() {
        let df = DataFrame::new(vec![Column::new("a".into(), &[7.0, 7.0, 7.0])]).unwrap();
        let mut scaler = Scaler::new(ScalerType::Standard);
        let result = scaler.fit_transform(&df, &["a"]).unwrap();

        assert_eq!(scaler.params("a").unwrap().scale, 1.0);
        let col = result.column("a").unwrap().f64().unwrap();
        assert!(col.into_iter().flatten().all(|v| v == 0.0));
    }

    #[test]
    fn test_statistics_reused_at_inference() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&frame(), &["a"]).unwrap();

        let serve = DataFrame::new(vec![Column::new("a".into(), &[3.0])]).unwrap();
        let result = scaler.transform(&serve).unwrap();
        let col = result.column("a").unwrap().f64().unwrap();
        assert!(col.get(0).unwrap().abs() < 1e-10);
    }
}
