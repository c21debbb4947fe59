//! Missing value imputation strategies

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MISSING_TOKEN;

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean (numeric only)
    Mean,
    /// Replace with median (numeric only)
    Median,
    /// Replace with a constant value (numeric only)
    Constant(f64),
    /// Replace with the most frequent value (categorical only)
    MostFrequent,
    /// Replace with the explicit missing category (categorical only)
    MissingCategory,
}

impl ImputeStrategy {
    /// Whether the strategy applies to numeric columns
    pub fn is_numeric(&self) -> bool {
        matches!(self, ImputeStrategy::Mean | ImputeStrategy::Median | ImputeStrategy::Constant(_))
    }
}

/// Imputer for handling missing values.
///
/// Fill values are computed once at fit time and reused verbatim by every
/// later `transform`; inference data never changes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: BTreeMap<String, ImputeValue>,
    is_fitted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    Category(String),
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: BTreeMap::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the imputer to the data.
    ///
    /// Numeric strategies expect `Float64` columns, categorical strategies
    /// expect `String` columns.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.fill_values.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::SchemaError(vec![col_name.to_string()]))?;

            let fill_value = self.compute_fill_value(column.as_materialized_series())?;
            self.fill_values.insert(col_name.to_string(), fill_value);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data by imputing missing values
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();

        for (col_name, fill_value) in &self.fill_values {
            if let Ok(col) = df.column(col_name) {
                let series = col.as_materialized_series();
                let filled = Self::fill_series(series, fill_value)?;
                result.with_column(filled)?;
            }
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fitted numeric fill value for a column
    pub fn numeric_fill_value(&self, column: &str) -> Option<f64> {
        match self.fill_values.get(column) {
            Some(ImputeValue::Numeric(v)) => Some(*v),
            _ => None,
        }
    }

    /// Fitted categorical fill value for a column
    pub fn category_fill_value(&self, column: &str) -> Option<&str> {
        match self.fill_values.get(column) {
            Some(ImputeValue::Category(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    fn compute_fill_value(&self, series: &Series) -> Result<ImputeValue> {
        match &self.strategy {
            ImputeStrategy::Mean => {
                let values = observed_numeric(series)?;
                let mean = if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                };
                Ok(ImputeValue::Numeric(mean))
            }
            ImputeStrategy::Median => {
                let values = observed_numeric(series)?;
                Ok(ImputeValue::Numeric(median(values)))
            }
            ImputeStrategy::Constant(val) => Ok(ImputeValue::Numeric(*val)),
            ImputeStrategy::MostFrequent => Ok(ImputeValue::Category(Self::compute_mode_string(series)?)),
            ImputeStrategy::MissingCategory => Ok(ImputeValue::Category(MISSING_TOKEN.to_string())),
        }
    }

    /// Most frequent value; ties go to the lexicographically smallest
    fn compute_mode_string(series: &Series) -> Result<String> {
        let ca = series
            .str()
            .map_err(|e| PipelineError::ValidationError(format!("{}: {}", series.name(), e)))?;

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for val in ca.into_iter().flatten() {
            *counts.entry(val).or_insert(0) += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for (value, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }

        Ok(best
            .map(|(v, _)| v.to_string())
            .unwrap_or_else(|| MISSING_TOKEN.to_string()))
    }

    fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Series> {
        match fill_value {
            ImputeValue::Numeric(val) => {
                let ca = series
                    .f64()
                    .map_err(|e| PipelineError::ValidationError(format!("{}: {}", series.name(), e)))?;

                // NaN counts as missing
                let filled: Float64Chunked = ca
                    .into_iter()
                    .map(|opt| Some(opt.filter(|v| !v.is_nan()).unwrap_or(*val)))
                    .collect();

                Ok(filled.with_name(series.name().clone()).into_series())
            }
            ImputeValue::Category(val) => {
                let ca = series
                    .str()
                    .map_err(|e| PipelineError::ValidationError(format!("{}: {}", series.name(), e)))?;

                let filled: StringChunked = ca
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(val.as_str())))
                    .collect();

                Ok(filled.with_name(series.name().clone()).into_series())
            }
        }
    }
}

/// Non-missing, non-NaN values of a `Float64` series
fn observed_numeric(series: &Series) -> Result<Vec<f64>> {
    let ca = series
        .f64()
        .map_err(|e| PipelineError::ValidationError(format!("{}: {}", series.name(), e)))?;
    Ok(ca.into_iter().flatten().filter(|v| !v.is_nan()).collect())
}

/// Median of the values, 0.0 when empty
fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
