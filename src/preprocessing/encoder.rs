//! Categorical label encoding with reserved codes

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{MISSING_CODE, MISSING_TOKEN, UNKNOWN_CODE};

/// Label encoder over a fixed, fit-time vocabulary.
///
/// Code 0 is reserved for values never seen at fit time and code 1 for the
/// explicit missing category. Observed values are sorted and numbered from 2,
/// so the same training data always yields the same codes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Encoder {
    // column name -> (category -> code)
    mappings: BTreeMap<String, BTreeMap<String, usize>>,
    is_fitted: bool,
}

impl Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.mappings.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::SchemaError(vec![col_name.to_string()]))?;
            let mapping = Self::build_mapping(column.as_materialized_series())?;
            self.mappings.insert(col_name.to_string(), mapping);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every fitted column with its `Float64` codes
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();

        for (col_name, mapping) in &self.mappings {
            if let Ok(column) = df.column(col_name) {
                let ca = column
                    .str()
                    .map_err(|e| PipelineError::ValidationError(format!("{}: {}", col_name, e)))?;

                let codes: Vec<f64> = ca
                    .into_iter()
                    .map(|v| Self::lookup(mapping, v) as f64)
                    .collect();

                result.with_column(Column::new(col_name.as_str().into(), codes))?;
            }
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Code for a single value of a fitted column
    pub fn encode(&self, column: &str, value: Option<&str>) -> Result<usize> {
        let mapping = self
            .mappings
            .get(column)
            .ok_or_else(|| PipelineError::SchemaError(vec![column.to_string()]))?;
        Ok(Self::lookup(mapping, value))
    }

    /// Fit-time vocabulary of a column
    pub fn vocabulary(&self, column: &str) -> Option<&BTreeMap<String, usize>> {
        self.mappings.get(column)
    }

    /// Number of distinct codes a column can take, reserved codes included
    pub fn n_codes(&self, column: &str) -> Option<usize> {
        self.mappings.get(column).map(|m| m.len() + 2)
    }

    fn lookup(mapping: &BTreeMap<String, usize>, value: Option<&str>) -> usize {
        match value {
            None | Some(MISSING_TOKEN) => MISSING_CODE,
            Some(v) => mapping.get(v).copied().unwrap_or(UNKNOWN_CODE),
        }
    }

    fn build_mapping(series: &Series) -> Result<BTreeMap<String, usize>> {
        let ca = series
            .str()
            .map_err(|e| PipelineError::ValidationError(format!("{}: {}", series.name(), e)))?;

        let observed: BTreeSet<&str> = ca
            .into_iter()
            .flatten()
            .filter(|v| *v != MISSING_TOKEN)
            .collect();

        Ok(observed
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v.to_string(), i + 2))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city_df() -> DataFrame {
        DataFrame::new(vec![
            Column::new("city".into(), &[Some("NYC"), Some("LA"), None, Some("SF"), Some("LA")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_codes_are_sorted_from_two() {
        let mut encoder = Encoder::new();
        encoder.fit(&city_df(), &["city"]).unwrap();

        let vocab = encoder.vocabulary("city").unwrap();
        assert_eq!(vocab.get("LA"), Some(&2));
        assert_eq!(vocab.get("NYC"), Some(&3));
        assert_eq!(vocab.get("SF"), Some(&4));
        assert_eq!(encoder.n_codes("city"), Some(5));
    }

    #[test]
    fn test_transform_label() {
        let mut encoder = Encoder::new();
        let result = encoder.fit_transform(&city_df(), &["city"]).unwrap();

        let codes: Vec<f64> = result
            .column("city")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(codes, vec![3.0, 2.0, MISSING_CODE as f64, 4.0, 2.0]);
    }

    #[test]
    fn test_unseen_value_maps_to_unknown() {
        let mut encoder = Encoder::new();
        encoder.fit(&city_df(), &["city"]).unwrap();

        assert_eq!(encoder.encode("city", Some("Paris")).unwrap(), UNKNOWN_CODE);
        assert_eq!(encoder.encode("city", None).unwrap(), MISSING_CODE);
        assert_eq!(encoder.encode("city", Some(MISSING_TOKEN)).unwrap(), MISSING_CODE);
    }

    #[test]
    fn test_missing_token_not_in_vocabulary() {
        let df = DataFrame::new(vec![
            Column::new("c".into(), &["a", MISSING_TOKEN, "b"]),
        ])
        .unwrap();

        let mut encoder = Encoder::new();
        encoder.fit(&df, &["c"]).unwrap();
        assert!(encoder.vocabulary("c").unwrap().get(MISSING_TOKEN).is_none());
    }

    #[test]
    fn test_unfitted_column_is_schema_error() {
        let encoder = Encoder::new();
        assert!(matches!(
            encoder.encode("city", Some("LA")),
            Err(PipelineError::SchemaError(_))
        ));
    }
}
