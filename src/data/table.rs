//! In-memory customer table

use crate::error::{PipelineError, Result};
use polars::prelude::*;

use super::schema;

/// An ordered collection of customer records sharing the fixed column schema.
///
/// Wraps a polars [`DataFrame`]; construction guarantees that every feature
/// column is present. The identifier and the churn label are optional so the
/// same type serves training and inference.
#[derive(Debug, Clone)]
pub struct Table {
    df: DataFrame,
}

impl Table {
    /// Wrap a frame, failing with a schema error if any feature column is absent
    pub fn new(df: DataFrame) -> Result<Self> {
        Self::with_required(df, &schema::feature_columns())
    }

    /// Wrap a frame that must contain `required` columns
    pub fn with_required(df: DataFrame, required: &[&str]) -> Result<Self> {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| df.column(name).is_err())
            .map(|name| name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::SchemaError(missing));
        }

        Ok(Self { df })
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Borrow the underlying frame
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    /// Total number of missing cells across all columns
    pub fn null_count(&self) -> usize {
        self.df.get_columns().iter().map(|c| c.null_count()).sum()
    }

    /// Fraction of cells that are missing (0.0 for an empty table)
    pub fn missing_ratio(&self) -> f64 {
        let cells = self.height() * self.width();
        if cells == 0 {
            return 0.0;
        }
        self.null_count() as f64 / cells as f64
    }

    /// Copy of the table without the churn label
    pub fn without_target(&self) -> Table {
        let df = self
            .df
            .drop(schema::TARGET_COLUMN)
            .unwrap_or_else(|_| self.df.clone());
        Table { df }
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Table {
        Table {
            df: self.df.head(Some(n)),
        }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.df.equals_missing(&other.df)
    }
}
