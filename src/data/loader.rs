//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use super::schema;
use super::table::Table;

/// Supported tabular source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Tsv,
}

impl SourceFormat {
    /// Detect format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "tsv" => Ok(SourceFormat::Tsv),
            other => Err(PipelineError::DataAccessError(format!(
                "unsupported file format '{}' for {}",
                other,
                path.display()
            ))),
        }
    }

    fn separator(&self) -> u8 {
        match self {
            SourceFormat::Csv => b',',
            SourceFormat::Tsv => b'\t',
        }
    }
}

/// Reads customer tables from delimited files.
///
/// Reading never mutates the source; the only side effect is the read itself.
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows sampled to infer column types
    infer_schema_length: Option<usize>,
    /// Columns that must be present for the load to succeed
    required_columns: Vec<String>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a loader that requires every feature column
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
            required_columns: schema::feature_columns()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Set number of rows used for type inference (`None` scans the whole file)
    pub fn with_infer_schema_length(mut self, n: Option<usize>) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Override the set of required columns
    pub fn with_required_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Load a table, checking that required columns are present.
    ///
    /// Fails with a data access error if the file cannot be opened, has an
    /// unsupported extension or cannot be parsed, and with a schema error if
    /// a required column is absent.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)?;
        let df = self.read_delimited(path, format)?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Read data source");

        let required: Vec<&str> = self.required_columns.iter().map(|s| s.as_str()).collect();
        let table = Table::with_required(df, &required)?;

        info!(path = %path.display(), rows = table.height(), "Loaded table");
        Ok(table)
    }

    fn read_delimited(&self, path: &Path, format: SourceFormat) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            PipelineError::DataAccessError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let parse_opts = CsvParseOptions::default().with_separator(format.separator());

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| {
                PipelineError::DataAccessError(format!("cannot parse {}: {}", path.display(), e))
            })
    }
}

/// Load a table with the default loader
pub fn load(path: impl AsRef<Path>) -> Result<Table> {
    DataLoader::new().load(path)
}

/// Data-quality gate applied before training.
///
/// Rejects an empty table and one whose share of missing cells exceeds
/// `max_missing_ratio`.
pub fn validate_quality(table: &Table, max_missing_ratio: f64) -> Result<()> {
    if table.is_empty() {
        return Err(PipelineError::ValidationError("table has no rows".to_string()));
    }

    let ratio = table.missing_ratio();
    if ratio > max_missing_ratio {
        return Err(PipelineError::ValidationError(format!(
            "{:.1}% of values are missing (limit {:.1}%)",
            ratio * 100.0,
            max_missing_ratio * 100.0
        )));
    }

    Ok(())
}

/// Save a table as CSV
pub fn save_csv(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    let mut df = table.frame().clone();

    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| PipelineError::DataAccessError(format!("cannot write {}: {}", path.display(), e)))?;

    info!(path = %path.display(), rows = table.height(), "Saved table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "customer_id,tenure,monthly_charges,total_charges,contract_type,payment_method,paperless_billing,internet_service,online_security,online_backup,device_protection,tech_support,streaming_tv,streaming_movies,churn";

    fn create_test_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    #[test]
    fn test_load_csv_preserves_rows() {
        let file = create_test_csv(&[
            "CUST000000,12,70.5,846.0,Month-to-month,Electronic check,Yes,Fiber optic,No,Yes,No,No,Yes,No,Yes",
            "CUST000001,40,30.0,,Two year,,No,No,No internet service,No internet service,No internet service,No internet service,No internet service,No internet service,No",
            "CUST000002,5,99.9,499.5,One year,Credit card,Yes,DSL,Yes,No,Yes,No,No,Yes,No",
        ]);

        let table = DataLoader::new().load(file.path()).unwrap();
        assert_eq!(table.height(), 3);
        assert_eq!(table.width(), 15);
        assert_eq!(table.null_count(), 2);
    }

    #[test]
    fn test_missing_file_is_data_access_error() {
        let err = load("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, PipelineError::DataAccessError(_)), "got {err:?}");
    }

    #[test]
    fn test_unsupported_extension_is_data_access_error() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::DataAccessError(_)));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "customer_id,tenure").unwrap();
        writeln!(file, "CUST000000,12").unwrap();

        let err = load(file.path()).unwrap_err();
        match err {
            PipelineError::SchemaError(cols) => {
                assert!(cols.contains(&"monthly_charges".to_string()));
                assert!(!cols.contains(&"tenure".to_string()));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_tsv_is_supported() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        writeln!(file, "a\tb").unwrap();
        writeln!(file, "1\t2").unwrap();

        let table = DataLoader::new()
            .with_required_columns(["a", "b"])
            .load(file.path())
            .unwrap();
        assert_eq!(table.height(), 1);
        assert_eq!(table.width(), 2);
    }

    #[test]
    fn test_validate_quality() {
        let file = create_test_csv(&[
            "CUST000000,12,70.5,846.0,Month-to-month,Electronic check,Yes,Fiber optic,No,Yes,No,No,Yes,No,Yes",
        ]);
        let table = load(file.path()).unwrap();
        assert!(validate_quality(&table, 0.5).is_ok());

        let empty = table.head(0);
        assert!(matches!(
            validate_quality(&empty, 0.5),
            Err(PipelineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let file = create_test_csv(&[
            "CUST000000,12,70.5,846.0,Month-to-month,Electronic check,Yes,Fiber optic,No,Yes,No,No,Yes,No,Yes",
            "CUST000001,40,30.0,,Two year,,No,No,No internet service,No internet service,No internet service,No internet service,No internet service,No internet service,No",
        ]);
        let table = load(file.path()).unwrap();

        let out = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        save_csv(&table, out.path()).unwrap();

        let reloaded = load(out.path()).unwrap();
        assert_eq!(reloaded.height(), 2);
        assert_eq!(reloaded.null_count(), table.null_count());
    }
}
