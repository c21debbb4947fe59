//! Integration tests for data ingestion: loading, schema checks, quality gate
//! and synthetic generation

use churn_pipeline::data::{self, generate_customer_data, schema, DataLoader, SyntheticConfig};
use churn_pipeline::error::{ErrorKind, PipelineError};
use std::io::Write;

const HEADER: &str = "customer_id,tenure,monthly_charges,total_charges,contract_type,payment_method,paperless_billing,internet_service,online_security,online_backup,device_protection,tech_support,streaming_tv,streaming_movies,churn";

fn write_file(suffix: &str, lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[test]
fn test_generated_table_survives_csv_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("customers.csv");

    let table = generate_customer_data(&SyntheticConfig::new(120).with_seed(2)).unwrap();
    data::save_csv(&table, &path).unwrap();

    let loaded = data::load(&path).unwrap();
    assert_eq!(loaded.height(), 120);
    assert_eq!(loaded.null_count(), table.null_count());
    for column in schema::record_columns() {
        assert!(loaded.has_column(column), "missing {}", column);
    }
}

#[test]
fn test_missing_column_is_schema_error() {
    let file = write_file(".csv", &["customer_id,tenure,churn", "C1,3,Yes"]);
    match data::load(file.path()) {
        Err(PipelineError::SchemaError(missing)) => {
            assert!(missing.contains(&"monthly_charges".to_string()));
            assert!(missing.contains(&"streaming_movies".to_string()));
            assert!(!missing.contains(&"tenure".to_string()));
        }
        other => panic!("expected schema error, got {:?}", other.map(|t| t.height())),
    }
}

#[test]
fn test_unsupported_and_absent_sources() {
    let file = write_file(".xlsx", &[HEADER]);
    assert_eq!(data::load(file.path()).unwrap_err().kind(), ErrorKind::DataAccess);

    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        data::load(dir.path().join("nope.csv")).unwrap_err().kind(),
        ErrorKind::DataAccess
    );
}

#[test]
fn test_tsv_source() {
    let header = HEADER.replace(',', "\t");
    let row = "C1,12,70.5,846.0,Month-to-month,Electronic check,Yes,Fiber optic,No,Yes,No,No,Yes,No,Yes".replace(',', "\t");
    let file = write_file(".tsv", &[&header, &row]);

    let table = data::load(file.path()).unwrap();
    assert_eq!(table.height(), 1);
    assert_eq!(table.width(), 15);
}

#[test]
fn test_inference_table_needs_no_label() {
    let header = HEADER.trim_end_matches(",churn");
    let file = write_file(
        ".csv",
        &[header, "C1,12,70.5,846.0,Month-to-month,Electronic check,Yes,Fiber optic,No,Yes,No,No,Yes,No"],
    );
    let table = DataLoader::new().load(file.path()).unwrap();
    assert!(!table.has_column(schema::TARGET_COLUMN));
}

#[test]
fn test_quality_gate() {
    let table = generate_customer_data(&SyntheticConfig::new(50).with_seed(1)).unwrap();
    assert!(data::validate_quality(&table, 0.5).is_ok());
    assert!(data::validate_quality(&table, 0.0).is_err());
    assert!(data::validate_quality(&table.head(0), 0.5).is_err());
}

#[test]
fn test_generator_is_seeded() {
    let config = SyntheticConfig::new(40).with_seed(77);
    let a = generate_customer_data(&config).unwrap();
    let b = generate_customer_data(&config).unwrap();
    let c = generate_customer_data(&config.clone().with_seed(78)).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
}
