//! Data ingestion
//!
//! Loads customer tables from delimited files, validates the column schema
//! and generates synthetic data sets.

pub mod schema;
mod table;
mod loader;
pub mod synthetic;

pub use table::Table;
pub use loader::{load, save_csv, validate_quality, DataLoader, SourceFormat};
pub use synthetic::{generate_customer_data, SyntheticConfig};
