//! Data preprocessing module
//!
//! Turns a customer [`Table`](crate::data::Table) into a dense feature matrix:
//! - Missing value imputation (median for numerics, explicit category for strings)
//! - Label encoding of categoricals against the fit-time vocabulary
//! - Standard scaling of numeric columns
//! - Feature / target splitting

mod config;
mod imputer;
mod scaler;
mod encoder;
mod pipeline;

pub use config::PreprocessingConfig;
pub use imputer::{Imputer, ImputeStrategy};
pub use scaler::{Scaler, ScalerParams, ScalerType};
pub use encoder::Encoder;
pub use pipeline::{encode_target, DataPreprocessor};

/// Placeholder written into categorical cells that were missing
pub const MISSING_TOKEN: &str = "__missing__";

/// Code for categorical values never seen at fit time
pub const UNKNOWN_CODE: usize = 0;

/// Code for missing categorical values
pub const MISSING_CODE: usize = 1;
