//! Column schema of a customer record

/// Customer identifier; never used as a feature
pub const ID_COLUMN: &str = "customer_id";

/// Binary churn label; present in training data only
pub const TARGET_COLUMN: &str = "churn";

/// Numeric feature columns, in feature-matrix order
pub const NUMERIC_COLUMNS: [&str; 3] = ["tenure", "monthly_charges", "total_charges"];

/// Categorical feature columns, in feature-matrix order
pub const CATEGORICAL_COLUMNS: [&str; 10] = [
    "contract_type",
    "payment_method",
    "paperless_billing",
    "internet_service",
    "online_security",
    "online_backup",
    "device_protection",
    "tech_support",
    "streaming_tv",
    "streaming_movies",
];

/// Add-on services that read "No internet service" when the customer has none
pub const SERVICE_COLUMNS: [&str; 6] = [
    "online_security",
    "online_backup",
    "device_protection",
    "tech_support",
    "streaming_tv",
    "streaming_movies",
];

/// Value used by the service columns for customers without internet
pub const NO_INTERNET_SERVICE: &str = "No internet service";

/// All feature columns: numeric first, then categorical.
pub fn feature_columns() -> Vec<&'static str> {
    NUMERIC_COLUMNS
        .iter()
        .chain(CATEGORICAL_COLUMNS.iter())
        .copied()
        .collect()
}

/// Columns of a full training record, in file order.
pub fn record_columns() -> Vec<&'static str> {
    let mut cols = vec![ID_COLUMN];
    cols.extend(feature_columns());
    cols.push(TARGET_COLUMN);
    cols
}
