//! Synthetic customer data generation
//!
//! Produces tables with the full record schema for demos, tests and
//! benchmarks. Churn is more likely for month-to-month contracts, high
//! monthly charges and customers without any add-on service. A configurable
//! number of `total_charges` and `payment_method` cells are left missing.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::schema;
use super::table::Table;

const CONTRACT_TYPES: [(&str, f64); 3] = [
    ("Month-to-month", 0.5),
    ("One year", 0.3),
    ("Two year", 0.2),
];

const PAYMENT_METHODS: [(&str, f64); 4] = [
    ("Electronic check", 0.3),
    ("Mailed check", 0.2),
    ("Bank transfer", 0.25),
    ("Credit card", 0.25),
];

const INTERNET_SERVICES: [(&str, f64); 3] = [("DSL", 0.3), ("Fiber optic", 0.4), ("No", 0.3)];

/// Configuration for the synthetic generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Number of customers to generate
    pub n_samples: usize,
    /// Random seed
    pub seed: u64,
    /// Number of `total_charges` cells to blank out (drawn with replacement)
    pub missing_total_charges: usize,
    /// Number of `payment_method` cells to blank out (drawn with replacement)
    pub missing_payment_method: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_samples: 1000,
            seed: 42,
            missing_total_charges: 50,
            missing_payment_method: 30,
        }
    }
}

impl SyntheticConfig {
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_missing(mut self, total_charges: usize, payment_method: usize) -> Self {
        self.missing_total_charges = total_charges;
        self.missing_payment_method = payment_method;
        self
    }
}

/// Generate a customer table
pub fn generate_customer_data(config: &SyntheticConfig) -> Result<Table> {
    let n = config.n_samples;
    if n == 0 {
        return Err(PipelineError::ConfigError("n_samples must be positive".to_string()));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let customer_ids: Vec<String> = (0..n).map(|i| format!("CUST{:06}", i)).collect();
    let tenure: Vec<i64> = (0..n).map(|_| rng.gen_range(1..=72)).collect();

    let monthly_charges: Vec<f64> = (0..n)
        .map(|_| (65.0 + 30.0 * standard_normal(&mut rng)).clamp(20.0, 120.0))
        .collect();

    let mut total_charges: Vec<Option<f64>> = monthly_charges
        .iter()
        .zip(tenure.iter())
        .map(|(&m, &t)| {
            let noise = 1.0 + 0.1 * standard_normal(&mut rng);
            Some((m * t as f64 * noise).max(0.0))
        })
        .collect();

    let contract_types: Vec<&str> = (0..n).map(|_| weighted_choice(&mut rng, &CONTRACT_TYPES)).collect();
    let mut payment_methods: Vec<Option<&str>> = (0..n)
        .map(|_| Some(weighted_choice(&mut rng, &PAYMENT_METHODS)))
        .collect();
    let paperless_billing: Vec<&str> = (0..n)
        .map(|_| weighted_choice(&mut rng, &[("Yes", 0.6), ("No", 0.4)]))
        .collect();
    let internet_services: Vec<&str> = (0..n)
        .map(|_| weighted_choice(&mut rng, &INTERNET_SERVICES))
        .collect();

    let services: Vec<Vec<&str>> = schema::SERVICE_COLUMNS
        .iter()
        .map(|_| {
            internet_services
                .iter()
                .map(|&internet| {
                    let draw = weighted_choice(&mut rng, &[("Yes", 0.4), ("No", 0.6)]);
                    if internet == "No" {
                        schema::NO_INTERNET_SERVICE
                    } else {
                        draw
                    }
                })
                .collect()
        })
        .collect();

    let churn: Vec<&str> = (0..n)
        .map(|i| {
            let no_services = services.iter().all(|col| col[i] != "Yes");
            let mut p = 0.0;
            if contract_types[i] == "Month-to-month" {
                p += 0.3;
            }
            if monthly_charges[i] > 70.0 {
                p += 0.2;
            }
            if no_services {
                p += 0.2;
            }
            if rng.gen_bool(p) { "Yes" } else { "No" }
        })
        .collect();

    for _ in 0..config.missing_total_charges {
        let idx = rng.gen_range(0..n);
        total_charges[idx] = None;
    }
    for _ in 0..config.missing_payment_method {
        let idx = rng.gen_range(0..n);
        payment_methods[idx] = None;
    }

    let mut columns = vec![
        Column::new(schema::ID_COLUMN.into(), customer_ids),
        Column::new("tenure".into(), tenure),
        Column::new("monthly_charges".into(), monthly_charges),
        Column::new("total_charges".into(), total_charges),
        Column::new("contract_type".into(), contract_types),
        Column::new("payment_method".into(), payment_methods),
        Column::new("paperless_billing".into(), paperless_billing),
        Column::new("internet_service".into(), internet_services),
    ];
    for (name, values) in schema::SERVICE_COLUMNS.iter().zip(services) {
        columns.push(Column::new((*name).into(), values));
    }
    columns.push(Column::new(schema::TARGET_COLUMN.into(), churn));

    let table = Table::new(DataFrame::new(columns)?)?;
    info!(
        rows = table.height(),
        seed = config.seed,
        missing = table.null_count(),
        "Generated synthetic customer data"
    );
    Ok(table)
}

/// Box-Muller draw from N(0, 1)
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn weighted_choice<R: Rng>(rng: &mut R, options: &[(&'static str, f64)]) -> &'static str {
    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for &(value, weight) in options {
        cumulative += weight;
        if roll < cumulative {
            return value;
        }
    }
    options[options.len() - 1].0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_schema() {
        let table = generate_customer_data(&SyntheticConfig::new(200)).unwrap();
        assert_eq!(table.height(), 200);
        for col in schema::record_columns() {
            assert!(table.has_column(col), "missing column {}", col);
        }
    }

    #[test]
    fn test_generate_is_deterministic() {
        let config = SyntheticConfig::new(100).with_seed(7);
        let a = generate_customer_data(&config).unwrap();
        let b = generate_customer_data(&config).unwrap();
        assert_eq!(a, b);

        let c = generate_customer_data(&config.clone().with_seed(8)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_value_ranges() {
        let table = generate_customer_data(&SyntheticConfig::new(500)).unwrap();
        let df = table.frame();

        let tenure = df.column("tenure").unwrap().i64().unwrap();
        assert!(tenure.into_iter().flatten().all(|t| (1..=72).contains(&t)));

        let monthly = df.column("monthly_charges").unwrap().f64().unwrap();
        assert!(monthly.into_iter().flatten().all(|m| (20.0..=120.0).contains(&m)));

        let total = df.column("total_charges").unwrap().f64().unwrap();
        assert!(total.into_iter().flatten().all(|t| t >= 0.0));
    }

    #[test]
    fn test_missing_values_injected() {
        let config = SyntheticConfig::new(300).with_missing(10, 5);
        let table = generate_customer_data(&config).unwrap();
        let df = table.frame();

        let total_nulls = df.column("total_charges").unwrap().null_count();
        let payment_nulls = df.column("payment_method").unwrap().null_count();
        assert!(total_nulls >= 1 && total_nulls <= 10);
        assert!(payment_nulls >= 1 && payment_nulls <= 5);
    }

    #[test]
    fn test_no_internet_means_no_services() {
        let table = generate_customer_data(&SyntheticConfig::new(300)).unwrap();
        let df = table.frame();
        let internet = df.column("internet_service").unwrap().str().unwrap();
        let security = df.column("online_security").unwrap().str().unwrap();

        for (i, s) in internet.into_iter().zip(security.into_iter()) {
            if i == Some("No") {
                assert_eq!(s, Some(schema::NO_INTERNET_SERVICE));
            }
        }
    }

    #[test]
    fn test_zero_samples_rejected() {
        let err = generate_customer_data(&SyntheticConfig::new(0)).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }
}
