//! Churn pipeline CLI
//!
//! Command-line interface for generating data, training, scoring and
//! inspecting tracked runs.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{self, schema, SyntheticConfig, Table};
use crate::evaluation::Metric;
use crate::export::{ModelArtifact, MODEL_ARTIFACT};
use crate::pipeline::{PipelineConfig, TrainingPipeline};
use crate::tracking::{ExperimentTracker, RunStatus};
use crate::training::ModelType;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn status_label(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Finished => ok("finished"),
        RunStatus::Running => accent("running"),
        RunStatus::Failed => "failed".red(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "churn-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Customer churn training pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a synthetic customer table
    Generate {
        /// Output CSV file
        #[arg(short, long, default_value = "data/customers.csv")]
        output: PathBuf,

        /// Number of customers
        #[arg(short = 'n', long, default_value = "1000")]
        rows: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train candidate models and track the run
    Train {
        /// Input data file (CSV or TSV); defaults to CHURN_DATA_PATH
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Comma-separated candidates (logistic_regression, decision_tree, random_forest, gradient_boosting)
        #[arg(short, long)]
        models: Option<String>,

        /// Selection metric (accuracy, precision, recall, f1)
        #[arg(long)]
        metric: Option<String>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Tracking store directory; defaults to CHURN_TRACKING_DIR
        #[arg(long)]
        tracking_dir: Option<PathBuf>,

        /// Experiment name; defaults to CHURN_EXPERIMENT
        #[arg(short, long)]
        experiment: Option<String>,

        /// Also write the selected model artifact here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score a table with a trained model
    Predict {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Model artifact file
        #[arg(short, long, conflicts_with = "run_id", required_unless_present = "run_id")]
        model: Option<PathBuf>,

        /// Load the model logged to this run instead of a file
        #[arg(long)]
        run_id: Option<String>,

        /// Tracking store directory used with --run-id
        #[arg(long)]
        tracking_dir: Option<PathBuf>,

        /// Experiment name used with --run-id
        #[arg(short, long)]
        experiment: Option<String>,

        /// Output predictions file (CSV); printed when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// List tracked runs
    Runs {
        /// Tracking store directory
        #[arg(long)]
        tracking_dir: Option<PathBuf>,

        /// Experiment name
        #[arg(short, long)]
        experiment: Option<String>,
    },
}

/// Tracker for the given directory / experiment, falling back to the
/// environment defaults
fn open_tracker(tracking_dir: Option<&Path>, experiment: Option<&str>) -> anyhow::Result<ExperimentTracker> {
    let defaults = PipelineConfig::default();
    let dir = tracking_dir.map(Path::to_path_buf).unwrap_or(defaults.tracking_dir);
    let name = experiment.unwrap_or(defaults.experiment_name.as_str());
    ExperimentTracker::local(&dir, name)
        .with_context(|| format!("cannot open tracking store {}", dir.display()))
}

fn parse_models(list: &str) -> anyhow::Result<Vec<ModelType>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ModelType>().map_err(anyhow::Error::from))
        .collect()
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_generate(output: &Path, rows: usize, seed: u64) -> anyhow::Result<()> {
    section("Generate");

    step_run(&format!("Generating {} customers", rows));
    let start = Instant::now();
    let table = data::generate_customer_data(&SyntheticConfig::new(rows).with_seed(seed))?;
    step_done(&format!("{:?}", start.elapsed()));

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    step_run(&format!("Saving → {}", output.display()));
    data::save_csv(&table, output)?;
    step_done(&format!("{} rows × {} cols", table.height(), table.width()));

    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    data_path: Option<&Path>,
    config_path: Option<&Path>,
    models: Option<&str>,
    metric: Option<&str>,
    seed: Option<u64>,
    tracking_dir: Option<&Path>,
    experiment: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = match config_path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(path) = data_path {
        config.data_path = path.to_path_buf();
    }
    if let Some(list) = models {
        config.training.models = parse_models(list)?;
    }
    if let Some(name) = metric {
        config.training.selection_metric = name.parse::<Metric>()?;
    }
    if let Some(seed) = seed {
        config.training.random_state = Some(seed);
    }
    if let Some(dir) = tracking_dir {
        config.tracking_dir = dir.to_path_buf();
    }
    if let Some(name) = experiment {
        config.experiment_name = name.to_string();
    }
    if let Some(path) = output {
        config.model_output = Some(path.to_path_buf());
    }

    step_run(&format!("Training on {}", config.data_path.display()));
    let start = Instant::now();
    let outcome = TrainingPipeline::new(config).run()?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<22} {:>9} {:>9} {:>9} {:>9}",
        muted("Model"),
        muted("Accuracy"),
        muted("Precision"),
        muted("Recall"),
        muted("F1")
    );
    println!("  {}", dim(&"─".repeat(62)));
    for candidate in &outcome.candidates {
        let score = |name: &str| candidate.metrics.get(name).copied().unwrap_or_default();
        println!(
            "  {} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            candidate_label(candidate.model_type, candidate.model_type == outcome.selected),
            score("accuracy"),
            score("precision"),
            score("recall"),
            score("f1")
        );
    }

    println!();
    println!("  {:<16} {}", muted("Selected"), outcome.selected.to_string().white().bold());
    println!("  {:<16} {}", muted("Run"), outcome.run_id.white());
    println!("  {:<16} {} / {}", muted("Train / held-out"), outcome.n_train, outcome.n_validation);
    println!();
    Ok(())
}

/// Model name padded to its column, then the selection mark. The mark is
/// appended after padding since its escape codes have no display width.
fn candidate_label(model_type: ModelType, selected: bool) -> String {
    let mark = if selected { ok("✓").to_string() } else { " ".to_string() };
    format!("{:<20} {}", model_type.name(), mark)
}

pub fn cmd_predict(
    data_path: &Path,
    model_path: Option<&Path>,
    run_id: Option<&str>,
    tracking_dir: Option<&Path>,
    experiment: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let artifact = match (model_path, run_id) {
        (Some(path), _) => ModelArtifact::load(path)
            .with_context(|| format!("cannot load model {}", path.display()))?,
        (None, Some(id)) => {
            let tracker = open_tracker(tracking_dir, experiment)?;
            ModelArtifact::from_run(&tracker, id)
                .with_context(|| format!("cannot load {} from run {}", MODEL_ARTIFACT, id))?
        }
        (None, None) => anyhow::bail!("either --model or --run-id is required"),
    };
    step_done(artifact.model_type.name());

    step_run("Loading data");
    let table = data::load(data_path)?;
    step_done(&format!("{} rows", table.height()));

    step_run("Scoring");
    let labels = artifact.predict(&table)?;
    let proba = artifact.predict_proba(&table)?;
    step_done(&format!("{} predictions", labels.len()));

    let mut df = predictions_frame(&table, labels.to_vec(), proba.to_vec())?;
    match output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
            println!("  {} wrote {}", ok("✓"), path.display());
        }
        None => println!("{}", df),
    }

    let churners = labels.iter().filter(|&&v| v == 1.0).count();
    println!();
    println!("  {:<16} {} of {}", muted("Predicted churn"), churners, labels.len());
    println!();
    Ok(())
}

/// `customer_id` (or row number), predicted label and probability
fn predictions_frame(table: &Table, labels: Vec<f64>, proba: Vec<f64>) -> anyhow::Result<DataFrame> {
    let ids: Column = if table.has_column(schema::ID_COLUMN) {
        table.frame().column(schema::ID_COLUMN)?.clone()
    } else {
        Column::new("row".into(), (0..table.height() as u64).collect::<Vec<_>>())
    };
    let labels: Vec<i32> = labels.into_iter().map(|v| v as i32).collect();
    let df = DataFrame::new(vec![
        ids,
        Column::new("churn_prediction".into(), labels),
        Column::new("churn_probability".into(), proba),
    ])?;
    Ok(df)
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let table = data::load(data_path)?;
    let df = table.frame();

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), table.height());
    println!("  {:<12} {}", muted("Columns"), table.width());
    println!("  {:<12} {:.2}%", muted("Missing"), table.missing_ratio() * 100.0);
    if table.has_column(schema::TARGET_COLUMN) {
        let churn = crate::preprocessing::encode_target(df, schema::TARGET_COLUMN)?;
        println!("  {:<12} {:.2}%", muted("Churn rate"), churn.mean().unwrap_or(0.0) * 100.0);
    }
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

pub fn cmd_runs(tracking_dir: Option<&Path>, experiment: Option<&str>) -> anyhow::Result<()> {
    section("Runs");

    let tracker = open_tracker(tracking_dir, experiment)?;
    let runs = tracker.list_runs()?;
    if runs.is_empty() {
        println!("  {}", dim("no runs recorded"));
        println!();
        return Ok(());
    }

    println!(
        "  {:<38} {:<22} {:<10} {:>8} {:>8}",
        muted("Run"),
        muted("Name"),
        muted("Status"),
        muted("F1"),
        muted("Secs")
    );
    println!("  {}", dim(&"─".repeat(90)));
    for run in runs.iter().filter(|r| r.parent_run_id.is_none()) {
        print_run(run, "");
        for child in runs.iter().filter(|r| r.parent_run_id.as_deref() == Some(run.run_id.as_str())) {
            print_run(child, "  ");
        }
    }

    println!();
    Ok(())
}

fn print_run(run: &crate::tracking::Run, indent: &str) {
    let f1 = run
        .metrics
        .get(Metric::F1.as_str())
        .map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
    println!(
        "  {:<38} {:<22} {:<10} {:>8} {:>8.1}",
        format!("{}{}", indent, run.run_id),
        format!("{}{}", indent, run.run_name),
        status_label(run.status),
        f1,
        run.duration_secs()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_models() {
        let models = parse_models("lr, random_forest,,gbm").unwrap();
        assert_eq!(
            models,
            vec![ModelType::LogisticRegression, ModelType::RandomForest, ModelType::GradientBoosting]
        );
        assert!(parse_models("lr,svm").is_err());
    }

    #[test]
    fn test_cli_parses_predict_by_run() {
        let cli = Cli::try_parse_from(["churn-pipeline", "predict", "-d", "x.csv", "--run-id", "abc"]).unwrap();
        match cli.command {
            Commands::Predict { run_id, model, .. } => {
                assert_eq!(run_id.as_deref(), Some("abc"));
                assert!(model.is_none());
            }
            _ => panic!("expected predict"),
        }
        assert!(Cli::try_parse_from(["churn-pipeline", "predict", "-d", "x.csv"]).is_err());
    }

    #[test]
    fn test_candidate_label_pads_before_mark() {
        colored::control::set_override(true);
        let selected = candidate_label(ModelType::RandomForest, true);
        let other = candidate_label(ModelType::LogisticRegression, false);
        colored::control::unset_override();

        assert!(selected.starts_with(&format!("{:<20} ", "random_forest")));
        assert!(selected.contains('✓'));
        assert_eq!(other, format!("{:<20}  ", "logistic_regression"));
    }

    #[test]
    fn test_predictions_frame_uses_ids() {
        let table = data::generate_customer_data(&SyntheticConfig::new(3).with_seed(1)).unwrap();
        let df = predictions_frame(&table, vec![0.0, 1.0, 0.0], vec![0.1, 0.9, 0.2]).unwrap();
        assert_eq!(df.get_column_names()[0].as_str(), schema::ID_COLUMN);
        assert_eq!(df.height(), 3);
    }
}
