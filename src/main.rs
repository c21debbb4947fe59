//! Churn Pipeline - Main Entry Point

use clap::Parser;
use churn_pipeline::cli::{cmd_generate, cmd_info, cmd_predict, cmd_runs, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_pipeline=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { output, rows, seed } => {
            cmd_generate(&output, rows, seed)?;
        }
        Commands::Train { data, config, models, metric, seed, tracking_dir, experiment, output } => {
            cmd_train(
                data.as_deref(),
                config.as_deref(),
                models.as_deref(),
                metric.as_deref(),
                seed,
                tracking_dir.as_deref(),
                experiment.as_deref(),
                output.as_deref(),
            )?;
        }
        Commands::Predict { data, model, run_id, tracking_dir, experiment, output } => {
            cmd_predict(
                &data,
                model.as_deref(),
                run_id.as_deref(),
                tracking_dir.as_deref(),
                experiment.as_deref(),
                output.as_deref(),
            )?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
        Commands::Runs { tracking_dir, experiment } => {
            cmd_runs(tracking_dir.as_deref(), experiment.as_deref())?;
        }
    }

    Ok(())
}
