//! End-to-end tests: train from a file, track the run, and serve the artifact
//! by run id

use churn_pipeline::data::{self, generate_customer_data, SyntheticConfig};
use churn_pipeline::error::ErrorKind;
use churn_pipeline::export::{FeatureImportance, ModelArtifact, IMPORTANCE_ARTIFACT, MODEL_ARTIFACT};
use churn_pipeline::pipeline::{PipelineConfig, TrainingPipeline};
use churn_pipeline::tracking::{ExperimentTracker, RunStatus};
use churn_pipeline::training::{ModelType, TrainingConfig};

fn pipeline_config(dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig::new()
        .with_data_path(dir.join("customers.csv"))
        .with_tracking_dir(dir.join("mlruns"))
        .with_experiment("churn_e2e")
        .with_training(
            TrainingConfig::new()
                .with_models(vec![
                    ModelType::LogisticRegression,
                    ModelType::RandomForest,
                    ModelType::GradientBoosting,
                ])
                .with_n_estimators(20)
                .with_random_state(42),
        )
}

#[test]
fn test_train_track_and_serve() {
    let dir = tempfile::tempdir().unwrap();
    let table = generate_customer_data(&SyntheticConfig::new(400).with_seed(42)).unwrap();
    data::save_csv(&table, dir.path().join("customers.csv")).unwrap();

    let outcome = TrainingPipeline::new(pipeline_config(dir.path())).run().unwrap();
    assert_eq!(outcome.candidates.len(), 3);
    assert!(outcome.metrics.values().all(|v| (0.0..=1.0).contains(v)));

    // a fresh tracker on the same store plays the serving side
    let tracker = ExperimentTracker::local(dir.path().join("mlruns"), "churn_e2e").unwrap();
    let run = tracker.get_run(&outcome.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.params["selected_model"], outcome.selected.name());
    assert_eq!(run.metrics, outcome.metrics);
    assert!(run.artifacts.contains(&MODEL_ARTIFACT.to_string()));

    let children = tracker.child_runs(&outcome.run_id).unwrap();
    assert_eq!(children.len(), 3);
    for (child, summary) in children.iter().zip(outcome.candidates.iter()) {
        assert_eq!(child.run_id, summary.run_id);
        assert_eq!(child.params["model_type"], summary.model_type.name());
        assert!(child.metrics.contains_key("f1"));
    }

    let artifact = ModelArtifact::from_run(&tracker, &outcome.run_id).unwrap();
    assert_eq!(artifact.model_type, outcome.selected);

    let serving = data::load(dir.path().join("customers.csv")).unwrap().without_target();
    let labels = artifact.predict(&serving).unwrap();
    assert_eq!(labels.len(), 400);
    assert!(labels.iter().all(|&v| v == 0.0 || v == 1.0));
    assert_eq!(labels, outcome.artifact.predict(&serving).unwrap());

    let importances: Vec<FeatureImportance> =
        serde_json::from_slice(&tracker.load_artifact(&outcome.run_id, IMPORTANCE_ARTIFACT).unwrap()).unwrap();
    assert_eq!(importances.len(), 13);
    assert!(importances.windows(2).all(|w| w[0].importance >= w[1].importance));
}

#[test]
fn test_repeated_runs_select_same_model() {
    let dir = tempfile::tempdir().unwrap();
    let table = generate_customer_data(&SyntheticConfig::new(250).with_seed(7)).unwrap();
    data::save_csv(&table, dir.path().join("customers.csv")).unwrap();

    let pipeline = TrainingPipeline::new(pipeline_config(dir.path()));
    let first = pipeline.run().unwrap();
    let second = pipeline.run().unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.selected, second.selected);
    assert_eq!(first.metrics, second.metrics);

    let tracker = ExperimentTracker::local(dir.path().join("mlruns"), "churn_e2e").unwrap();
    let parents = tracker
        .list_runs()
        .unwrap()
        .into_iter()
        .filter(|r| r.parent_run_id.is_none())
        .count();
    assert_eq!(parents, 2);
}

#[test]
fn test_model_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let table = generate_customer_data(&SyntheticConfig::new(150).with_seed(3)).unwrap();
    data::save_csv(&table, dir.path().join("customers.csv")).unwrap();

    let output = dir.path().join("models").join("best.json");
    let config = pipeline_config(dir.path()).with_model_output(&output);
    let outcome = TrainingPipeline::new(config).run().unwrap();

    let artifact = ModelArtifact::load(&output).unwrap();
    assert_eq!(artifact.model_type, outcome.selected);
    assert_eq!(artifact.metrics, outcome.metrics);
}

#[test]
fn test_schema_failure_marks_run_failed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("customers.csv"), "customer_id,tenure\nC1,4\n").unwrap();

    let err = TrainingPipeline::new(pipeline_config(dir.path())).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    let tracker = ExperimentTracker::local(dir.path().join("mlruns"), "churn_e2e").unwrap();
    let runs = tracker.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].artifacts.is_empty());
}
