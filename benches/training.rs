use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use churn_pipeline::data::{generate_customer_data, SyntheticConfig, Table};
use churn_pipeline::export::ModelArtifact;
use churn_pipeline::preprocessing::DataPreprocessor;
use churn_pipeline::training::{ModelType, TrainEngine, TrainedModel, TrainingConfig};

fn customers(n_rows: usize) -> Table {
    generate_customer_data(&SyntheticConfig::new(n_rows).with_seed(n_rows as u64)).unwrap()
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");

    for n_rows in [1000, 10000].iter() {
        let table = customers(*n_rows);

        group.bench_with_input(BenchmarkId::new("fit_transform", n_rows), &table, |b, table| {
            b.iter(|| DataPreprocessor::new().fit_transform(black_box(table)).unwrap())
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let (x, y) = DataPreprocessor::new().fit_transform(&customers(2000)).unwrap();
    for model_type in ModelType::ALL {
        let config = TrainingConfig::new().with_n_estimators(50);

        group.bench_function(BenchmarkId::new("fit", model_type.name()), |b| {
            b.iter(|| {
                let mut model = TrainedModel::new(model_type, &config);
                model.fit(black_box(&x), black_box(&y)).unwrap();
                model
            })
        });
    }

    group.bench_function("train_and_select", |b| {
        let engine = TrainEngine::new(TrainingConfig::new().with_n_estimators(50));
        b.iter(|| engine.train_and_select(black_box(&x), black_box(&y)).unwrap())
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let train = customers(3000);
    let mut preprocessor = DataPreprocessor::new();
    let (x, y) = preprocessor.fit_transform(&train).unwrap();
    let mut model = TrainedModel::new(ModelType::RandomForest, &TrainingConfig::new().with_n_estimators(50));
    model.fit(&x, &y).unwrap();
    let artifact = ModelArtifact::new(preprocessor, model, Default::default()).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let table = customers(*n_rows).without_target();

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &table, |b, table| {
            b.iter(|| artifact.predict(black_box(table)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_preprocessing, bench_training, bench_prediction);
criterion_main!(benches);
