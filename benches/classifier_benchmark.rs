use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spendcat::features::encode_transaction;
use spendcat::{mock_transactions, Predictor, TrainingConfig, TrainingPipeline, Transaction};

fn setup_benchmark_predictor(max_features: usize) -> Predictor {
    let mut config = TrainingConfig::small();
    config.encoder.max_features = max_features;
    TrainingPipeline::new(config)
        .unwrap()
        .fit(&mock_transactions())
        .unwrap()
        .into_predictor()
}

fn bench_encoding(c: &mut Criterion) {
    let predictor = setup_benchmark_predictor(50);
    let encoder = predictor.artifacts().encoder();
    let mut group = c.benchmark_group("Encoding");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    group.bench_function("short_description", |b| {
        b.iter(|| encode_transaction(encoder, black_box("UBER TRIP"), black_box(22.5)))
    });

    group.bench_function("long_description", |b| {
        b.iter(|| {
            encode_transaction(
                encoder,
                black_box("POS PURCHASE AMAZON MKTPLACE PMTS AMZN.COM/BILL WA REF 4417 1234 5678 9012 CARD 0042"),
                black_box(59.99),
            )
        })
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Prediction");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    for max_features in [20, 50, 100] {
        let predictor = setup_benchmark_predictor(max_features);
        group.bench_with_input(BenchmarkId::new("single", max_features), &predictor, |b, predictor| {
            b.iter(|| predictor.predict(black_box("AMAZON MKTPLACE PURCHASE"), black_box(59.99)).unwrap())
        });
    }

    let predictor = setup_benchmark_predictor(50);
    let batch: Vec<Transaction> = (0..100)
        .map(|i| Transaction::new(format!("WHOLE FOODS #{}", i), i as f64))
        .collect();
    group.bench_function("batch_100", |b| b.iter(|| predictor.predict_batch(black_box(&batch))));

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("Training");
    group.sample_size(10);

    group.bench_function("mock_dataset", |b| {
        b.iter(|| {
            TrainingPipeline::new(TrainingConfig::small())
                .unwrap()
                .fit(black_box(&mock_transactions()))
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encoding, bench_prediction, bench_training);
criterion_main!(benches);
