// Prediction and training latency benchmarks
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fake_news_detector::ml::{
    DataSource, MLConfig, TextPreprocessor, TrainingPipeline,
};

const HEADLINE: &str = "Breaking: Aliens have landed in New York City and are demanding pizza";

fn preprocess_throughput(c: &mut Criterion) {
    c.bench_function("preprocess_headline", |b| {
        b.iter(|| TextPreprocessor::preprocess(black_box(HEADLINE)))
    });
}

fn classify_latency(c: &mut Criterion) {
    let (model, _) = TrainingPipeline::new(MLConfig::default())
        .run(&DataSource::BuiltinSample)
        .unwrap();

    let mut group = c.benchmark_group("classify");
    for repeats in [1usize, 10, 100].iter() {
        let text = HEADLINE.repeat(*repeats);
        group.bench_with_input(BenchmarkId::from_parameter(repeats), &text, |b, text| {
            b.iter(|| model.classify(black_box(text)).unwrap())
        });
    }
    group.finish();
}

fn train_builtin_sample(c: &mut Criterion) {
    let pipeline = TrainingPipeline::new(MLConfig::default());

    c.bench_function("train_builtin_sample", |b| {
        b.iter(|| pipeline.run(black_box(&DataSource::BuiltinSample)).unwrap())
    });
}

criterion_group!(
    benches,
    preprocess_throughput,
    classify_latency,
    train_builtin_sample
);
criterion_main!(benches);
