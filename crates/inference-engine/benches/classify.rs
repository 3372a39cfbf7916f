//! Classification throughput over the bundled sample forest

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_validator::FeatureVector;
use inference_engine::{InferenceEngine, ModelLoader};

const ARTIFACT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../models/water_potability.json");

fn bench_classify(c: &mut Criterion) {
    let ensemble = ModelLoader::new().load(ARTIFACT).expect("sample artifact should load");
    let engine = InferenceEngine::new();
    let sample = FeatureVector::new([
        7.08, 204.89, 20791.32, 7.3, 368.52, 564.31, 10.38, 86.99, 2.96,
    ])
    .expect("finite sample");

    c.bench_function("classify_sample_forest", |b| {
        b.iter(|| engine.classify(black_box(&ensemble), black_box(&sample)))
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
