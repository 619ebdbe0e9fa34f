//! Benchmarks for windowing, forward passes and rollouts.
//!
//! Run with: cargo bench --bench pipeline_bench

use burn::prelude::*;
use burn_ndarray::NdArray;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use occast::data::{make_windows, MinMaxScaler, WindowConfig};
use occast::models::NbForecasterConfig;
use occast::train::{rollout, RolloutConfig};

type BenchBackend = NdArray;

/// Seasonal series with noise, scaled to roughly [0, 1].
fn synthetic_series(n: usize) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..n)
        .map(|t| {
            let season = (t as f32 * std::f32::consts::TAU / 4.0).sin() * 0.3;
            0.5 + season + rng.gen::<f32>() * 0.1
        })
        .collect()
}

fn bench_windowing(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowing");

    for n in [180, 720, 2880].iter() {
        let series = synthetic_series(*n);
        let config = WindowConfig::new(12, 1).with_lags(vec![4, 8]);

        group.bench_with_input(BenchmarkId::new("make_windows", n), n, |b, _| {
            b.iter(|| black_box(make_windows(black_box(&series), &config).unwrap()))
        });
    }

    group.finish();
}

fn bench_forecaster_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forecaster_forward");
    let device = <BenchBackend as Backend>::Device::default();
    let model = NbForecasterConfig::new(1, 12, 1).init::<BenchBackend>(&device);

    for batch_size in [1, 8, 32].iter() {
        let data: Vec<f32> = synthetic_series(batch_size * 12);
        let x = Tensor::<BenchBackend, 1>::from_floats(data.as_slice(), &device).reshape([*batch_size, 12, 1]);

        group.bench_with_input(BenchmarkId::new("NbForecaster", batch_size), batch_size, |b, _| {
            b.iter(|| black_box(model.forward(black_box(x.clone()))))
        });
    }

    group.finish();
}

fn bench_rollout(c: &mut Criterion) {
    let mut group = c.benchmark_group("rollout");
    group.sample_size(10);

    let device = <BenchBackend as Backend>::Device::default();
    let model = NbForecasterConfig::new(1, 12, 1)
        .with_hidden_size(32)
        .with_n_layers(2)
        .init::<BenchBackend>(&device);
    let history = synthetic_series(48);
    let scaler = MinMaxScaler::fit(&[0.0, 1.0]).unwrap();

    for steps in [4, 20].iter() {
        group.bench_with_input(BenchmarkId::new("steps", steps), steps, |b, &steps| {
            b.iter(|| black_box(rollout(&model, &history, &[], &scaler, &RolloutConfig::new(steps)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_windowing, bench_forecaster_forward, bench_rollout);
criterion_main!(benches);
