//! Criterion benchmarks for ForecastLab hot paths.
//!
//! Benchmarks:
//! 1. Ensemble combination (estimate maps of growing size)
//! 2. Realized-volatility computation over growing histories
//! 3. Predictor set fit + predict (the walk-forward inner step)

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use forecastlab_core::domain::{FeatureBar, ModelEstimate, ModelFamily};
use forecastlab_core::ensemble::{Combiner, EnsembleConfig};
use forecastlab_core::predictor::PredictorSet;
use forecastlab_core::volatility::realized_volatility;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<FeatureBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            FeatureBar::from_ohlcv(
                base_date + chrono::Duration::days(i as i64),
                close - 0.3,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000 + (i as u64 % 500_000),
            )
        })
        .collect()
}

fn make_estimates(count: usize) -> BTreeMap<String, ModelEstimate> {
    let families = [
        ModelFamily::Stable,
        ModelFamily::Neutral,
        ModelFamily::TrendSensitive,
    ];
    (0..count)
        .map(|i| {
            let name = format!("model_{i}");
            let estimate =
                ModelEstimate::new(name.clone(), families[i % 3], 100.0 + i as f64 * 0.2);
            (name, estimate)
        })
        .collect()
}

fn uniform_weights(estimates: &BTreeMap<String, ModelEstimate>) -> BTreeMap<String, f64> {
    estimates.keys().map(|k| (k.clone(), 1.0)).collect()
}

// ── 1. Ensemble Combination ──────────────────────────────────────────

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble_combine");

    let combiner = Combiner::new(EnsembleConfig::default());
    let target = chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

    for &model_count in &[1usize, 3, 8] {
        let estimates = make_estimates(model_count);
        let weights = uniform_weights(&estimates);

        group.bench_with_input(
            BenchmarkId::new("high_vol_tilt", model_count),
            &model_count,
            |b, _| {
                b.iter(|| {
                    let _ = combiner.combine(
                        black_box(target),
                        black_box(&estimates),
                        black_box(Some(0.05)),
                        black_box(&weights),
                    );
                });
            },
        );
    }

    group.finish();
}

// ── 2. Realized Volatility ───────────────────────────────────────────

fn bench_realized_volatility(c: &mut Criterion) {
    let mut group = c.benchmark_group("realized_volatility");

    for &len in &[60usize, 252, 2520] {
        let closes: Vec<f64> = make_bars(len).iter().map(|b| b.close).collect();

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let _ = realized_volatility(black_box(&closes), black_box(20));
            });
        });
    }

    group.finish();
}

// ── 3. Predictor Fit + Predict ───────────────────────────────────────

fn bench_predictor_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("predictor_estimates");

    for &len in &[60usize, 120, 252] {
        let bars = make_bars(len);

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let mut set = PredictorSet::standard();
                let _ = set.estimates(black_box(&bars));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_combine,
    bench_realized_volatility,
    bench_predictor_set
);
criterion_main!(benches);
