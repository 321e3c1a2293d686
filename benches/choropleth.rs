use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use parcelscope::charts::ChartSet;
use parcelscope::choropleth;
use parcelscope::service::DiagnosticsBlock;

const FEATURE_COUNT: usize = 10_000;
const RESIDUAL_COUNT: usize = 5_000;

fn prediction_values() -> Vec<f64> {
    (0..FEATURE_COUNT)
        .map(|i| {
            if i % 97 == 0 {
                f64::NAN
            } else {
                (i as f64 * 7.3) % 5_000.0
            }
        })
        .collect()
}

fn synthetic_diagnostics() -> DiagnosticsBlock {
    let predicted: Vec<f64> = (0..RESIDUAL_COUNT).map(|i| 100.0 + i as f64 * 0.5).collect();
    let residuals: Vec<f64> = (0..RESIDUAL_COUNT)
        .map(|i| ((i as f64 * 13.7) % 40.0) - 20.0)
        .collect();
    let actual: Vec<f64> = predicted
        .iter()
        .zip(&residuals)
        .map(|(p, r)| p + r)
        .collect();
    DiagnosticsBlock {
        residuals,
        residual_bins: (-20..=20).step_by(2).map(f64::from).collect(),
        residual_counts: (0..21).map(|i| (i * 37 % 250) as f64).collect(),
        actual_values: actual,
        predicted_values: predicted,
    }
}

fn bench_color_scale(c: &mut Criterion) {
    let values = prediction_values();
    c.bench_with_input(
        BenchmarkId::new("color_scale", FEATURE_COUNT),
        &values,
        |b, values| {
            b.iter(|| {
                for &value in values {
                    black_box(choropleth::color(black_box(value), 0.0, 5_000.0));
                }
            });
        },
    );
}

fn bench_legend_buckets(c: &mut Criterion) {
    c.bench_function("legend_buckets", |b| {
        b.iter(|| black_box(choropleth::buckets(black_box(-1_250.0), black_box(24_800.0))));
    });
}

fn bench_chart_projection(c: &mut Criterion) {
    let diagnostics = synthetic_diagnostics();
    let coefficients: Vec<(String, f64)> = (0..24)
        .map(|i| (format!("field_{i}"), (i as f64 - 12.0) * 0.37))
        .collect();
    c.bench_with_input(
        BenchmarkId::new("chart_projection", RESIDUAL_COUNT),
        &diagnostics,
        |b, diagnostics| {
            b.iter(|| black_box(ChartSet::project(&coefficients, diagnostics)));
        },
    );
}

criterion_group!(
    benches,
    bench_color_scale,
    bench_legend_buckets,
    bench_chart_projection
);
criterion_main!(benches);
