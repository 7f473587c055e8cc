//! Criterion benchmarks for TrendFuse hot paths.
//!
//! Benchmarks:
//! 1. Indicator frame computation (5m series)
//! 2. Local snapshot + fusion scoring at one bar
//! 3. Full backtest loop

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trendfuse_core::domain::{resample, Candle, Timeframe};
use trendfuse_core::engine::{simulate, EngineConfig};
use trendfuse_core::indicators::{IndicatorFrame, IndicatorSettings};
use trendfuse_core::snapshot::fusion_at;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 30_000.0 + (i as f64 * 0.05).sin() * 400.0 + i as f64 * 0.8;
            Candle {
                t: i as i64 * 300_000,
                open: close - 3.0,
                high: close + 12.0,
                low: close - 15.0,
                close,
                volume: if i % 13 == 0 { 9.0 } else { 2.0 + (i % 5) as f64 * 0.3 },
            }
        })
        .collect()
}

fn frames(n: usize) -> (IndicatorFrame, IndicatorFrame) {
    let c5 = make_candles(n);
    let settings = IndicatorSettings::default();
    (
        IndicatorFrame::compute(&c5, Timeframe::M5, &settings),
        IndicatorFrame::compute(&resample(&c5, Timeframe::M15), Timeframe::M15, &settings),
    )
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_frame");
    for n in [500usize, 1500, 5000] {
        let candles = make_candles(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &candles, |b, candles| {
            b.iter(|| IndicatorFrame::compute(black_box(candles), Timeframe::M5, &IndicatorSettings::default()))
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let (f5, f15) = frames(1500);
    let config = EngineConfig::default();
    c.bench_function("fusion_snapshot", |b| {
        b.iter(|| fusion_at(&f5, &f15, black_box(1200), &config.volume, &config.fusion))
    });
}

fn bench_backtest(c: &mut Criterion) {
    let (f5, f15) = frames(1500);
    let config = EngineConfig::default();
    c.bench_function("backtest_1500", |b| b.iter(|| simulate(black_box(&f5), &f15, &config)));
}

criterion_group!(benches, bench_frame, bench_snapshot, bench_backtest);
criterion_main!(benches);
