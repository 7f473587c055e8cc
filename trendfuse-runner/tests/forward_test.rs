//! End-to-end forward test on a fixed BTC/USD tape served from memory.
//!
//! The tape is a steady 5m uptrend (+0.5 per bar from 1000) with a volume
//! spike every 10th bar; 15m candles are resampled from it. The first
//! evaluable candle (index 249) buys, the target is touched at index 292
//! and the position is re-opened on the same candle.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use trendfuse_core::domain::{resample, Candle, ExitReason, Side, Timeframe};
use trendfuse_runner::forward::{run_status, trades_csv, JsonStore, MemoryStore, RunStore, Stepper};
use trendfuse_runner::{AppConfig, MemorySource};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn bar_time(i: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(5 * i)
}

fn tape(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 1000.0 + i as f64 * 0.5;
            let open = if i == 0 { close } else { close - 0.5 };
            Candle {
                t: bar_time(i as i64).timestamp_millis(),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: if i % 10 == 0 { 5000.0 } else { 1000.0 },
            }
        })
        .collect()
}

fn source(n: usize) -> MemorySource {
    let fast = tape(n);
    let slow = resample(&fast, Timeframe::M15);
    MemorySource::new()
        .with_series("BTC/USD", Timeframe::M5, fast)
        .with_series("BTC/USD", Timeframe::M15, slow)
}

fn stepper(store: Arc<dyn RunStore>) -> Stepper {
    Stepper::new(Arc::new(source(300)), store, AppConfig::default())
}

#[test]
fn uptrend_session_buys_takes_profit_and_reenters() {
    let stepper = stepper(Arc::new(MemoryStore::new()));
    let run = stepper.start_run("BTC/USD", t0()).unwrap();

    let out = stepper.step(run.id, bar_time(300)).unwrap();
    assert_eq!(out.candles, 300);
    assert_eq!(out.opened, 2);
    assert_eq!(out.closed, 1);

    let trades = stepper.store().trades_for_run(run.id).unwrap();
    assert_eq!(trades.len(), 2);

    let first = &trades[0];
    assert_eq!(first.direction, Side::Long);
    assert_eq!(first.candle_time, bar_time(249));
    assert_eq!(first.entry_price, 1124.5);
    assert!((first.stop_loss - 1124.5 * 0.99).abs() < 1e-9);
    assert_eq!(first.exit_reason, Some(ExitReason::TakeProfit));
    assert_eq!(first.exit_price, Some(first.take_profit));
    assert_eq!(first.exit_time, Some(bar_time(293)));
    assert!((first.r_multiple.unwrap() - 2.0).abs() < 1e-9);
    assert!((first.profit_loss.unwrap() - 2.0).abs() < 1e-9);

    let second = &trades[1];
    assert!(second.is_open());
    assert_eq!(second.candle_time, bar_time(292));
    assert_eq!(second.entry_price, 1146.0);

    let run = stepper.store().get_run(run.id).unwrap();
    assert_eq!(run.last_candle_ts, Some(bar_time(299).timestamp_millis()));
    assert!(run.is_active);
}

#[test]
fn repeated_steps_are_idempotent() {
    let stepper = stepper(Arc::new(MemoryStore::new()));
    let run = stepper.start_run("BTC/USD", t0()).unwrap();

    stepper.step(run.id, bar_time(300)).unwrap();
    let before = stepper.store().trades_for_run(run.id).unwrap();

    let again = stepper.step(run.id, bar_time(300)).unwrap();
    assert_eq!(again.candles, 0);
    let later = stepper.step(run.id, bar_time(301)).unwrap();
    assert_eq!(later.candles, 0);
    assert_eq!(stepper.store().trades_for_run(run.id).unwrap(), before);
}

#[test]
fn session_end_closes_open_trade_and_summarizes() {
    let stepper = stepper(Arc::new(MemoryStore::new()));
    let run = stepper.start_run("BTC/USD", t0()).unwrap();
    stepper.step(run.id, bar_time(300)).unwrap();

    let out = stepper.step(run.id, t0() + Duration::days(5)).unwrap();
    assert_eq!(out.candles, 0);
    assert!(out.finalized);

    let run = stepper.store().get_run(run.id).unwrap();
    assert!(!run.is_active);
    let summary = run.summary.clone().unwrap();
    assert_eq!(summary.trades, 2);
    assert_eq!(summary.wins, 2);
    assert_eq!(summary.win_rate, 100.0);
    assert_eq!(summary.profit_factor, None);

    let trades = stepper.store().trades_for_run(run.id).unwrap();
    let last = &trades[1];
    assert_eq!(last.exit_reason, Some(ExitReason::SessionEnd));
    assert_eq!(last.exit_price, Some(1149.5));

    let status = run_status(stepper.store().as_ref(), run.id).unwrap();
    assert!(status.open_trades.is_empty());
    assert_eq!(status.recent_trades[0].id, last.id);

    let csv = trades_csv(&trades).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().nth(2).unwrap().contains("session_end"));
}

#[test]
fn json_store_resumes_where_it_left_off() {
    let dir = tempfile::tempdir().unwrap();

    let reference = stepper(Arc::new(MemoryStore::new()));
    let ref_run = reference.start_run("BTC/USD", t0()).unwrap();
    reference.step(ref_run.id, bar_time(300)).unwrap();
    let expected = reference.store().trades_for_run(ref_run.id).unwrap();

    let run_id = {
        let s = stepper(Arc::new(JsonStore::open(dir.path()).unwrap()));
        let run = s.start_run("BTC/USD", t0()).unwrap();
        let out = s.step(run.id, bar_time(270)).unwrap();
        assert_eq!(out.candles, 270);
        run.id
    };

    let s = stepper(Arc::new(JsonStore::open(dir.path()).unwrap()));
    let out = s.step(run_id, bar_time(300)).unwrap();
    assert_eq!(out.candles, 30);

    let got = s.store().trades_for_run(run_id).unwrap();
    assert_eq!(got.len(), expected.len());
    for (a, b) in got.iter().zip(&expected) {
        assert_eq!(a.direction, b.direction);
        assert_eq!(a.entry_price, b.entry_price);
        assert_eq!(a.candle_time, b.candle_time);
        assert_eq!(a.exit_price, b.exit_price);
        assert_eq!(a.exit_reason, b.exit_reason);
    }
}
