//! Backtest and learner runs: fetch, build frames, simulate, report.
//!
//! Entry points:
//! - `backtest_data()`: pre-loaded candles in, report out. Pure.
//! - `run_backtest()`: fetches from a `CandleSource`, then runs. Used by the CLI.
//! - `run_backtests()`: several symbols in parallel with rayon.
//! - `run_learner()`: fetches and runs the weight-effectiveness pass.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use trendfuse_core::domain::{ClosedTrade, Timeframe};
use trendfuse_core::engine::simulate;
use trendfuse_core::indicators::IndicatorFrame;
use trendfuse_core::learner::{learn, LearnedWeights};

use crate::config::AppConfig;
use crate::data::{CandleSource, DataError, MarketData};
use crate::metrics::TradeStats;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("symbol '{0}' is not supported by the data source")]
    UnsupportedSymbol(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMeta {
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub count_5m: usize,
    pub count_15m: usize,
    pub warmup_bars: usize,
    pub total_trades: usize,
    /// blake3 of the candle tape the run replayed.
    pub dataset_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub stats: TradeStats,
    /// Most recent trades, capped by `backtest.max_report_trades`.
    pub trades: Vec<ClosedTrade>,
    pub meta: BacktestMeta,
}

/// Frames for the fast (5m) and slow (15m) series.
pub fn build_frames(data: &MarketData, cfg: &AppConfig) -> (IndicatorFrame, IndicatorFrame) {
    let settings = &cfg.engine.indicators;
    (
        IndicatorFrame::compute(&data.fast, Timeframe::M5, settings),
        IndicatorFrame::compute(&data.slow, Timeframe::M15, settings),
    )
}

/// Replay pre-loaded candles. Short history yields an empty report.
pub fn backtest_data(data: &MarketData, cfg: &AppConfig, generated_at: DateTime<Utc>) -> BacktestReport {
    let (fast, slow) = build_frames(data, cfg);
    let outcome = simulate(&fast, &slow, &cfg.engine);
    let stats = TradeStats::from_simulation(&outcome);

    let total_trades = outcome.trades.len();
    let keep = total_trades.saturating_sub(cfg.backtest.max_report_trades);
    let trades = outcome.trades[keep..].to_vec();

    BacktestReport {
        stats,
        trades,
        meta: BacktestMeta {
            symbol: data.symbol.clone(),
            generated_at,
            count_5m: data.fast.len(),
            count_15m: data.slow.len(),
            warmup_bars: cfg.engine.warmup_bars,
            total_trades,
            dataset_hash: data.dataset_hash(),
        },
    }
}

/// Load candles after checking the source lists the symbol.
pub(crate) fn load_supported(
    source: &dyn CandleSource,
    symbol: &str,
    limit_fast: usize,
    limit_slow: usize,
    now: DateTime<Utc>,
) -> Result<MarketData, RunError> {
    if !source.symbol_supported(symbol)? {
        return Err(RunError::UnsupportedSymbol(symbol.to_string()));
    }
    Ok(MarketData::load(source, symbol, limit_fast, limit_slow, now.timestamp_millis())?)
}

pub fn run_backtest(
    source: &dyn CandleSource,
    symbol: &str,
    cfg: &AppConfig,
    now: DateTime<Utc>,
) -> Result<BacktestReport, RunError> {
    let data = load_supported(source, symbol, cfg.backtest.limit_5m, cfg.backtest.limit_15m, now)?;
    tracing::info!(
        symbol,
        source = source.name(),
        count_5m = data.fast.len(),
        count_15m = data.slow.len(),
        "running backtest"
    );
    Ok(backtest_data(&data, cfg, now))
}

/// Backtest several symbols in parallel; results keep the input order.
pub fn run_backtests(
    source: &dyn CandleSource,
    symbols: &[String],
    cfg: &AppConfig,
    now: DateTime<Utc>,
) -> Vec<(String, Result<BacktestReport, RunError>)> {
    symbols
        .par_iter()
        .map(|s| (s.clone(), run_backtest(source, s, cfg, now)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningMeta {
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub count_5m: usize,
    pub count_15m: usize,
    pub dataset_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningReport {
    pub learned: LearnedWeights,
    pub meta: LearningMeta,
}

pub fn learn_data(data: &MarketData, cfg: &AppConfig) -> LearnedWeights {
    let (fast, slow) = build_frames(data, cfg);
    learn(&fast, &slow, &cfg.engine.volume, &cfg.engine.learner)
}

pub fn run_learner(
    source: &dyn CandleSource,
    symbol: &str,
    cfg: &AppConfig,
    now: DateTime<Utc>,
) -> Result<LearningReport, RunError> {
    let data = load_supported(
        source,
        symbol,
        cfg.backtest.learn_limit_5m,
        cfg.backtest.learn_limit_15m,
        now,
    )?;
    let learned = learn_data(&data, cfg);
    tracing::info!(symbol, samples = learned.samples, "learned feature weights");
    Ok(LearningReport {
        learned,
        meta: LearningMeta {
            symbol: data.symbol.clone(),
            generated_at: now,
            count_5m: data.fast.len(),
            count_15m: data.slow.len(),
            dataset_hash: data.dataset_hash(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticSource;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 2, 0).unwrap()
    }

    #[test]
    fn short_history_gives_empty_report() {
        let src = SyntheticSource::at(now().timestamp_millis());
        let mut cfg = AppConfig::default();
        cfg.backtest.limit_5m = 100;
        cfg.backtest.limit_15m = 40;
        let report = run_backtest(&src, "BTC/USD", &cfg, now()).unwrap();
        assert_eq!(report.stats.trades, 0);
        assert!(report.trades.is_empty());
        assert_eq!(report.meta.count_5m, 99);
        assert_eq!(report.meta.total_trades, 0);
        assert_eq!(report.stats.profit_factor, None);
    }

    #[test]
    fn unsupported_symbol_is_an_error() {
        let src = SyntheticSource::at(now().timestamp_millis());
        let err = run_backtest(&src, "NOSLASH", &AppConfig::default(), now()).unwrap_err();
        assert!(matches!(err, RunError::UnsupportedSymbol(_)));
    }

    #[test]
    fn parallel_runs_keep_order_and_are_deterministic() {
        let src = SyntheticSource::at(now().timestamp_millis());
        let cfg = AppConfig::default();
        let symbols = vec!["BTC/USD".to_string(), "ETH/USD".to_string()];
        let results = run_backtests(&src, &symbols, &cfg, now());
        assert_eq!(results[0].0, "BTC/USD");
        assert_eq!(results[1].0, "ETH/USD");
        let single = run_backtest(&src, "ETH/USD", &cfg, now()).unwrap();
        assert_eq!(results[1].1.as_ref().unwrap(), &single);
    }

    #[test]
    fn report_trades_are_capped() {
        let src = SyntheticSource::at(now().timestamp_millis());
        let mut cfg = AppConfig::default();
        cfg.backtest.max_report_trades = 1;
        let report = run_backtest(&src, "BTC/USD", &cfg, now()).unwrap();
        assert!(report.trades.len() <= 1);
        assert_eq!(report.meta.total_trades, report.stats.trades);
    }
}
