//! TrendFuse Runner: configuration, market data, reports and forward testing.
//!
//! This crate builds on `trendfuse-core` to provide:
//! - TOML application config with defaults for every section
//! - Candle sources (Coinbase Exchange, synthetic, in-memory) behind a circuit breaker
//! - Backtest and learner runs with reports, multi-symbol via rayon
//! - On-demand analysis and live signal reports
//! - Forward-test stepper, run stores (memory, JSON file), worker and CSV export

pub mod analysis;
pub mod config;
pub mod data;
pub mod forward;
pub mod metrics;
pub mod runner;

pub use analysis::{run_analysis, run_live_signal, AnalysisReport, LiveSignalError};
pub use config::{AppConfig, ConfigError};
pub use data::{CandleSource, CoinbaseSource, DataError, MarketData, MemorySource, SyntheticSource};
pub use forward::{JsonStore, MemoryStore, RunStore, StepError, Stepper, StoreError};
pub use metrics::TradeStats;
pub use runner::{run_backtest, run_backtests, run_learner, BacktestReport, LearningReport, RunError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn reports_are_send_sync() {
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
        assert_send::<AnalysisReport>();
        assert_sync::<AnalysisReport>();
        assert_send::<LearningReport>();
        assert_sync::<LearningReport>();
    }

    #[test]
    fn stepper_and_stores_are_send_sync() {
        assert_send::<Stepper>();
        assert_sync::<Stepper>();
        assert_send::<JsonStore>();
        assert_sync::<JsonStore>();
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
    }

    #[test]
    fn sources_are_send_sync() {
        assert_send::<CoinbaseSource>();
        assert_sync::<CoinbaseSource>();
        assert_send::<SyntheticSource>();
        assert_sync::<SyntheticSource>();
    }
}
