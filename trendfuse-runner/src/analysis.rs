//! On-demand analysis and live signal reports for one symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trendfuse_core::learner::LearnedWeights;
use trendfuse_core::{analyze, Analysis, LiveSignal, SignalEngine, SignalError};

use crate::config::AppConfig;
use crate::data::{CandleSource, MarketData};
use crate::runner::{build_frames, load_supported, RunError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub count_5m: usize,
    pub count_15m: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub meta: AnalysisMeta,
}

pub fn analyze_data(data: &MarketData, cfg: &AppConfig, generated_at: DateTime<Utc>) -> AnalysisReport {
    let (fast, slow) = build_frames(data, cfg);
    AnalysisReport {
        analysis: analyze(&fast, &slow, &cfg.engine),
        meta: AnalysisMeta {
            symbol: data.symbol.clone(),
            generated_at,
            count_5m: data.fast.len(),
            count_15m: data.slow.len(),
        },
    }
}

pub fn run_analysis(
    source: &dyn CandleSource,
    symbol: &str,
    cfg: &AppConfig,
    now: DateTime<Utc>,
) -> Result<AnalysisReport, RunError> {
    let limit = cfg.forward_test.fetch_limit;
    let data = load_supported(source, symbol, limit, limit, now)?;
    Ok(analyze_data(&data, cfg, now))
}

#[derive(Debug, thiserror::Error)]
pub enum LiveSignalError {
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Live action on the latest closed 5m candle, with the trade plan.
pub fn run_live_signal(
    source: &dyn CandleSource,
    symbol: &str,
    cfg: &AppConfig,
    learned: Option<LearnedWeights>,
    now: DateTime<Utc>,
) -> Result<LiveSignal, LiveSignalError> {
    let limit = cfg.forward_test.fetch_limit;
    let data = load_supported(source, symbol, limit, limit, now)?;

    let mut engine = SignalEngine::new(cfg.engine.clone());
    if let Some(learned) = learned {
        engine = engine.with_learned(learned);
    }
    let last = data.fast.len().checked_sub(1).ok_or(SignalError::InsufficientHistory {
        have: 0,
        need: cfg.engine.warmup_bars,
    })?;
    Ok(engine.evaluate_at(&data.fast, &data.slow, last)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticSource;
    use chrono::TimeZone;
    use trendfuse_core::fusion::Grade;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 2, 0).unwrap()
    }

    #[test]
    fn analysis_report_covers_both_timeframes() {
        let src = SyntheticSource::at(now().timestamp_millis());
        let report = run_analysis(&src, "BTC/USD", &AppConfig::default(), now()).unwrap();
        assert_eq!(report.meta.count_5m, 499);
        assert!(report.meta.count_15m >= 499);
        let f = &report.analysis.fusion;
        assert!((0..=100).contains(&f.score));
        assert_eq!(f.grade, Grade::from_score(f.score, &AppConfig::default().engine.fusion.grades));
        assert!(f.reasoning.len() <= 8);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("fusion").is_some());
        assert!(json.get("summary").is_some());
        assert_eq!(json["meta"]["symbol"], "BTC/USD");
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let src = SyntheticSource::at(now().timestamp_millis());
        let err = run_analysis(&src, "BTCUSD", &AppConfig::default(), now()).unwrap_err();
        assert!(matches!(err, RunError::UnsupportedSymbol(ref s) if s == "BTCUSD"));

        let err = run_live_signal(&src, "BTCUSD", &AppConfig::default(), None, now()).unwrap_err();
        assert!(matches!(err, LiveSignalError::Run(RunError::UnsupportedSymbol(_))));
    }

    #[test]
    fn live_signal_needs_warmup() {
        let src = SyntheticSource::at(now().timestamp_millis());
        let mut cfg = AppConfig::default();
        cfg.forward_test.fetch_limit = 100;
        let err = run_live_signal(&src, "BTC/USD", &cfg, None, now()).unwrap_err();
        assert!(matches!(
            err,
            LiveSignalError::Signal(SignalError::InsufficientHistory { have: 99, need: 250 })
        ));
    }

    #[test]
    fn live_signal_stamps_last_closed_candle() {
        let src = SyntheticSource::at(now().timestamp_millis());
        let signal = run_live_signal(&src, "BTC/USD", &AppConfig::default(), None, now()).unwrap();
        // 12:02 falls inside the 12:00 bucket, so 11:55 is the last closed one
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 11, 55, 0).unwrap().timestamp_millis();
        assert_eq!(signal.timestamp, expected);
        assert_eq!(signal.plan.is_some(), signal.action.side().is_some());
    }
}
