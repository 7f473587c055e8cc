//! On-demand analysis and the live buy/sell/hold action.
//!
//! Analysis runs the full-series detectors on both timeframes and scores the
//! latest bar. The live action adds the learner bonus (when present) and maps
//! the result to an action; it is what the forward-test stepper trades on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::detect::{trend, volume};
use crate::domain::{Candle, Side, Signal, Timeframe, TrendSummary};
use crate::engine::{Bracket, EngineConfig};
use crate::fusion::{fuse, Direction, FusionResult};
use crate::indicators::IndicatorFrame;
use crate::learner::{apply_bonus, LearnedWeights};

/// Candles a trade plan stays valid for after the signal bar.
pub const PLAN_VALID_CANDLES: usize = 8;

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn side(self) -> Option<Side> {
        match self {
            Action::Buy => Some(Side::Long),
            Action::Sell => Some(Side::Short),
            Action::Hold => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Hold => "hold",
        })
    }
}

/// Full-series detection and scoring of the latest bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: TrendSummary,
    pub trend_signals: Vec<Signal>,
    pub volume_signals: Vec<Signal>,
    pub fusion: FusionResult,
}

pub fn analyze(fast: &IndicatorFrame, slow: &IndicatorFrame, config: &EngineConfig) -> Analysis {
    let detection = trend::detect(fast, slow);
    let mut trend_signals = detection.signals;
    let mut volume_signals = volume::detect(fast, &config.volume);
    volume_signals.extend(volume::detect(slow, &config.volume));

    // stable: same-timestamp events keep detector order
    trend_signals.sort_by_key(|s| s.timestamp);
    volume_signals.sort_by_key(|s| s.timestamp);

    let fusion = fuse(&detection.summary, &trend_signals, &volume_signals, &config.fusion);
    Analysis {
        summary: detection.summary,
        trend_signals,
        volume_signals,
        fusion,
    }
}

/// Entry, target and stop suggested for a buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub side: Side,
    pub entry: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub reward_risk: f64,
    pub valid_candles: usize,
}

impl TradePlan {
    pub fn from_bracket(bracket: &Bracket) -> Self {
        Self {
            side: bracket.side,
            entry: bracket.entry,
            take_profit: bracket.target,
            stop_loss: bracket.stop,
            reward_risk: bracket.reward_risk(),
            valid_candles: PLAN_VALID_CANDLES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSignal {
    pub action: Action,
    pub fusion: FusionResult,
    pub summary: TrendSummary,
    /// Open time of the evaluated fast bar.
    pub timestamp: i64,
    pub close: f64,
    pub plan: Option<TradePlan>,
}

/// Live signal evaluator with optional learned bonus weights.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: EngineConfig,
    learned: Option<LearnedWeights>,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            learned: None,
        }
    }

    pub fn with_learned(mut self, learned: LearnedWeights) -> Self {
        self.learned = Some(learned);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn learned(&self) -> Option<&LearnedWeights> {
        self.learned.as_ref()
    }

    /// Evaluate the last fast candle. `slow` must hold only buckets that had
    /// closed by the end of that candle.
    pub fn evaluate(&self, fast: &[Candle], slow: &[Candle]) -> Result<LiveSignal, SignalError> {
        let need = self.config.warmup_bars;
        let Some(last) = fast.last() else {
            return Err(SignalError::InsufficientHistory { have: 0, need });
        };
        if fast.len() < need {
            return Err(SignalError::InsufficientHistory {
                have: fast.len(),
                need,
            });
        }

        let settings = &self.config.indicators;
        let fast_frame = IndicatorFrame::compute(fast, Timeframe::M5, settings);
        let slow_frame = IndicatorFrame::compute(slow, Timeframe::M15, settings);
        let analysis = analyze(&fast_frame, &slow_frame, &self.config);

        let fusion = match &self.learned {
            Some(learned) => apply_bonus(&analysis.fusion, learned, &self.config.fusion.grades),
            None => analysis.fusion,
        };
        let action = self.action_for(&fusion);
        let plan = action
            .side()
            .map(|side| TradePlan::from_bracket(&Bracket::from_entry(side, last.close, &self.config.bracket)));

        Ok(LiveSignal {
            action,
            fusion,
            summary: analysis.summary,
            timestamp: last.t,
            close: last.close,
            plan,
        })
    }

    /// Evaluate as of fast candle `i`: history truncated at `i`, slow candles
    /// limited to buckets closed by the end of candle `i`.
    pub fn evaluate_at(&self, fast: &[Candle], slow: &[Candle], i: usize) -> Result<LiveSignal, SignalError> {
        let need = self.config.warmup_bars;
        if i >= fast.len() {
            return Err(SignalError::InsufficientHistory { have: fast.len(), need });
        }
        let cutoff = fast[i].close_time(Timeframe::M5);
        let closed = slow.partition_point(|c| c.close_time(Timeframe::M15) <= cutoff);
        self.evaluate(&fast[..=i], &slow[..closed])
    }

    /// Action as of fast candle `i`; short history holds.
    pub fn action_at(&self, fast: &[Candle], slow: &[Candle], i: usize) -> Action {
        self.evaluate_at(fast, slow, i).map_or(Action::Hold, |s| s.action)
    }

    fn action_for(&self, fusion: &FusionResult) -> Action {
        if fusion.grade < self.config.min_entry_grade {
            return Action::Hold;
        }
        match fusion.direction {
            Direction::Long => Action::Buy,
            Direction::Short => Action::Sell,
            Direction::Neutral => Action::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{resample, SignalKind, TrendState};
    use crate::fusion::{FusionComponent, Grade};
    use crate::indicators::make_candles;
    use std::collections::BTreeMap;

    fn series(n: usize, step: f64, spikes: bool) -> (Vec<Candle>, Vec<Candle>) {
        let closes: Vec<f64> = (0..n).map(|i| 1000.0 + i as f64 * step).collect();
        let mut c5 = make_candles(&closes);
        if spikes {
            for (i, c) in c5.iter_mut().enumerate() {
                if i % 10 == 0 {
                    c.volume = 5000.0;
                }
            }
        }
        let c15 = resample(&c5, Timeframe::M15);
        (c5, c15)
    }

    #[test]
    fn short_history_is_an_error_and_holds() {
        let (c5, c15) = series(100, 0.5, true);
        let engine = SignalEngine::new(EngineConfig::default());
        assert_eq!(
            engine.evaluate(&c5, &c15).unwrap_err(),
            SignalError::InsufficientHistory { have: 100, need: 250 }
        );
        assert_eq!(engine.action_at(&c5, &c15, 99), Action::Hold);
        assert!(matches!(
            engine.evaluate(&[], &[]),
            Err(SignalError::InsufficientHistory { have: 0, .. })
        ));
    }

    #[test]
    fn spiky_uptrend_buys_with_plan() {
        let (c5, c15) = series(300, 0.5, true);
        let engine = SignalEngine::new(EngineConfig::default());
        let s = engine.evaluate_at(&c5, &c15, 299).unwrap();
        assert_eq!(s.summary.trend, TrendState::Uptrend);
        assert_eq!(s.action, Action::Buy);
        let plan = s.plan.unwrap();
        assert_eq!(plan.side, Side::Long);
        assert!((plan.stop_loss - s.close * 0.99).abs() < 1e-9);
        assert!((plan.reward_risk - 2.0).abs() < 1e-9);
        assert_eq!(plan.valid_candles, 8);
    }

    #[test]
    fn quiet_uptrend_holds_without_bonus_and_buys_with_it() {
        let (c5, c15) = series(300, 0.5, false);
        let engine = SignalEngine::new(EngineConfig::default());
        let base = engine.evaluate(&c5, &c15[..c15.len() - 1]).unwrap();
        assert_eq!(base.fusion.score, 45);
        assert_eq!(base.action, Action::Hold);
        assert!(base.plan.is_none());

        let mut weights = BTreeMap::new();
        weights.insert(FusionComponent::Confirm5m, 10.0);
        let learned = LearnedWeights {
            weights,
            ranking: Vec::new(),
            samples: 0,
            horizon_bars: 12,
        };
        let boosted = engine.with_learned(learned).evaluate(&c5, &c15[..c15.len() - 1]).unwrap();
        assert_eq!(boosted.fusion.score, 55);
        assert_eq!(boosted.fusion.grade, Grade::B);
        assert_eq!(boosted.action, Action::Buy);
    }

    #[test]
    fn evaluate_at_ignores_future_candles() {
        let (c5, c15) = series(320, 0.5, true);
        let engine = SignalEngine::new(EngineConfig::default());
        let full = engine.evaluate_at(&c5, &c15, 280).unwrap();
        let cut = engine.evaluate_at(&c5[..=280], &c15, 280).unwrap();
        assert_eq!(full, cut);
        assert_eq!(full.timestamp, c5[280].t);
    }

    #[test]
    fn analysis_orders_signals_by_time() {
        let (c5, c15) = series(300, 0.5, true);
        let settings = EngineConfig::default();
        let f5 = IndicatorFrame::compute(&c5, Timeframe::M5, &settings.indicators);
        let f15 = IndicatorFrame::compute(&c15, Timeframe::M15, &settings.indicators);
        let a = analyze(&f5, &f15, &settings);
        assert!(a.volume_signals.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(a.volume_signals.iter().any(|s| s.kind == SignalKind::Accumulation));
    }
}
