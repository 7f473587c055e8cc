//! Local market snapshot at one fast-timeframe bar.
//!
//! The backtest, the learner and the live signal path all score bar `i` from
//! what was observable when it closed: the 5m row at `i`, the latest 15m row
//! whose bucket had closed by then, events local to bar `i` and the trailing
//! accumulation window.

use crate::detect::{trend_events_at, volume_events_at, VolumeThresholds};
use crate::domain::{Signal, TrendSummary};
use crate::fusion::{fuse, FusionResult, FusionWeights};
use crate::indicators::IndicatorFrame;

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub index: usize,
    pub slow_index: usize,
    pub summary: TrendSummary,
    pub trend_signals: Vec<Signal>,
    pub volume_signals: Vec<Signal>,
}

impl Snapshot {
    /// Build the snapshot at fast bar `i`; `None` while no slow bar has closed.
    pub fn at(
        fast: &IndicatorFrame,
        slow: &IndicatorFrame,
        i: usize,
        thresholds: &VolumeThresholds,
    ) -> Option<Self> {
        if i >= fast.len() {
            return None;
        }
        let row = fast.row(i);
        let closed_at = row.candle.close_time(fast.timeframe());
        let j = slow.last_closed_index(closed_at)?;
        let slow_row = slow.row(j);

        let summary = TrendSummary::combine(row.trend(), slow_row.trend(), row.candle.t, slow_row.candle.t);

        Some(Self {
            index: i,
            slow_index: j,
            summary,
            trend_signals: trend_events_at(fast, i),
            volume_signals: volume_events_at(fast, i, thresholds),
        })
    }

    pub fn fuse(&self, weights: &FusionWeights) -> FusionResult {
        fuse(&self.summary, &self.trend_signals, &self.volume_signals, weights)
    }
}

/// Fusion result at fast bar `i`, or the empty result without an aligned slow bar.
pub fn fusion_at(
    fast: &IndicatorFrame,
    slow: &IndicatorFrame,
    i: usize,
    thresholds: &VolumeThresholds,
    weights: &FusionWeights,
) -> FusionResult {
    Snapshot::at(fast, slow, i, thresholds).map_or_else(FusionResult::empty, |s| s.fuse(weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{resample, Timeframe, TrendState};
    use crate::fusion::Grade;
    use crate::indicators::{make_candles, IndicatorSettings};

    fn frames(closes: &[f64]) -> (IndicatorFrame, IndicatorFrame) {
        let settings = IndicatorSettings::default();
        let c5 = make_candles(closes);
        let c15 = resample(&c5, Timeframe::M15);
        (
            IndicatorFrame::compute(&c5, Timeframe::M5, &settings),
            IndicatorFrame::compute(&c15, Timeframe::M15, &settings),
        )
    }

    #[test]
    fn first_bars_have_no_closed_slow_bar() {
        let (f5, f15) = frames(&[100.0, 101.0, 102.0, 103.0]);
        assert!(Snapshot::at(&f5, &f15, 0, &VolumeThresholds::default()).is_none());
        assert!(Snapshot::at(&f5, &f15, 1, &VolumeThresholds::default()).is_none());
        // bar 2 closes the first 15m bucket
        let s = Snapshot::at(&f5, &f15, 2, &VolumeThresholds::default()).unwrap();
        assert_eq!(s.slow_index, 0);
        let empty = fusion_at(&f5, &f15, 0, &VolumeThresholds::default(), &FusionWeights::default());
        assert_eq!(empty, FusionResult::empty());
    }

    #[test]
    fn slow_bar_aligns_to_latest_closed_bucket() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let (f5, f15) = frames(&closes);
        let s = Snapshot::at(&f5, &f15, 10, &VolumeThresholds::default()).unwrap();
        // bar 10 sits inside bucket 3 (bars 9..=11), so bucket 2 is the latest closed
        assert_eq!(s.slow_index, 2);
        assert_eq!(s.summary.last_ts_15m, f15.candle(2).t);
    }

    #[test]
    fn long_uptrend_snapshot_scores_long() {
        let closes: Vec<f64> = (0..900).map(|i| 100.0 + i as f64 * 0.5).collect();
        let (f5, f15) = frames(&closes);
        let s = Snapshot::at(&f5, &f15, 899, &VolumeThresholds::default()).unwrap();
        assert_eq!(s.summary.trend, TrendState::Uptrend);
        let r = s.fuse(&FusionWeights::default());
        assert!(r.grade >= Grade::C);
        assert!(r.score >= 45);
    }
}
