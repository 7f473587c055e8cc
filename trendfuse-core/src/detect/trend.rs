//! Trend detector: EMA alignment, EMA crosses and breaks of structure.

use serde::{Deserialize, Serialize};

use crate::domain::{Signal, SignalKind, TrendState, TrendSummary};
use crate::indicators::IndicatorFrame;

/// Summary plus the events observed on the latest bar of each timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDetection {
    pub summary: TrendSummary,
    pub signals: Vec<Signal>,
}

/// Alignment state at bar `i`.
pub fn trend_at(frame: &IndicatorFrame, i: usize) -> TrendState {
    frame.row(i).trend()
}

/// Alignment state at the latest bar, `Unknown` for an empty frame.
pub fn latest_trend(frame: &IndicatorFrame) -> TrendState {
    frame.last_row().map_or(TrendState::Unknown, |r| r.trend())
}

/// EMA crosses between bars `i - 1` and `i`.
///
/// Up: spread moves from <= 0 to > 0. Down: from >= 0 to < 0. A NaN spread on
/// either bar never fires.
pub fn ema_crosses(frame: &IndicatorFrame, i: usize) -> Vec<Signal> {
    let mut out = Vec::new();
    if i == 0 || i >= frame.len() {
        return out;
    }
    let settings = frame.settings();
    let prev = frame.row(i - 1);
    let curr = frame.row(i);
    let ts = curr.candle.t;

    for (a, b) in settings.cross_pairs() {
        let prev_diff = prev.ema_spread(a, b, settings);
        let curr_diff = curr.ema_spread(a, b, settings);
        if prev_diff.is_nan() || curr_diff.is_nan() {
            continue;
        }
        if prev_diff <= 0.0 && curr_diff > 0.0 {
            out.push(Signal::new(SignalKind::EmaCrossUp, frame.timeframe(), ts).with_pair(a, b));
        }
        if prev_diff >= 0.0 && curr_diff < 0.0 {
            out.push(Signal::new(SignalKind::EmaCrossDown, frame.timeframe(), ts).with_pair(a, b));
        }
    }
    out
}

/// Break of structure at bar `i`: close beyond the swing high/low of the
/// preceding `bos_lookback` bars.
pub fn breaks_of_structure(frame: &IndicatorFrame, i: usize) -> Vec<Signal> {
    let mut out = Vec::new();
    if i >= frame.len() {
        return out;
    }
    let (swing_high, swing_low) = frame.swing(i);
    let candle = frame.candle(i);
    if candle.close > swing_high {
        out.push(Signal::new(SignalKind::BosUp, frame.timeframe(), candle.t));
    }
    if candle.close < swing_low {
        out.push(Signal::new(SignalKind::BosDown, frame.timeframe(), candle.t));
    }
    out
}

/// Trend events at bar `i`: crosses first, then structure breaks.
pub fn trend_events_at(frame: &IndicatorFrame, i: usize) -> Vec<Signal> {
    let mut out = ema_crosses(frame, i);
    out.extend(breaks_of_structure(frame, i));
    out
}

/// Evaluate the latest bar of both timeframes.
pub fn detect(fast: &IndicatorFrame, slow: &IndicatorFrame) -> TrendDetection {
    let summary = TrendSummary::combine(
        latest_trend(fast),
        latest_trend(slow),
        fast.last_row().map_or(0, |r| r.candle.t),
        slow.last_row().map_or(0, |r| r.candle.t),
    );

    let mut signals = Vec::new();
    for frame in [fast, slow] {
        if let Some(last) = frame.len().checked_sub(1) {
            signals.extend(ema_crosses(frame, last));
        }
    }
    for frame in [fast, slow] {
        if let Some(last) = frame.len().checked_sub(1) {
            signals.extend(breaks_of_structure(frame, last));
        }
    }

    TrendDetection { summary, signals }
}
