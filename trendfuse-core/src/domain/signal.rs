//! Discrete events emitted by the trend and volume detectors.

use super::candle::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    EmaCrossUp,
    EmaCrossDown,
    BosUp,
    BosDown,
    Climax,
    Ignition,
    Accumulation,
    Distribution,
}

impl SignalKind {
    /// Trend-detector events (crosses and breaks of structure).
    pub fn is_trend(self) -> bool {
        matches!(
            self,
            SignalKind::EmaCrossUp | SignalKind::EmaCrossDown | SignalKind::BosUp | SignalKind::BosDown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::EmaCrossUp => "ema_cross_up",
            SignalKind::EmaCrossDown => "ema_cross_down",
            SignalKind::BosUp => "bos_up",
            SignalKind::BosDown => "bos_down",
            SignalKind::Climax => "climax",
            SignalKind::Ignition => "ignition",
            SignalKind::Accumulation => "accumulation",
            SignalKind::Distribution => "distribution",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Close-vs-open direction of a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarDirection {
    Up,
    Down,
    Flat,
}

impl BarDirection {
    pub fn of(open: f64, close: f64) -> Self {
        if close > open {
            BarDirection::Up
        } else if close < open {
            BarDirection::Down
        } else {
            BarDirection::Flat
        }
    }

    /// +1 / -1 / 0, used for net up-close counting.
    pub fn sign(self) -> i64 {
        match self {
            BarDirection::Up => 1,
            BarDirection::Down => -1,
            BarDirection::Flat => 0,
        }
    }
}

/// A detected event on one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub timeframe: Timeframe,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rv: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<BarDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    /// EMA periods for cross events, e.g. `(20, 50)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<(usize, usize)>,
}

impl Signal {
    pub fn new(kind: SignalKind, timeframe: Timeframe, timestamp: i64) -> Self {
        Self {
            kind,
            timeframe,
            timestamp,
            rv: None,
            direction: None,
            count: None,
            score: None,
            pair: None,
        }
    }

    pub fn with_rv(mut self, rv: f64) -> Self {
        self.rv = if rv.is_nan() { None } else { Some(rv) };
        self
    }

    pub fn with_direction(mut self, direction: BarDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_pair(mut self, fast: usize, slow: usize) -> Self {
        self.pair = Some((fast, slow));
        self
    }

    pub fn with_tally(mut self, count: usize, score: i64) -> Self {
        self.count = Some(count);
        self.score = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_direction_from_open_close() {
        assert_eq!(BarDirection::of(1.0, 2.0), BarDirection::Up);
        assert_eq!(BarDirection::of(2.0, 1.0), BarDirection::Down);
        assert_eq!(BarDirection::of(1.0, 1.0), BarDirection::Flat);
    }

    #[test]
    fn signal_serializes_with_type_tag() {
        let s = Signal::new(SignalKind::BosUp, Timeframe::M5, 42);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["type"], "bos_up");
        assert_eq!(json["timeframe"], "5m");
        assert!(json.get("rv").is_none());
    }

    #[test]
    fn nan_rv_is_dropped() {
        let s = Signal::new(SignalKind::Climax, Timeframe::M5, 0).with_rv(f64::NAN);
        assert_eq!(s.rv, None);
    }
}
