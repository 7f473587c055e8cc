//! Trend state and the two-timeframe summary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EMA-alignment state of one series at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    Uptrend,
    Downtrend,
    Sideways,
    /// No data for the timeframe.
    Unknown,
}

impl TrendState {
    /// Classify from the three EMAs. Any NaN operand makes both chains false.
    pub fn from_emas(fast: f64, mid: f64, slow: f64) -> Self {
        if fast > mid && mid > slow {
            TrendState::Uptrend
        } else if fast < mid && mid < slow {
            TrendState::Downtrend
        } else {
            TrendState::Sideways
        }
    }

    pub fn is_directional(self) -> bool {
        matches!(self, TrendState::Uptrend | TrendState::Downtrend)
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendState::Uptrend => "uptrend",
            TrendState::Downtrend => "downtrend",
            TrendState::Sideways => "sideways",
            TrendState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Trend view combining the fast (5m) and slow (15m) timeframes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub trend: TrendState,
    pub trend_5m: TrendState,
    pub trend_15m: TrendState,
    pub last_ts_5m: i64,
    pub last_ts_15m: i64,
}

impl TrendSummary {
    /// Overall trend is the slow state unless it is not directional, then the fast state.
    pub fn combine(fast: TrendState, slow: TrendState, last_ts_fast: i64, last_ts_slow: i64) -> Self {
        let trend = if slow.is_directional() { slow } else { fast };
        Self {
            trend,
            trend_5m: fast,
            trend_15m: slow,
            last_ts_5m: last_ts_fast,
            last_ts_15m: last_ts_slow,
        }
    }
}
