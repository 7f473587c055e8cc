//! Candle: the fundamental market data unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// OHLCV candle for a single timeframe bucket.
///
/// `t` is the bucket open time in milliseconds since the Unix epoch. A candle
/// is fully closed once `t + timeframe.duration_ms() <= now`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub t: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLC sanity check: high bounds the body from above, low from below.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.volume >= 0.0
    }

    /// Whether the bucket has fully closed at `now_ms`.
    pub fn is_closed_at(&self, timeframe: Timeframe, now_ms: i64) -> bool {
        self.t + timeframe.duration_ms() <= now_ms
    }

    /// Close time of the bucket (exclusive end).
    pub fn close_time(&self, timeframe: Timeframe) -> i64 {
        self.t + timeframe.duration_ms()
    }
}

/// Candle bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
}

impl Timeframe {
    pub fn duration_ms(self) -> i64 {
        self.duration_secs() * 1000
    }

    pub fn duration_secs(self) -> i64 {
        match self {
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::H1 => 3600,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = CandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            other => Err(CandleError::UnknownTimeframe(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CandleError {
    #[error("candle timestamps must be strictly increasing (index {index}: {prev} -> {next})")]
    NotIncreasing { index: usize, prev: i64, next: i64 },

    #[error("unknown timeframe '{0}' (expected 5m, 15m or 1h)")]
    UnknownTimeframe(String),
}

/// Verify that a candle sequence is strictly increasing in `t`.
pub fn validate_series(candles: &[Candle]) -> Result<(), CandleError> {
    for (i, pair) in candles.windows(2).enumerate() {
        if pair[1].t <= pair[0].t {
            return Err(CandleError::NotIncreasing {
                index: i + 1,
                prev: pair[0].t,
                next: pair[1].t,
            });
        }
    }
    Ok(())
}

/// Sort ascending by `t` and drop duplicate timestamps, keeping the last copy.
///
/// Exchange pagination can return overlapping pages; this restores the
/// strictly-increasing invariant.
pub fn normalize_series(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.t);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for c in candles {
        match out.last_mut() {
            Some(last) if last.t == c.t => *last = c,
            _ => out.push(c),
        }
    }
    out
}

/// Aggregate candles into a coarser timeframe.
///
/// Buckets are aligned to multiples of `to.duration_ms()`. Partial buckets at
/// either end are kept; callers filter on closedness when it matters.
pub fn resample(candles: &[Candle], to: Timeframe) -> Vec<Candle> {
    let width = to.duration_ms();
    let mut out: Vec<Candle> = Vec::new();
    for c in candles {
        let bucket = c.t - c.t.rem_euclid(width);
        match out.last_mut() {
            Some(agg) if agg.t == bucket => {
                agg.high = agg.high.max(c.high);
                agg.low = agg.low.min(c.low);
                agg.close = c.close;
                agg.volume += c.volume;
            }
            _ => out.push(Candle {
                t: bucket,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                volume: c.volume,
            }),
        }
    }
    out
}
