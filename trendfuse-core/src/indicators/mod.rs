//! Indicator implementations and the per-timeframe indicator frame.
//!
//! Indicators are pure functions: candle history in, numeric series out, one
//! value per candle. Values that cannot be computed (incomplete window, zero
//! range, zero mean) are `f64::NAN`; every comparison against NaN is false, so
//! undefined inputs never fire a signal.
//!
//! # Look-ahead contamination guard
//! No indicator value at bar t may depend on data from bar t+1 or later.

pub mod donchian;
pub mod ema;
pub mod frame;
pub mod volume;

pub use donchian::{Donchian, DonchianBand};
pub use ema::Ema;
pub use frame::{IndicatorFrame, IndicatorRow, IndicatorSettings};
pub use volume::{BodyPct, RelativeVolume};

use crate::domain::Candle;

/// A single-series indicator.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_20", "rv_20").
    fn name(&self) -> &str;

    /// Number of leading bars that are always NaN.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the whole series; output length equals input length.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Create synthetic 5m candles from close prices for testing.
///
/// open = prev close (or close for the first bar), high/low = body ± 1.0,
/// volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                t: i as i64 * 300_000,
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
