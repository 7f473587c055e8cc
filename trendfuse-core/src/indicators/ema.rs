//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[0] = close[0]. The recursion runs from the first bar, but values
//! are reported only once `period` observations exist.
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        ema_of_series(&closes, self.period)
    }
}

/// Compute EMA values from a pre-extracted f64 slice.
///
/// A NaN input taints its own index and every later one.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = f64::NAN;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            return result;
        }
        let ema = if i == 0 { v } else { alpha * v + (1.0 - alpha) * prev };
        if i + 1 >= period {
            result[i] = ema;
        }
        prev = ema;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_close() {
        let candles = make_candles(&[100.0, 200.0, 300.0]);
        let result = Ema::new(1).compute(&candles);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_known_values() {
        // Closes: 10, 11, 12, 13, 14; alpha = 0.5
        // Recursion: 10, 10.5, 11.25, 12.125, 13.0625
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Ema::new(3).compute(&candles);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.25, DEFAULT_EPSILON);
        assert_approx(result[3], 12.125, DEFAULT_EPSILON);
        assert_approx(result[4], 13.0625, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_undefined_for_first_period_minus_one_bars() {
        let closes: Vec<f64> = (0..300).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        for period in [20usize, 50, 200] {
            let result = Ema::new(period).compute(&candles);
            assert!(result[..period - 1].iter().all(|v| v.is_nan()));
            assert!(result[period - 1..].iter().all(|v| !v.is_nan()));
        }
    }

    #[test]
    fn ema_follows_recurrence_on_monotonic_series() {
        let closes: Vec<f64> = (0..120).map(|i| 50.0 + 0.5 * i as f64).collect();
        let result = ema_of_series(&closes, 20);
        let alpha = 2.0 / 21.0;
        for i in 20..closes.len() {
            let expected = alpha * closes[i] + (1.0 - alpha) * result[i - 1];
            assert_approx(result[i], expected, 1e-9);
            assert!(result[i] < closes[i], "EMA lags a rising series");
        }
    }

    #[test]
    fn ema_nan_propagates() {
        let mut candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        candles[3].close = f64::NAN;
        let result = Ema::new(3).compute(&candles);
        assert_approx(result[2], 11.25, DEFAULT_EPSILON);
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
    }

    #[test]
    fn ema_short_series_is_all_nan() {
        let result = ema_of_series(&[1.0, 2.0], 3);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn ema_lookback() {
        assert_eq!(Ema::new(20).lookback(), 19);
        assert_eq!(Ema::new(1).lookback(), 0);
    }
}
