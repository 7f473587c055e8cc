//! Volume and candle-shape features.
//!
//! - Relative volume: volume[t] / mean(volume[t-period+1..=t]); full window
//!   required, zero mean is undefined. Lookback: period - 1.
//! - Body percent: |close - open| / (high - low); undefined when the range is 0.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct RelativeVolume {
    period: usize,
    name: String,
}

impl RelativeVolume {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "relative volume period must be >= 1");
        Self {
            period,
            name: format!("rv_{period}"),
        }
    }
}

impl Indicator for RelativeVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        let means = rolling_mean(&volumes, self.period);
        volumes
            .iter()
            .zip(&means)
            .map(|(&v, &m)| if m > 0.0 { v / m } else { f64::NAN })
            .collect()
    }
}

/// Rolling mean with a full window required; NaN in the window yields NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
        }
        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }

    result
}

#[derive(Debug, Clone, Default)]
pub struct BodyPct;

impl Indicator for BodyPct {
    fn name(&self) -> &str {
        "body_pct"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        candles
            .iter()
            .map(|c| {
                let range = c.high - c.low;
                if range > 0.0 {
                    (c.close - c.open).abs() / range
                } else {
                    f64::NAN
                }
            })
            .collect()
    }
}
