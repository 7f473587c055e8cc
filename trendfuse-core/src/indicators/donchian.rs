//! Prior-window Donchian levels: the swing high / swing low a break of
//! structure is measured against.
//!
//! - Upper: max(high[t-period..t])  (current bar excluded)
//! - Lower: min(low[t-period..t])   (current bar excluded)
//!
//! Lookback: period. A NaN anywhere in the window yields NaN.

use super::Indicator;
use crate::domain::Candle;

/// Which side of the structure to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonchianBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    name: String,
}

impl Donchian {
    pub fn upper(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            band: DonchianBand::Upper,
            name: format!("swing_high_{period}"),
        }
    }

    pub fn lower(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            band: DonchianBand::Lower,
            name: format!("swing_low_{period}"),
        }
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];

        for (i, slot) in result.iter_mut().enumerate().skip(self.period) {
            let window = &candles[i - self.period..i];
            *slot = match self.band {
                DonchianBand::Upper => extreme(window.iter().map(|c| c.high), f64::max),
                DonchianBand::Lower => extreme(window.iter().map(|c| c.low), f64::min),
            };
        }

        result
    }
}

fn extreme(values: impl Iterator<Item = f64>, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc: Option<f64> = None;
    for v in values {
        if v.is_nan() {
            return f64::NAN;
        }
        acc = Some(match acc {
            Some(a) => pick(a, v),
            None => v,
        });
    }
    acc.unwrap_or(f64::NAN)
}
