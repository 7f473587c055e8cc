//! Precomputed indicator columns for one timeframe.
//!
//! Built once per candle series, then queried by bar index. Because every
//! column is causal, a frame built over the full history gives the same value
//! at bar t as a frame built over `candles[..=t]`.

use serde::{Deserialize, Serialize};

use super::{BodyPct, Donchian, Ema, Indicator, RelativeVolume};
use crate::domain::{BarDirection, Candle, Timeframe, TrendState};

/// Indicator periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    pub rv_period: usize,
    /// Bars before the current one that define the swing high/low.
    pub bos_lookback: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_fast: 20,
            ema_mid: 50,
            ema_slow: 200,
            rv_period: 20,
            bos_lookback: 20,
        }
    }
}

impl IndicatorSettings {
    /// EMA pairs checked for crosses, fast leg first.
    pub fn cross_pairs(&self) -> [(usize, usize); 3] {
        [
            (self.ema_fast, self.ema_mid),
            (self.ema_mid, self.ema_slow),
            (self.ema_fast, self.ema_slow),
        ]
    }
}

/// A candle plus its computed features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub candle: Candle,
    pub ema_fast: f64,
    pub ema_mid: f64,
    pub ema_slow: f64,
    pub rv: f64,
    pub body_pct: f64,
    pub dir: BarDirection,
}

impl IndicatorRow {
    pub fn trend(&self) -> TrendState {
        TrendState::from_emas(self.ema_fast, self.ema_mid, self.ema_slow)
    }

    /// EMA value for one of the configured periods.
    fn ema(&self, period: usize, settings: &IndicatorSettings) -> f64 {
        if period == settings.ema_fast {
            self.ema_fast
        } else if period == settings.ema_mid {
            self.ema_mid
        } else if period == settings.ema_slow {
            self.ema_slow
        } else {
            f64::NAN
        }
    }

    /// Difference `ema(a) - ema(b)`, NaN when either leg is undefined.
    pub fn ema_spread(&self, a: usize, b: usize, settings: &IndicatorSettings) -> f64 {
        self.ema(a, settings) - self.ema(b, settings)
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    timeframe: Timeframe,
    settings: IndicatorSettings,
    candles: Vec<Candle>,
    ema_fast: Vec<f64>,
    ema_mid: Vec<f64>,
    ema_slow: Vec<f64>,
    rv: Vec<f64>,
    body_pct: Vec<f64>,
    swing_high: Vec<f64>,
    swing_low: Vec<f64>,
}

impl IndicatorFrame {
    pub fn compute(candles: &[Candle], timeframe: Timeframe, settings: &IndicatorSettings) -> Self {
        Self {
            timeframe,
            settings: settings.clone(),
            candles: candles.to_vec(),
            ema_fast: Ema::new(settings.ema_fast).compute(candles),
            ema_mid: Ema::new(settings.ema_mid).compute(candles),
            ema_slow: Ema::new(settings.ema_slow).compute(candles),
            rv: RelativeVolume::new(settings.rv_period).compute(candles),
            body_pct: BodyPct.compute(candles),
            swing_high: Donchian::upper(settings.bos_lookback).compute(candles),
            swing_low: Donchian::lower(settings.bos_lookback).compute(candles),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn settings(&self) -> &IndicatorSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn candle(&self, i: usize) -> &Candle {
        &self.candles[i]
    }

    pub fn row(&self, i: usize) -> IndicatorRow {
        let candle = self.candles[i];
        IndicatorRow {
            candle,
            ema_fast: self.ema_fast[i],
            ema_mid: self.ema_mid[i],
            ema_slow: self.ema_slow[i],
            rv: self.rv[i],
            body_pct: self.body_pct[i],
            dir: BarDirection::of(candle.open, candle.close),
        }
    }

    pub fn last_row(&self) -> Option<IndicatorRow> {
        self.len().checked_sub(1).map(|i| self.row(i))
    }

    /// Swing high / low of the bars before `i` (NaN during warm-up).
    pub fn swing(&self, i: usize) -> (f64, f64) {
        (self.swing_high[i], self.swing_low[i])
    }

    pub fn rv_at(&self, i: usize) -> f64 {
        self.rv[i]
    }

    /// Index of the latest bar whose bucket has closed by `at_ms`.
    ///
    /// Used to align the slow timeframe with a fast-timeframe bar without
    /// looking at a slow bucket that was still forming.
    pub fn last_closed_index(&self, at_ms: i64) -> Option<usize> {
        let width = self.timeframe.duration_ms();
        let n = self.candles.partition_point(|c| c.t + width <= at_ms);
        n.checked_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    #[test]
    fn row_exposes_all_columns() {
        let closes: Vec<f64> = (0..260).map(|i| 100.0 + i as f64).collect();
        let frame = IndicatorFrame::compute(
            &make_candles(&closes),
            Timeframe::M5,
            &IndicatorSettings::default(),
        );
        let row = frame.row(259);
        assert!(!row.ema_slow.is_nan());
        assert_eq!(row.dir, BarDirection::Up);
        assert_eq!(row.trend(), TrendState::Uptrend);
        assert!(frame.row(10).ema_fast.is_nan());
    }

    #[test]
    fn frame_is_causal() {
        let closes: Vec<f64> = (0..300).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let candles = make_candles(&closes);
        let settings = IndicatorSettings::default();
        let full = IndicatorFrame::compute(&candles, Timeframe::M5, &settings);
        let cut = IndicatorFrame::compute(&candles[..=250], Timeframe::M5, &settings);
        assert_eq!(full.row(250), cut.row(250));
        assert_eq!(full.swing(250), cut.swing(250));
    }

    #[test]
    fn last_closed_index_skips_forming_bucket() {
        let candles: Vec<Candle> = (0..4)
            .map(|i| Candle {
                t: i * 900_000,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            })
            .collect();
        let frame = IndicatorFrame::compute(&candles, Timeframe::M15, &IndicatorSettings::default());
        assert_eq!(frame.last_closed_index(0), None);
        assert_eq!(frame.last_closed_index(900_000), Some(0));
        assert_eq!(frame.last_closed_index(1_700_000), Some(0));
        assert_eq!(frame.last_closed_index(1_800_000), Some(1));
    }
}
