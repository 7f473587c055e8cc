//! Deterministic synthetic candles for offline runs and demos.
//!
//! Every 5m bucket is a pure function of (symbol, bucket index), so repeated
//! fetches agree on overlapping history and the forward-test stepper sees a
//! consistent tape. Coarser timeframes are resampled from 5m. Results are
//! clearly fake and the source reports itself as `synthetic`.

use super::source::{CandleSource, DataError};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trendfuse_core::domain::{resample, Candle, Timeframe};

#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    /// Fixed clock in ms; wall clock when `None`.
    now_ms: Option<i64>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(now_ms: i64) -> Self {
        Self { now_ms: Some(now_ms) }
    }

    fn now_ms(&self) -> i64 {
        self.now_ms.unwrap_or_else(|| Utc::now().timestamp_millis())
    }
}

fn symbol_seed(symbol: &str) -> u64 {
    let hash = blake3::hash(symbol.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Close of 5m bucket `k`: slow waves plus bucket noise around a per-symbol base.
fn close_at(seed: u64, base: f64, k: i64) -> f64 {
    let x = k as f64;
    let mut rng = StdRng::seed_from_u64(seed ^ (k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    let noise: f64 = rng.gen_range(-0.001..0.001);
    base * (1.0 + 0.06 * (x / 577.0).sin() + 0.015 * (x / 61.0).sin() + noise)
}

fn bucket(seed: u64, base: f64, k: i64) -> Candle {
    let open = close_at(seed, base, k - 1);
    let close = close_at(seed, base, k);
    let mut rng = StdRng::seed_from_u64(seed.rotate_left(17) ^ k as u64);
    let wick = base * rng.gen_range(0.0..0.002);
    let spike = rng.gen_bool(0.04);
    let volume = rng.gen_range(80.0..120.0) * if spike { rng.gen_range(3.0..6.0) } else { 1.0 };
    Candle {
        t: k * Timeframe::M5.duration_ms(),
        open,
        high: open.max(close) + wick,
        low: open.min(close) - wick,
        close,
        volume,
    }
}

impl CandleSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, DataError> {
        if !self.symbol_supported(symbol)? {
            return Err(DataError::UnsupportedSymbol {
                symbol: symbol.to_string(),
            });
        }
        let seed = symbol_seed(symbol);
        let base = 100.0 + (seed % 50_000) as f64;

        let per_bucket = (timeframe.duration_ms() / Timeframe::M5.duration_ms()) as usize;
        let step = Timeframe::M5.duration_ms();
        let width = timeframe.duration_ms();
        // last 5m bucket that has opened, extended back to whole target buckets
        let last = self.now_ms().div_euclid(step);
        let first_target = (last * step).div_euclid(width) * width - (limit as i64 - 1) * width;
        let first = first_target.div_euclid(step);

        let fast: Vec<Candle> = (first..=last).map(|k| bucket(seed, base, k)).collect();
        let mut out = if per_bucket == 1 { fast } else { resample(&fast, timeframe) };
        let start = out.len().saturating_sub(limit);
        out.drain(..start);
        Ok(out)
    }

    fn symbol_supported(&self, symbol: &str) -> Result<bool, DataError> {
        let mut parts = symbol.split('/');
        Ok(matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(b), Some(q), None) if !b.is_empty() && !q.is_empty()
        ))
    }
}
