//! Market data: the source trait, the exchange client, the synthetic
//! generator and the circuit breaker.

pub mod circuit_breaker;
pub mod coinbase;
pub mod source;
pub mod synthetic;

pub use circuit_breaker::CircuitBreaker;
pub use coinbase::CoinbaseSource;
pub use source::{CandleSource, DataError, MemorySource};
pub use synthetic::SyntheticSource;

use trendfuse_core::domain::{Candle, Timeframe};

/// Closed 5m and 15m candles for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    pub symbol: String,
    pub fast: Vec<Candle>,
    pub slow: Vec<Candle>,
}

impl MarketData {
    /// Fetch both timeframes and drop buckets still open at `now_ms`.
    pub fn load(
        source: &dyn CandleSource,
        symbol: &str,
        limit_fast: usize,
        limit_slow: usize,
        now_ms: i64,
    ) -> Result<Self, DataError> {
        let mut fast = source.fetch(symbol, Timeframe::M5, limit_fast)?;
        let mut slow = source.fetch(symbol, Timeframe::M15, limit_slow)?;
        fast.retain(|c| c.is_closed_at(Timeframe::M5, now_ms));
        slow.retain(|c| c.is_closed_at(Timeframe::M15, now_ms));
        Ok(Self {
            symbol: symbol.to_string(),
            fast,
            slow,
        })
    }

    /// blake3 over the candle values, stable across runs on the same tape.
    pub fn dataset_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        for (tag, series) in [(b"5m", &self.fast), (b"15", &self.slow)] {
            hasher.update(tag);
            for c in series.iter() {
                hasher.update(&c.t.to_le_bytes());
                for v in [c.open, c.high, c.low, c.close, c.volume] {
                    hasher.update(&v.to_le_bytes());
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
