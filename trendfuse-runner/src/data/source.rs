//! Candle source trait and structured data errors.
//!
//! The `CandleSource` trait abstracts over market data (the exchange REST
//! client, the synthetic generator, in-memory fixtures) so the runner and the
//! forward-test stepper can be driven without a network.

use std::collections::HashMap;
use thiserror::Error;
use trendfuse_core::domain::{normalize_series, Candle, Timeframe};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} from data source: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("rate limited by data source")]
    RateLimited,

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not supported: {symbol}")]
    UnsupportedSymbol { symbol: String },

    #[error("timeframe {0} not available from this source")]
    UnsupportedTimeframe(Timeframe),

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    #[error("hard stop: data source refused after repeated failures (circuit breaker open)")]
    CircuitBreakerOpen,
}

/// Time-ordered OHLCV candles per timeframe.
pub trait CandleSource: Send + Sync {
    /// Short identifier for logs and report meta.
    fn name(&self) -> &str;

    /// Up to `limit` most recent candles, strictly ascending by open time.
    /// May include the still-forming candle; callers filter on closedness.
    fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, DataError>;

    fn symbol_supported(&self, symbol: &str) -> Result<bool, DataError>;
}

/// Fixed candle series keyed by symbol and timeframe.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    series: HashMap<(String, Timeframe), Vec<Candle>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series (normalized to ascending unique timestamps).
    pub fn with_series(mut self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.insert(symbol, timeframe, candles);
        self
    }

    pub fn insert(&mut self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        self.series
            .insert((symbol.to_string(), timeframe), normalize_series(candles));
    }
}

impl CandleSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, DataError> {
        let series = self
            .series
            .get(&(symbol.to_string(), timeframe))
            .ok_or_else(|| DataError::UnsupportedSymbol {
                symbol: symbol.to_string(),
            })?;
        let start = series.len().saturating_sub(limit);
        Ok(series[start..].to_vec())
    }

    fn symbol_supported(&self, symbol: &str) -> Result<bool, DataError> {
        Ok(self.series.keys().any(|(s, _)| s == symbol))
    }
}
