//! Coinbase Exchange public candles client.
//!
//! `GET /products/{product}/candles?granularity=&start=&end=` returns at most
//! 300 buckets per call as `[time, low, high, open, close, volume]` rows,
//! newest first, with `time` in seconds. Larger limits are paged backwards.
//!
//! Calls are blocking with a bounded timeout and are not retried here; the
//! circuit breaker refuses calls after repeated failures.

use super::circuit_breaker::CircuitBreaker;
use super::source::{CandleSource, DataError};
use crate::config::DataConfig;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use trendfuse_core::domain::{normalize_series, Candle, Timeframe};

/// Buckets returned per request.
const PAGE_SIZE: usize = 300;

pub struct CoinbaseSource {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl CoinbaseSource {
    pub fn new(cfg: &DataConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("trendfuse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::ClientSetup(e.to_string()))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            circuit_breaker,
        })
    }

    pub fn from_config(cfg: &DataConfig) -> Result<Self, DataError> {
        let breaker = CircuitBreaker::new(Duration::from_secs(cfg.breaker_cooldown_secs));
        Self::new(cfg, Arc::new(breaker))
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerOpen);
        }
        tracing::debug!(url, "coinbase request");

        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) => {
                self.circuit_breaker.record_failure();
                return Err(DataError::NetworkUnreachable(e.to_string()));
            }
        };

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerOpen);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            return Err(DataError::RateLimited);
        }
        if status.is_server_error() {
            self.circuit_breaker.record_failure();
        }
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body = resp.text().unwrap_or_default();
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    fn fetch_page(
        &self,
        product: &str,
        timeframe: Timeframe,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let granularity = timeframe.duration_secs();
        let start = end - chrono::Duration::seconds(granularity * PAGE_SIZE as i64);
        let url = format!(
            "{}/products/{product}/candles?granularity={granularity}&start={}&end={}",
            self.base_url,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        let resp = self.get(&url)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::UnsupportedSymbol {
                symbol: product.to_string(),
            });
        }
        let rows: Vec<Vec<f64>> = resp
            .json()
            .map_err(|e| DataError::ResponseFormatChanged(format!("candles for {product}: {e}")))?;
        self.circuit_breaker.record_success();
        parse_rows(&rows)
    }
}

/// Exchange product id for a `BASE/QUOTE` symbol (`BTC/USD` -> `BTC-USD`).
pub fn product_id(symbol: &str) -> String {
    symbol.trim().replace('/', "-").to_uppercase()
}

/// Decode `[time, low, high, open, close, volume]` rows into candles.
pub fn parse_rows(rows: &[Vec<f64>]) -> Result<Vec<Candle>, DataError> {
    rows.iter()
        .map(|row| match row.as_slice() {
            [time, low, high, open, close, volume, ..] => Ok(Candle {
                t: (*time as i64) * 1000,
                open: *open,
                high: *high,
                low: *low,
                close: *close,
                volume: *volume,
            }),
            _ => Err(DataError::ResponseFormatChanged(format!(
                "candle row has {} fields, expected 6",
                row.len()
            ))),
        })
        .collect()
}

impl CandleSource for CoinbaseSource {
    fn name(&self) -> &str {
        "coinbase"
    }

    fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, DataError> {
        let product = product_id(symbol);
        let mut out: Vec<Candle> = Vec::with_capacity(limit);
        let mut end = Utc::now();
        let max_pages = limit / PAGE_SIZE + 2;

        for _ in 0..max_pages {
            if out.len() >= limit {
                break;
            }
            let page = self.fetch_page(&product, timeframe, end)?;
            let Some(oldest) = page.iter().map(|c| c.t).min() else {
                break;
            };
            out.extend(page);
            end = DateTime::from_timestamp_millis(oldest).unwrap_or(end) - chrono::Duration::seconds(1);
        }

        let mut series = normalize_series(out);
        let start = series.len().saturating_sub(limit);
        series.drain(..start);
        tracing::debug!(symbol, %timeframe, count = series.len(), "fetched candles");
        Ok(series)
    }

    fn symbol_supported(&self, symbol: &str) -> Result<bool, DataError> {
        let url = format!("{}/products/{}", self.base_url, product_id(symbol));
        let resp = self.get(&url)?;
        let supported = resp.status().is_success();
        self.circuit_breaker.record_success();
        Ok(supported)
    }
}
