//! Forward-test run records and the per-candle mutations the stepper commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendfuse_core::domain::{ExitReason, RunId, Side, TradeId};

use crate::metrics::TradeStats;

/// A paper-trading session over a fixed horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardTestRun {
    pub id: RunId,
    pub symbol: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    /// Open time (ms) of the last committed 5m candle.
    pub last_candle_ts: Option<i64>,
    /// Set once, when the run is finalized.
    pub summary: Option<TradeStats>,
}

impl ForwardTestRun {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    pub symbol: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub direction: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub candle_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeExit {
    pub trade_id: TradeId,
    pub exit_price: f64,
    pub reason: ExitReason,
    pub exit_time: DateTime<Utc>,
}

/// Everything one processed candle changes, applied atomically by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleCommit {
    pub candle_ts: i64,
    /// Applied before `open`.
    pub close: Option<TradeExit>,
    pub open: Option<NewTrade>,
}
