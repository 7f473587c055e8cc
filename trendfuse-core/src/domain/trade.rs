//! Trade records: the backtest ledger entry and the persisted forward-test trade.

use super::ids::{RunId, TradeId};
use crate::engine::bracket::Bracket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Signed fractional return of a move from `entry` to `exit`.
    pub fn return_frac(self, entry: f64, exit: f64) -> f64 {
        if entry == 0.0 {
            return 0.0;
        }
        (exit / entry - 1.0) * self.sign()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Long => "long",
            Side::Short => "short",
        })
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    DirectionFlip,
    GradeDeterioration,
    MaxHold,
    EndOfData,
    SignalFlip,
    SessionEnd,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::DirectionFlip => "direction_flip",
            ExitReason::GradeDeterioration => "grade_deterioration",
            ExitReason::MaxHold => "max_hold",
            ExitReason::EndOfData => "end_of_data",
            ExitReason::SignalFlip => "signal_flip",
            ExitReason::SessionEnd => "session_end",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed backtest round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_ts: i64,
    pub exit_ts: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Signed return in percent (2.0 = +2%).
    pub pl_pct: f64,
    pub exit_reason: ExitReason,
    pub bars_held: usize,
}

impl ClosedTrade {
    /// Signed return as a fraction.
    pub fn return_frac(&self) -> f64 {
        self.pl_pct / 100.0
    }

    pub fn is_winner(&self) -> bool {
        self.pl_pct > 0.0
    }
}

/// A forward-test trade as persisted by the run store.
///
/// Open while `exit_price` is `None`; exit fields are filled exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub run_id: RunId,
    pub symbol: String,
    pub direction: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub r_multiple: Option<f64>,
    /// Signed percent.
    pub profit_loss: Option<f64>,
    /// Open time of the entry candle.
    pub candle_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_price.is_none()
    }

    pub fn bracket(&self) -> Bracket {
        Bracket {
            side: self.direction,
            entry: self.entry_price,
            stop: self.stop_loss,
            target: self.take_profit,
        }
    }

    /// Fill the exit fields: price, reason, R-multiple and signed percent P/L.
    pub fn close(&mut self, exit_price: f64, reason: ExitReason, at: DateTime<Utc>) {
        let bracket = self.bracket();
        self.exit_price = Some(exit_price);
        self.exit_reason = Some(reason);
        self.r_multiple = Some(bracket.r_multiple(exit_price));
        self.profit_loss = Some(bracket.pl_pct(exit_price));
        self.exit_time = Some(at);
    }
}
