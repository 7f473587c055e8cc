//! Backtest position and its exit rules.
//!
//! Exits are evaluated on the bar close in a fixed priority order:
//! take-profit, stop-loss, direction flip, grade deterioration, max hold.

use serde::{Deserialize, Serialize};

use crate::domain::{ClosedTrade, ExitReason, Side};
use crate::fusion::{FusionResult, Grade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitRules {
    /// Fractional return that takes profit (0.02 = +2%).
    pub take_profit_pct: f64,
    /// Fractional loss that stops out (0.01 = -1%).
    pub stop_loss_pct: f64,
    pub max_hold_bars: usize,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            take_profit_pct: 0.02,
            stop_loss_pct: 0.01,
            max_hold_bars: 288,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_ts: i64,
    pub entry_index: usize,
}

impl Position {
    pub fn open(side: Side, entry_price: f64, entry_ts: i64, entry_index: usize) -> Self {
        Self {
            side,
            entry_price,
            entry_ts,
            entry_index,
        }
    }

    /// Signed fractional return at `close`.
    pub fn unrealized(&self, close: f64) -> f64 {
        self.side.return_frac(self.entry_price, close)
    }

    /// First exit condition met at bar `index`, if any.
    pub fn exit_reason(
        &self,
        close: f64,
        index: usize,
        fusion: &FusionResult,
        rules: &ExitRules,
        min_grade: Grade,
    ) -> Option<ExitReason> {
        let pl = self.unrealized(close);
        let flipped = fusion
            .direction
            .side()
            .is_some_and(|s| s == self.side.opposite());

        if pl >= rules.take_profit_pct {
            Some(ExitReason::TakeProfit)
        } else if pl <= -rules.stop_loss_pct {
            Some(ExitReason::StopLoss)
        } else if flipped {
            Some(ExitReason::DirectionFlip)
        } else if fusion.grade < min_grade {
            Some(ExitReason::GradeDeterioration)
        } else if index - self.entry_index >= rules.max_hold_bars {
            Some(ExitReason::MaxHold)
        } else {
            None
        }
    }

    pub fn close(self, exit_price: f64, exit_ts: i64, index: usize, reason: ExitReason) -> ClosedTrade {
        let ret = self.unrealized(exit_price);
        ClosedTrade {
            side: self.side,
            entry_ts: self.entry_ts,
            exit_ts,
            entry_price: self.entry_price,
            exit_price,
            pl_pct: round2(ret * 100.0),
            exit_reason: reason,
            bars_held: index - self.entry_index,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
