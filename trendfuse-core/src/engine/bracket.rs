//! Stop/target bracket around a forward-test entry.
//!
//! Long: stop = close × 0.99, target = close × 1.02.
//! Short: stop = close × 1.01, target = close × 0.98.
//!
//! When one bar touches both levels the stop wins.

use serde::{Deserialize, Serialize};

use crate::domain::{ExitReason, Side};

/// Bracket offsets as price multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BracketConfig {
    pub long_stop: f64,
    pub long_target: f64,
    pub short_stop: f64,
    pub short_target: f64,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            long_stop: 0.99,
            long_target: 1.02,
            short_stop: 1.01,
            short_target: 0.98,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

impl Bracket {
    pub fn from_entry(side: Side, close: f64, cfg: &BracketConfig) -> Self {
        let (stop, target) = match side {
            Side::Long => (close * cfg.long_stop, close * cfg.long_target),
            Side::Short => (close * cfg.short_stop, close * cfg.short_target),
        };
        Self {
            side,
            entry: close,
            stop,
            target,
        }
    }

    /// Price exit triggered by a bar's range, stop checked first.
    pub fn check_bar(&self, high: f64, low: f64) -> Option<(f64, ExitReason)> {
        let (stop_hit, target_hit) = match self.side {
            Side::Long => (low <= self.stop, high >= self.target),
            Side::Short => (high >= self.stop, low <= self.target),
        };
        if stop_hit {
            Some((self.stop, ExitReason::StopLoss))
        } else if target_hit {
            Some((self.target, ExitReason::TakeProfit))
        } else {
            None
        }
    }

    pub fn risk(&self) -> f64 {
        (self.entry - self.stop).abs()
    }

    /// P/L in units of initial risk; 0 when risk is 0.
    pub fn r_multiple(&self, exit: f64) -> f64 {
        let risk = self.risk();
        if risk == 0.0 {
            return 0.0;
        }
        (exit - self.entry) * self.side.sign() / risk
    }

    /// Signed P/L in percent.
    pub fn pl_pct(&self, exit: f64) -> f64 {
        self.side.return_frac(self.entry, exit) * 100.0
    }

    /// Reward-to-risk ratio of the bracket itself.
    pub fn reward_risk(&self) -> f64 {
        let risk = self.risk();
        if risk == 0.0 {
            return 0.0;
        }
        (self.target - self.entry).abs() / risk
    }
}
