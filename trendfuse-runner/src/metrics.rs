//! Trade statistics shared by the backtest report and forward-test summaries.
//!
//! Pure functions over signed per-trade returns; compounding starts from an
//! equity of 1.0. Reported values are rounded to 2 decimals.

use serde::{Deserialize, Serialize};
use trendfuse_core::domain::Trade;
use trendfuse_core::engine::SimulationOutcome;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with a positive return.
    pub win_rate: f64,
    /// Compounded P/L in percent.
    pub pl_pct: f64,
    /// `None` when there were no losing trades.
    pub profit_factor: Option<f64>,
    pub max_drawdown_pct: f64,
}

impl TradeStats {
    /// Stats from signed fractional returns (0.02 = +2%), in trade order.
    pub fn from_returns(returns: &[f64]) -> Self {
        let mut equity = 1.0;
        let mut curve = Vec::with_capacity(returns.len() + 1);
        curve.push(equity);
        let (mut wins, mut losses) = (0, 0);
        let (mut gross_profit, mut gross_loss) = (0.0, 0.0);

        for &r in returns {
            equity *= 1.0 + r;
            curve.push(equity);
            if r > 0.0 {
                wins += 1;
                gross_profit += r;
            } else {
                losses += 1;
                gross_loss += -r;
            }
        }

        let trades = returns.len();
        let win_rate = if trades == 0 {
            0.0
        } else {
            wins as f64 / trades as f64 * 100.0
        };
        Self {
            trades,
            wins,
            losses,
            win_rate: round2(win_rate),
            pl_pct: round2((equity - 1.0) * 100.0),
            profit_factor: profit_factor(gross_profit, gross_loss),
            max_drawdown_pct: round2(max_drawdown_pct(&curve)),
        }
    }

    /// Backtest stats from the simulator's unrounded equity and gross totals.
    pub fn from_simulation(outcome: &SimulationOutcome) -> Self {
        let trades = outcome.trades.len();
        let wins = outcome.trades.iter().filter(|t| t.is_winner()).count();
        let win_rate = if trades == 0 {
            0.0
        } else {
            wins as f64 / trades as f64 * 100.0
        };
        Self {
            trades,
            wins,
            losses: trades - wins,
            win_rate: round2(win_rate),
            pl_pct: round2((outcome.final_equity() - 1.0) * 100.0),
            profit_factor: profit_factor(outcome.gross_profit, outcome.gross_loss),
            max_drawdown_pct: round2(max_drawdown_pct(&outcome.equity_curve)),
        }
    }

    /// Forward-test stats; open trades are ignored.
    pub fn from_forward(trades: &[Trade]) -> Self {
        let returns: Vec<f64> = trades
            .iter()
            .filter_map(|t| t.profit_loss)
            .map(|pl| pl / 100.0)
            .collect();
        Self::from_returns(&returns)
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Gross profit over gross loss; `None` when gross loss is zero.
pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> Option<f64> {
    if gross_loss > 0.0 {
        Some(round2(gross_profit / gross_loss))
    } else {
        None
    }
}

/// Largest peak-to-trough decline in percent.
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd * 100.0
}
