//! Bar-by-bar backtest over a fast series with the slow series aligned.
//!
//! Per bar after warm-up:
//! 1. Score the local snapshot at the bar
//! 2. In position: check exits; on exit book the trade and skip entry
//! 3. Flat: open at the close when the result is tradable
//!
//! Any position still open after the last bar is closed at the final close.

use serde::{Deserialize, Serialize};

use super::config::EngineConfig;
use super::position::Position;
use crate::domain::{ClosedTrade, ExitReason};
use crate::indicators::IndicatorFrame;
use crate::snapshot::fusion_at;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub trades: Vec<ClosedTrade>,
    /// Equity after each closed trade, starting at 1.0.
    pub equity_curve: Vec<f64>,
    pub gross_profit: f64,
    pub gross_loss: f64,
}

impl SimulationOutcome {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(1.0)
    }
}

struct Ledger {
    equity: f64,
    curve: Vec<f64>,
    trades: Vec<ClosedTrade>,
    gross_profit: f64,
    gross_loss: f64,
}

impl Ledger {
    fn new() -> Self {
        Self {
            equity: 1.0,
            curve: vec![1.0],
            trades: Vec::new(),
            gross_profit: 0.0,
            gross_loss: 0.0,
        }
    }

    fn book(&mut self, position: Position, exit_price: f64, exit_ts: i64, index: usize, reason: ExitReason) {
        let ret = position.unrealized(exit_price);
        self.equity *= 1.0 + ret;
        self.curve.push(self.equity);
        if ret > 0.0 {
            self.gross_profit += ret;
        } else if ret < 0.0 {
            self.gross_loss += -ret;
        }
        self.trades.push(position.close(exit_price, exit_ts, index, reason));
    }

    fn finish(self) -> SimulationOutcome {
        SimulationOutcome {
            trades: self.trades,
            equity_curve: self.curve,
            gross_profit: self.gross_profit,
            gross_loss: self.gross_loss,
        }
    }
}

/// Replay `fast` bar by bar. Fewer bars than the warm-up yields no trades.
pub fn simulate(fast: &IndicatorFrame, slow: &IndicatorFrame, config: &EngineConfig) -> SimulationOutcome {
    let mut ledger = Ledger::new();
    let mut position: Option<Position> = None;

    for i in config.warmup_bars..fast.len() {
        let candle = *fast.candle(i);
        let fused = fusion_at(fast, slow, i, &config.volume, &config.fusion);

        if let Some(pos) = position {
            if let Some(reason) =
                pos.exit_reason(candle.close, i, &fused, &config.exits, config.min_entry_grade)
            {
                ledger.book(pos, candle.close, candle.t, i, reason);
                position = None;
                continue;
            }
        }

        if position.is_none() && fused.grade >= config.min_entry_grade {
            if let Some(side) = fused.direction.side() {
                position = Some(Position::open(side, candle.close, candle.t, i));
            }
        }
    }

    if let (Some(pos), Some(last)) = (position, fast.len().checked_sub(1)) {
        let candle = fast.candle(last);
        ledger.book(pos, candle.close, candle.t, last, ExitReason::EndOfData);
    }

    ledger.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{resample, Candle, Side, Timeframe};
    use crate::indicators::{make_candles, IndicatorSettings};

    fn frames(c5: &[Candle]) -> (IndicatorFrame, IndicatorFrame) {
        let settings = IndicatorSettings::default();
        (
            IndicatorFrame::compute(c5, Timeframe::M5, &settings),
            IndicatorFrame::compute(&resample(c5, Timeframe::M15), Timeframe::M15, &settings),
        )
    }

    fn spiky_uptrend(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.5).collect();
        let mut c = make_candles(&closes);
        for (i, candle) in c.iter_mut().enumerate() {
            if i % 10 == 0 {
                candle.volume = 5000.0;
            }
        }
        c
    }

    #[test]
    fn short_history_is_empty() {
        let (f5, f15) = frames(&spiky_uptrend(200));
        let out = simulate(&f5, &f15, &EngineConfig::default());
        assert!(out.trades.is_empty());
        assert_eq!(out.equity_curve, vec![1.0]);
        assert_eq!(out.final_equity(), 1.0);
    }

    #[test]
    fn quiet_uptrend_never_reaches_entry_grade() {
        let closes: Vec<f64> = (0..400).map(|i| 100.0 + i as f64 * 0.5).collect();
        let (f5, f15) = frames(&make_candles(&closes));
        let out = simulate(&f5, &f15, &EngineConfig::default());
        assert!(out.trades.is_empty());
    }

    #[test]
    fn spiky_uptrend_enters_long_and_closes_at_end() {
        let (f5, f15) = frames(&spiky_uptrend(300));
        let out = simulate(&f5, &f15, &EngineConfig::default());
        assert!(!out.trades.is_empty());
        let first = &out.trades[0];
        assert_eq!(first.side, Side::Long);
        assert_eq!(first.entry_ts, f5.candle(250).t);
        let last = out.trades.last().unwrap();
        assert_eq!(last.exit_reason, ExitReason::EndOfData);
        assert_eq!(last.exit_ts, f5.candle(299).t);
        assert_eq!(out.equity_curve.len(), out.trades.len() + 1);
    }

    #[test]
    fn no_reentry_on_exit_bar() {
        let mut c = spiky_uptrend(300);
        // +3% jump on bar 255 takes profit
        for candle in c.iter_mut().skip(255) {
            candle.open *= 1.03;
            candle.high *= 1.03;
            candle.low *= 1.03;
            candle.close *= 1.03;
        }
        let (f5, f15) = frames(&c);
        let out = simulate(&f5, &f15, &EngineConfig::default());
        let tp = out
            .trades
            .iter()
            .find(|t| t.exit_reason == ExitReason::TakeProfit)
            .expect("take-profit trade");
        assert_eq!(tp.exit_ts, f5.candle(255).t);
        assert_eq!(tp.entry_ts, f5.candle(250).t);
        if let Some(next) = out.trades.iter().find(|t| t.entry_ts > tp.entry_ts) {
            assert!(next.entry_ts > tp.exit_ts);
        }
        assert!(out.gross_profit > 0.0);
    }
}
