//! Run store contract and the state both store implementations share.
//!
//! Stores validate every mutation before applying it, so a rejected commit
//! leaves the run untouched: candles at or before `last_candle_ts` are stale,
//! and a run never holds more than one open trade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use trendfuse_core::domain::{RunId, Trade, TradeId};

use super::run::{CandleCommit, ForwardTestRun, NewRun, TradeExit};
use crate::metrics::TradeStats;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("forward test run {0} not found")]
    RunNotFound(RunId),

    #[error("run {run_id} is no longer active")]
    Inactive { run_id: RunId },

    #[error("stale candle for run {run_id}: {candle_ts} is not after {last_candle_ts}")]
    StaleCandle {
        run_id: RunId,
        candle_ts: i64,
        last_candle_ts: i64,
    },

    #[error("run {run_id} already has open trade {trade_id}")]
    OpenTradeExists { run_id: RunId, trade_id: TradeId },

    #[error("trade {trade_id} is not an open trade of run {run_id}")]
    TradeNotOpen { run_id: RunId, trade_id: TradeId },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persistence for forward-test runs and their trades.
pub trait RunStore: Send + Sync {
    fn create_run(&self, new: NewRun) -> Result<ForwardTestRun, StoreError>;

    fn get_run(&self, id: RunId) -> Result<ForwardTestRun, StoreError>;

    fn active_runs(&self) -> Result<Vec<ForwardTestRun>, StoreError>;

    fn open_trade(&self, run_id: RunId) -> Result<Option<Trade>, StoreError>;

    /// All trades of the run in creation order.
    fn trades_for_run(&self, run_id: RunId) -> Result<Vec<Trade>, StoreError>;

    /// Apply one candle's trade changes and advance `last_candle_ts`.
    fn commit_candle(&self, run_id: RunId, commit: CandleCommit, now: DateTime<Utc>) -> Result<(), StoreError>;

    /// Apply the session-end exit, store the summary and deactivate the run.
    fn finalize_run(
        &self,
        run_id: RunId,
        exit: Option<TradeExit>,
        summary: TradeStats,
    ) -> Result<ForwardTestRun, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    next_run_id: u64,
    next_trade_id: u64,
    runs: BTreeMap<RunId, ForwardTestRun>,
    /// Creation order.
    trades: Vec<Trade>,
}

impl StoreState {
    pub(crate) fn create_run(&mut self, new: NewRun) -> ForwardTestRun {
        self.next_run_id += 1;
        let run = ForwardTestRun {
            id: RunId(self.next_run_id),
            symbol: new.symbol,
            start_time: new.start_time,
            end_time: new.end_time,
            is_active: true,
            last_candle_ts: None,
            summary: None,
        };
        self.runs.insert(run.id, run.clone());
        run
    }

    pub(crate) fn get_run(&self, id: RunId) -> Result<ForwardTestRun, StoreError> {
        self.runs.get(&id).cloned().ok_or(StoreError::RunNotFound(id))
    }

    pub(crate) fn active_runs(&self) -> Vec<ForwardTestRun> {
        self.runs.values().filter(|r| r.is_active).cloned().collect()
    }

    pub(crate) fn open_trade(&self, run_id: RunId) -> Result<Option<Trade>, StoreError> {
        self.get_run(run_id)?;
        Ok(self
            .trades
            .iter()
            .rev()
            .find(|t| t.run_id == run_id && t.is_open())
            .cloned())
    }

    pub(crate) fn trades_for_run(&self, run_id: RunId) -> Result<Vec<Trade>, StoreError> {
        self.get_run(run_id)?;
        Ok(self.trades.iter().filter(|t| t.run_id == run_id).cloned().collect())
    }

    fn active_run(&self, run_id: RunId) -> Result<&ForwardTestRun, StoreError> {
        let run = self.runs.get(&run_id).ok_or(StoreError::RunNotFound(run_id))?;
        if !run.is_active {
            return Err(StoreError::Inactive { run_id });
        }
        Ok(run)
    }

    fn close_trade(&mut self, run_id: RunId, exit: &TradeExit) -> Result<(), StoreError> {
        let trade = self
            .trades
            .iter_mut()
            .find(|t| t.id == exit.trade_id && t.run_id == run_id && t.is_open())
            .ok_or(StoreError::TradeNotOpen {
                run_id,
                trade_id: exit.trade_id,
            })?;
        trade.close(exit.exit_price, exit.reason, exit.exit_time);
        Ok(())
    }

    /// Callers apply this to a copy and keep it only on success.
    pub(crate) fn commit_candle(
        &mut self,
        run_id: RunId,
        commit: CandleCommit,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let run = self.active_run(run_id)?;
        if let Some(last) = run.last_candle_ts {
            if commit.candle_ts <= last {
                return Err(StoreError::StaleCandle {
                    run_id,
                    candle_ts: commit.candle_ts,
                    last_candle_ts: last,
                });
            }
        }
        let symbol = run.symbol.clone();

        if let Some(exit) = &commit.close {
            self.close_trade(run_id, exit)?;
        }
        if let Some(new) = commit.open {
            if let Some(open) = self.open_trade(run_id)? {
                return Err(StoreError::OpenTradeExists {
                    run_id,
                    trade_id: open.id,
                });
            }
            self.next_trade_id += 1;
            self.trades.push(Trade {
                id: TradeId(self.next_trade_id),
                run_id,
                symbol,
                direction: new.direction,
                entry_price: new.entry_price,
                stop_loss: new.stop_loss,
                take_profit: new.take_profit,
                exit_price: None,
                exit_reason: None,
                r_multiple: None,
                profit_loss: None,
                candle_time: new.candle_time,
                exit_time: None,
                created_at: now,
            });
        }

        if let Some(run) = self.runs.get_mut(&run_id) {
            run.last_candle_ts = Some(commit.candle_ts);
        }
        Ok(())
    }

    pub(crate) fn finalize_run(
        &mut self,
        run_id: RunId,
        exit: Option<TradeExit>,
        summary: TradeStats,
    ) -> Result<ForwardTestRun, StoreError> {
        self.active_run(run_id)?;
        if let Some(exit) = &exit {
            self.close_trade(run_id, exit)?;
        }
        let run = self.runs.get_mut(&run_id).ok_or(StoreError::RunNotFound(run_id))?;
        run.is_active = false;
        run.summary = Some(summary);
        Ok(run.clone())
    }
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every `RunStore` must share; run against each implementation.

    use super::*;
    use crate::forward::run::NewTrade;
    use chrono::TimeZone;
    use trendfuse_core::domain::{ExitReason, Side};

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn new_run() -> NewRun {
        NewRun {
            symbol: "BTC/USD".into(),
            start_time: t0(),
            end_time: t0() + chrono::Duration::days(5),
        }
    }

    fn long_entry() -> NewTrade {
        NewTrade {
            direction: Side::Long,
            entry_price: 100.0,
            stop_loss: 99.0,
            take_profit: 102.0,
            candle_time: t0(),
        }
    }

    pub(crate) fn creates_and_lists_runs(store: &dyn RunStore) {
        let a = store.create_run(new_run()).unwrap();
        let b = store.create_run(new_run()).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.is_active);
        assert_eq!(store.get_run(a.id).unwrap(), a);
        assert_eq!(store.active_runs().unwrap().len(), 2);
        assert!(matches!(store.get_run(RunId(999)), Err(StoreError::RunNotFound(_))));
    }

    pub(crate) fn rejects_stale_candles(store: &dyn RunStore) {
        let run = store.create_run(new_run()).unwrap();
        let commit = |ts| CandleCommit {
            candle_ts: ts,
            close: None,
            open: None,
        };
        store.commit_candle(run.id, commit(300_000), t0()).unwrap();
        let err = store.commit_candle(run.id, commit(300_000), t0()).unwrap_err();
        assert!(matches!(err, StoreError::StaleCandle { last_candle_ts: 300_000, .. }));
        assert!(store.commit_candle(run.id, commit(0), t0()).is_err());
        store.commit_candle(run.id, commit(600_000), t0()).unwrap();
        assert_eq!(store.get_run(run.id).unwrap().last_candle_ts, Some(600_000));
    }

    pub(crate) fn one_open_trade_per_run(store: &dyn RunStore) {
        let run = store.create_run(new_run()).unwrap();
        store
            .commit_candle(
                run.id,
                CandleCommit {
                    candle_ts: 0,
                    close: None,
                    open: Some(long_entry()),
                },
                t0(),
            )
            .unwrap();
        let err = store
            .commit_candle(
                run.id,
                CandleCommit {
                    candle_ts: 300_000,
                    close: None,
                    open: Some(long_entry()),
                },
                t0(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::OpenTradeExists { .. }));
        // rejected commit leaves the cursor where it was
        assert_eq!(store.get_run(run.id).unwrap().last_candle_ts, Some(0));
        assert_eq!(store.trades_for_run(run.id).unwrap().len(), 1);
    }

    pub(crate) fn close_then_reopen_and_finalize(store: &dyn RunStore) {
        let run = store.create_run(new_run()).unwrap();
        store
            .commit_candle(
                run.id,
                CandleCommit {
                    candle_ts: 0,
                    close: None,
                    open: Some(long_entry()),
                },
                t0(),
            )
            .unwrap();
        let open = store.open_trade(run.id).unwrap().unwrap();
        store
            .commit_candle(
                run.id,
                CandleCommit {
                    candle_ts: 300_000,
                    close: Some(TradeExit {
                        trade_id: open.id,
                        exit_price: 102.0,
                        reason: ExitReason::TakeProfit,
                        exit_time: t0(),
                    }),
                    open: Some(long_entry()),
                },
                t0(),
            )
            .unwrap();
        let trades = store.trades_for_run(run.id).unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades[0].id < trades[1].id);
        assert_eq!(trades[0].exit_reason, Some(ExitReason::TakeProfit));
        assert!((trades[0].r_multiple.unwrap() - 2.0).abs() < 1e-9);

        let second = store.open_trade(run.id).unwrap().unwrap();
        let done = store
            .finalize_run(
                run.id,
                Some(TradeExit {
                    trade_id: second.id,
                    exit_price: 100.0,
                    reason: ExitReason::SessionEnd,
                    exit_time: t0(),
                }),
                TradeStats::default(),
            )
            .unwrap();
        assert!(!done.is_active);
        assert!(done.summary.is_some());
        assert!(store.open_trade(run.id).unwrap().is_none());
        assert!(store.active_runs().unwrap().is_empty());
        assert!(matches!(
            store.commit_candle(
                run.id,
                CandleCommit {
                    candle_ts: 900_000,
                    close: None,
                    open: None
                },
                t0()
            ),
            Err(StoreError::Inactive { .. })
        ));
    }
}
