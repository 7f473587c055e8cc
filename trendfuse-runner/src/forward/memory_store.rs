//! In-memory run store for tests and one-shot sessions.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use trendfuse_core::domain::{RunId, Trade};

use super::run::{CandleCommit, ForwardTestRun, NewRun, TradeExit};
use super::store::{RunStore, StoreError, StoreState};
use crate::metrics::TradeStats;

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `f` to a copy of the state and keep it only on success.
    fn transact<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let out = f(&mut next)?;
        *state = next;
        Ok(out)
    }
}

impl RunStore for MemoryStore {
    fn create_run(&self, new: NewRun) -> Result<ForwardTestRun, StoreError> {
        Ok(self.lock().create_run(new))
    }

    fn get_run(&self, id: RunId) -> Result<ForwardTestRun, StoreError> {
        self.lock().get_run(id)
    }

    fn active_runs(&self) -> Result<Vec<ForwardTestRun>, StoreError> {
        Ok(self.lock().active_runs())
    }

    fn open_trade(&self, run_id: RunId) -> Result<Option<Trade>, StoreError> {
        self.lock().open_trade(run_id)
    }

    fn trades_for_run(&self, run_id: RunId) -> Result<Vec<Trade>, StoreError> {
        self.lock().trades_for_run(run_id)
    }

    fn commit_candle(&self, run_id: RunId, commit: CandleCommit, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.transact(|s| s.commit_candle(run_id, commit, now))
    }

    fn finalize_run(
        &self,
        run_id: RunId,
        exit: Option<TradeExit>,
        summary: TradeStats,
    ) -> Result<ForwardTestRun, StoreError> {
        self.transact(|s| s.finalize_run(run_id, exit, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::store::contract;

    #[test]
    fn creates_and_lists_runs() {
        contract::creates_and_lists_runs(&MemoryStore::new());
    }

    #[test]
    fn rejects_stale_candles() {
        contract::rejects_stale_candles(&MemoryStore::new());
    }

    #[test]
    fn one_open_trade_per_run() {
        contract::one_open_trade_per_run(&MemoryStore::new());
    }

    #[test]
    fn close_then_reopen_and_finalize() {
        contract::close_then_reopen_and_finalize(&MemoryStore::new());
    }
}
