//! Read-side views of a forward-test run.

use serde::{Deserialize, Serialize};
use trendfuse_core::domain::{RunId, Trade};

use super::run::ForwardTestRun;
use super::store::{RunStore, StoreError};

/// Closed trades listed in a status view.
pub const RECENT_CLOSED_TRADES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardTestStatus {
    pub run: ForwardTestRun,
    pub open_trades: Vec<Trade>,
    /// Newest first.
    pub recent_trades: Vec<Trade>,
}

pub fn run_status(store: &dyn RunStore, run_id: RunId) -> Result<ForwardTestStatus, StoreError> {
    let run = store.get_run(run_id)?;
    let trades = store.trades_for_run(run_id)?;
    let (open, closed): (Vec<Trade>, Vec<Trade>) = trades.into_iter().partition(|t| t.is_open());
    Ok(ForwardTestStatus {
        run,
        open_trades: open.into_iter().rev().collect(),
        recent_trades: closed.into_iter().rev().take(RECENT_CLOSED_TRADES).collect(),
    })
}
