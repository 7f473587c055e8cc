//! Forward-test stepper: replays newly closed 5m candles through the live
//! action and the stop/target bracket, committing one candle at a time.
//!
//! Steps are serialized per run id; different runs step concurrently.
//! Re-running a step with no new closed candles changes nothing (apart from
//! finalizing an expired run).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use trendfuse_core::domain::{Candle, ExitReason, RunId, Timeframe, Trade};
use trendfuse_core::engine::Bracket;
use trendfuse_core::{Action, SignalEngine};

use super::run::{CandleCommit, ForwardTestRun, NewRun, NewTrade, TradeExit};
use super::store::{RunStore, StoreError};
use crate::config::AppConfig;
use crate::data::{CandleSource, DataError, MarketData};
use crate::metrics::TradeStats;
use crate::runner::learn_data;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("symbol '{0}' is not supported by the data source")]
    UnsupportedSymbol(String),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("candle timestamp {0} is out of range")]
    Timestamp(i64),
}

/// What one `step` did to a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub candles: usize,
    pub opened: usize,
    pub closed: usize,
    pub finalized: bool,
}

pub struct Stepper {
    source: Arc<dyn CandleSource>,
    store: Arc<dyn RunStore>,
    config: AppConfig,
    locks: Mutex<HashMap<RunId, Arc<Mutex<()>>>>,
}

fn to_datetime(ms: i64) -> Result<DateTime<Utc>, StepError> {
    DateTime::from_timestamp_millis(ms).ok_or(StepError::Timestamp(ms))
}

/// Intrabar bracket exit first, then an opposing action at the close.
fn exit_for(trade: &Trade, candle: &Candle, action: Action) -> Option<(f64, ExitReason)> {
    trade.bracket().check_bar(candle.high, candle.low).or_else(|| {
        (action.side() == Some(trade.direction.opposite())).then_some((candle.close, ExitReason::SignalFlip))
    })
}

impl Stepper {
    pub fn new(source: Arc<dyn CandleSource>, store: Arc<dyn RunStore>, config: AppConfig) -> Self {
        Self {
            source,
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn run_lock(&self, run_id: RunId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(run_id).or_default().clone()
    }

    /// Drop the lock entry of a run that will not be stepped again.
    fn release_lock(&self, run_id: RunId) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&run_id);
    }

    /// Create an active run ending `session_days` after `now`.
    pub fn start_run(&self, symbol: &str, now: DateTime<Utc>) -> Result<ForwardTestRun, StepError> {
        if !self.source.symbol_supported(symbol)? {
            return Err(StepError::UnsupportedSymbol(symbol.to_string()));
        }
        let run = self.store.create_run(NewRun {
            symbol: symbol.to_string(),
            start_time: now,
            end_time: now + Duration::days(self.config.forward_test.session_days),
        })?;
        tracing::info!(run_id = %run.id, symbol, end_time = %run.end_time, "started forward test");
        Ok(run)
    }

    fn engine_for(&self, data: &MarketData, first_new: usize) -> SignalEngine {
        let mut engine_cfg = self.config.engine.clone();
        engine_cfg.bracket = self.config.forward_test.bracket.clone();
        let engine = SignalEngine::new(engine_cfg);
        if !self.config.forward_test.learner_bonus {
            return engine;
        }
        // learn only from history before the first candle being replayed
        let cutoff = data.fast[first_new].t;
        let history = MarketData {
            symbol: data.symbol.clone(),
            fast: data.fast[..first_new].to_vec(),
            slow: data
                .slow
                .iter()
                .filter(|c| c.close_time(Timeframe::M15) <= cutoff)
                .copied()
                .collect(),
        };
        engine.with_learned(learn_data(&history, &self.config))
    }

    /// Process every 5m candle closed by `now` and newer than the run's cursor.
    pub fn step(&self, run_id: RunId, now: DateTime<Utc>) -> Result<StepOutcome, StepError> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let run = self.store.get_run(run_id)?;
        let mut outcome = StepOutcome::default();
        if !run.is_active {
            self.release_lock(run_id);
            return Ok(outcome);
        }

        let limit = self.config.forward_test.fetch_limit;
        let data = MarketData::load(self.source.as_ref(), &run.symbol, limit, limit, now.timestamp_millis())?;
        let last_ts = run.last_candle_ts.unwrap_or(i64::MIN);
        let first_new = data.fast.partition_point(|c| c.t <= last_ts);

        if first_new < data.fast.len() {
            let engine = self.engine_for(&data, first_new);
            let mut open = self.store.open_trade(run_id)?;

            for i in first_new..data.fast.len() {
                let candle = data.fast[i];
                let action = engine.action_at(&data.fast, &data.slow, i);
                let candle_time = to_datetime(candle.t)?;
                let close_time = to_datetime(candle.close_time(Timeframe::M5))?;

                let close = open.as_ref().and_then(|trade| {
                    exit_for(trade, &candle, action).map(|(exit_price, reason)| TradeExit {
                        trade_id: trade.id,
                        exit_price,
                        reason,
                        exit_time: close_time,
                    })
                });
                let flat = open.is_none() || close.is_some();
                let entry = action.side().filter(|_| flat).map(|side| {
                    let b = Bracket::from_entry(side, candle.close, &self.config.forward_test.bracket);
                    NewTrade {
                        direction: side,
                        entry_price: b.entry,
                        stop_loss: b.stop,
                        take_profit: b.target,
                        candle_time,
                    }
                });

                if let Some(exit) = &close {
                    tracing::info!(run_id = %run_id, reason = %exit.reason, price = exit.exit_price, "closed trade");
                    outcome.closed += 1;
                }
                if let Some(new) = &entry {
                    tracing::info!(run_id = %run_id, side = %new.direction, price = new.entry_price, "opened trade");
                    outcome.opened += 1;
                }
                let changed = close.is_some() || entry.is_some();
                self.store.commit_candle(
                    run_id,
                    CandleCommit {
                        candle_ts: candle.t,
                        close,
                        open: entry,
                    },
                    now,
                )?;
                outcome.candles += 1;
                if changed {
                    open = self.store.open_trade(run_id)?;
                }
            }
        }

        if run.is_expired(now) {
            self.finalize(&run, data.fast.last(), now)?;
            self.release_lock(run_id);
            outcome.finalized = true;
        }
        tracing::debug!(run_id = %run_id, candles = outcome.candles, "stepped forward test");
        Ok(outcome)
    }

    /// Close any open trade at the latest closed candle, then summarize.
    fn finalize(&self, run: &ForwardTestRun, last: Option<&Candle>, now: DateTime<Utc>) -> Result<(), StepError> {
        let mut trades = self.store.trades_for_run(run.id)?;
        let mut exit = None;
        if let Some(trade) = trades.iter_mut().find(|t| t.is_open()) {
            let (price, at) = match last {
                Some(c) => (c.close, to_datetime(c.close_time(Timeframe::M5))?),
                None => (trade.entry_price, now),
            };
            trade.close(price, ExitReason::SessionEnd, at);
            exit = Some(TradeExit {
                trade_id: trade.id,
                exit_price: price,
                reason: ExitReason::SessionEnd,
                exit_time: at,
            });
        }
        let summary = TradeStats::from_forward(&trades);
        tracing::info!(
            run_id = %run.id,
            trades = summary.trades,
            pl_pct = summary.pl_pct,
            "finalized forward test"
        );
        self.store.finalize_run(run.id, exit, summary)?;
        Ok(())
    }
}
