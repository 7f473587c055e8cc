//! TrendFuse Core: candles, indicators, detectors, fusion scoring, weight learner
//! and the position state machine.
//!
//! This crate is pure computation with no I/O:
//! - Domain types (candles, signals, trend summary, trades)
//! - Causal indicator frames (EMA, relative volume, body %, swing levels)
//! - Trend and volume event detectors
//! - Fusion scorer over a bounded buffer of recent signals
//! - Offline weight-effectiveness learner
//! - Backtest loop and the bracket used by the forward-test stepper

pub mod buffer;
pub mod detect;
pub mod domain;
pub mod engine;
pub mod fusion;
pub mod indicators;
pub mod learner;
pub mod live;
pub mod snapshot;

pub use fusion::{fuse, Direction, FusionResult, FusionWeights, Grade};
pub use live::{analyze, Action, Analysis, LiveSignal, SignalEngine, SignalError, TradePlan};
