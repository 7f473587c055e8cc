//! Position simulation shared by the backtest and the forward-test stepper.
//!
//! - `position`: backtest position with close-based exits
//! - `bracket`: stop/target bracket with intrabar exits (forward test)
//! - `backtest`: the bar loop, equity curve and gross P/L
//! - `config`: engine-wide settings

pub mod backtest;
pub mod bracket;
pub mod config;
pub mod position;

pub use backtest::{simulate, SimulationOutcome};
pub use bracket::{Bracket, BracketConfig};
pub use config::EngineConfig;
pub use position::{ExitRules, Position};
