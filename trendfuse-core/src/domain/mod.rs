//! Domain types for TrendFuse

pub mod candle;
pub mod ids;
pub mod signal;
pub mod trade;
pub mod trend;

pub use candle::{normalize_series, resample, validate_series, Candle, CandleError, Timeframe};
pub use ids::{RunId, TradeId};
pub use signal::{BarDirection, Signal, SignalKind};
pub use trade::{ClosedTrade, ExitReason, Side, Trade};
pub use trend::{TrendState, TrendSummary};

/// Symbol type alias, e.g. `"BTC/USD"`.
pub type Symbol = String;
