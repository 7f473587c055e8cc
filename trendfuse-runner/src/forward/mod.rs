//! Forward testing: runs persisted through a `RunStore`, stepped candle by
//! candle as new 5m bars close.

pub mod export;
pub mod json_store;
pub mod memory_store;
pub mod run;
pub mod status;
pub mod stepper;
pub mod store;
pub mod worker;

pub use export::{trades_csv, write_trades_csv, ExportError};
pub use json_store::JsonStore;
pub use memory_store::MemoryStore;
pub use run::{CandleCommit, ForwardTestRun, NewRun, NewTrade, TradeExit};
pub use status::{run_status, ForwardTestStatus};
pub use stepper::{StepError, StepOutcome, Stepper};
pub use store::{RunStore, StoreError};
pub use worker::{spawn as spawn_worker, tick, TickReport, WorkerHandle};
