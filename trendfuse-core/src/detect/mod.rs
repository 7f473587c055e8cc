//! Event detectors over precomputed indicator frames.
//!
//! - `trend`: EMA alignment, EMA crosses, breaks of structure
//! - `volume`: climax, ignition, accumulation/distribution
//!
//! Each detector has a per-bar form (used by the local snapshot) and a
//! full-series form (used by on-demand analysis).

pub mod trend;
pub mod volume;

pub use trend::{trend_events_at, TrendDetection};
pub use volume::{volume_events_at, VolumeThresholds};
