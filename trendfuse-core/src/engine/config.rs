//! Engine configuration shared by the backtest, the learner and live signals.

use serde::{Deserialize, Serialize};

use super::bracket::BracketConfig;
use super::position::ExitRules;
use crate::detect::VolumeThresholds;
use crate::fusion::{FusionWeights, Grade};
use crate::indicators::IndicatorSettings;
use crate::learner::LearnerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub indicators: IndicatorSettings,
    pub volume: VolumeThresholds,
    pub fusion: FusionWeights,
    pub learner: LearnerConfig,
    pub exits: ExitRules,
    pub bracket: BracketConfig,
    /// No scoring or entries before this many fast bars.
    pub warmup_bars: usize,
    /// Lowest grade that opens (and keeps) a position.
    pub min_entry_grade: Grade,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorSettings::default(),
            volume: VolumeThresholds::default(),
            fusion: FusionWeights::default(),
            learner: LearnerConfig::default(),
            exits: ExitRules::default(),
            bracket: BracketConfig::default(),
            warmup_bars: 250,
            min_entry_grade: Grade::B,
        }
    }
}
