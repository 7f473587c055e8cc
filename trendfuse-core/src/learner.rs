//! Weight learner: counts how often each scoring feature fired and how often
//! the price was at or above the entry a fixed horizon later.
//!
//! This is a frequency/win-rate counter, not a model. Its output is advisory:
//! [`apply_bonus`] can only add points to a baseline result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detect::VolumeThresholds;
use crate::domain::{BarDirection, SignalKind, TrendState};
use crate::fusion::{FusionComponent, FusionResult, Grade, GradeThresholds};
use crate::indicators::IndicatorFrame;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub warmup_bars: usize,
    pub horizon_bars: usize,
    /// Features with this many hits or fewer have zero effectiveness.
    pub min_hits: usize,
    pub baseline_win_rate: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            warmup_bars: 250,
            horizon_bars: 12,
            min_hits: 20,
            baseline_win_rate: 0.5,
        }
    }
}

/// Boolean feature flags mirroring the fusion inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TrendUp,
    TrendDown,
    #[serde(rename = "confirm_5m")]
    Confirm5m,
    EmaCrossUp,
    EmaCrossDown,
    BosUp,
    BosDown,
    IgnitionUp,
    IgnitionDown,
    Climax,
    Accumulation,
    Distribution,
}

impl Feature {
    pub const ALL: [Feature; 12] = [
        Feature::TrendUp,
        Feature::TrendDown,
        Feature::Confirm5m,
        Feature::EmaCrossUp,
        Feature::EmaCrossDown,
        Feature::BosUp,
        Feature::BosDown,
        Feature::IgnitionUp,
        Feature::IgnitionDown,
        Feature::Climax,
        Feature::Accumulation,
        Feature::Distribution,
    ];

    /// Flags raised by a snapshot.
    pub fn flags(snapshot: &Snapshot) -> Vec<Feature> {
        let mut out = Vec::new();
        match snapshot.summary.trend_15m {
            TrendState::Uptrend => out.push(Feature::TrendUp),
            TrendState::Downtrend => out.push(Feature::TrendDown),
            _ => {}
        }
        if snapshot.summary.trend_5m.is_directional() {
            out.push(Feature::Confirm5m);
        }
        for s in snapshot.trend_signals.iter().chain(&snapshot.volume_signals) {
            let f = match (s.kind, s.direction) {
                (SignalKind::EmaCrossUp, _) => Feature::EmaCrossUp,
                (SignalKind::EmaCrossDown, _) => Feature::EmaCrossDown,
                (SignalKind::BosUp, _) => Feature::BosUp,
                (SignalKind::BosDown, _) => Feature::BosDown,
                (SignalKind::Ignition, Some(BarDirection::Up)) => Feature::IgnitionUp,
                (SignalKind::Ignition, Some(BarDirection::Down)) => Feature::IgnitionDown,
                (SignalKind::Climax, _) => Feature::Climax,
                (SignalKind::Accumulation, _) => Feature::Accumulation,
                (SignalKind::Distribution, _) => Feature::Distribution,
                _ => continue,
            };
            // several crosses on one bar still count as one hit
            if !out.contains(&f) {
                out.push(f);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub hits: usize,
    pub wins: usize,
}

impl FeatureStats {
    /// Win rate minus the baseline, or 0 when the feature is too rare.
    pub fn effectiveness(&self, cfg: &LearnerConfig) -> f64 {
        if self.hits <= cfg.min_hits {
            return 0.0;
        }
        self.wins as f64 / self.hits as f64 - cfg.baseline_win_rate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRank {
    pub feature: Feature,
    pub effectiveness: f64,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedWeights {
    pub weights: BTreeMap<FusionComponent, f64>,
    /// Sorted by effectiveness, best first.
    pub ranking: Vec<FeatureRank>,
    /// Total feature hits over the evaluated bars.
    pub samples: usize,
    pub horizon_bars: usize,
}

impl LearnedWeights {
    pub fn weight(&self, component: FusionComponent) -> f64 {
        self.weights.get(&component).copied().unwrap_or(0.0)
    }
}

/// Run the effectiveness pass over a fast series with the slow series aligned.
///
/// Bars inside the warm-up or the trailing horizon are skipped. A bar with no
/// closed slow bar yet is skipped too: none of its features, fast-timeframe
/// ones included, are counted.
pub fn learn(
    fast: &IndicatorFrame,
    slow: &IndicatorFrame,
    thresholds: &VolumeThresholds,
    cfg: &LearnerConfig,
) -> LearnedWeights {
    let mut stats: BTreeMap<Feature, FeatureStats> =
        Feature::ALL.iter().map(|&f| (f, FeatureStats::default())).collect();

    let end = fast.len().saturating_sub(cfg.horizon_bars);
    for i in cfg.warmup_bars..end {
        let Some(snapshot) = Snapshot::at(fast, slow, i, thresholds) else {
            continue;
        };
        let entry = fast.candle(i).close;
        let later = fast.candle(i + cfg.horizon_bars).close;
        let win = later >= entry;
        for f in Feature::flags(&snapshot) {
            let s = stats.entry(f).or_default();
            s.hits += 1;
            if win {
                s.wins += 1;
            }
        }
    }

    summarize(&stats, cfg)
}

/// Turn per-feature counts into component weights and a ranking.
pub fn summarize(stats: &BTreeMap<Feature, FeatureStats>, cfg: &LearnerConfig) -> LearnedWeights {
    let effectiveness: BTreeMap<Feature, f64> = Feature::ALL
        .iter()
        .map(|&f| (f, stats.get(&f).map_or(0.0, |s| s.effectiveness(cfg))))
        .collect();

    let max_abs = effectiveness.values().fold(0.0_f64, |m, v| m.max(v.abs()));
    let max_abs = if max_abs > 0.0 { max_abs } else { 1.0 };
    let norm = |f: Feature| round_to(effectiveness[&f] / max_abs, 3);

    let scaled = [
        (FusionComponent::TrendBase, norm(Feature::TrendUp).max(norm(Feature::TrendDown)) * 30.0),
        (FusionComponent::Confirm5m, norm(Feature::Confirm5m) * 15.0),
        (
            FusionComponent::EmaCross,
            norm(Feature::EmaCrossUp).max(norm(Feature::EmaCrossDown)) * 20.0,
        ),
        (FusionComponent::Bos, norm(Feature::BosUp).max(norm(Feature::BosDown)) * 15.0),
        (
            FusionComponent::Ignition,
            norm(Feature::IgnitionUp).max(norm(Feature::IgnitionDown)) * 12.0,
        ),
        (FusionComponent::Climax, norm(Feature::Climax) * 6.0),
        (FusionComponent::Accumulation, norm(Feature::Accumulation) * 10.0),
        (FusionComponent::Distribution, norm(Feature::Distribution) * 10.0),
    ];
    let weights = scaled
        .into_iter()
        .map(|(c, w)| (c, round_to(w.clamp(0.0, 100.0), 1)))
        .collect();

    let mut ranking: Vec<FeatureRank> = Feature::ALL
        .iter()
        .map(|&f| FeatureRank {
            feature: f,
            effectiveness: round_to(effectiveness[&f], 3),
            hits: stats.get(&f).map_or(0, |s| s.hits),
        })
        .collect();
    ranking.sort_by(|a, b| b.effectiveness.total_cmp(&a.effectiveness));

    LearnedWeights {
        weights,
        ranking,
        samples: stats.values().map(|s| s.hits).sum(),
        horizon_bars: cfg.horizon_bars,
    }
}

/// Add the learned weight of every component that contributed positive
/// points, then re-clamp and re-grade. Never lowers the score.
pub fn apply_bonus(base: &FusionResult, learned: &LearnedWeights, grades: &GradeThresholds) -> FusionResult {
    let mut seen: Vec<FusionComponent> = Vec::new();
    for c in &base.contributions {
        if c.points > 0 && !seen.contains(&c.component) {
            seen.push(c.component);
        }
    }
    let bonus: f64 = seen.iter().map(|&c| learned.weight(c).max(0.0)).sum();

    let mut out = base.clone();
    out.score = (base.score + bonus.round() as i64).clamp(0, 100);
    out.grade = Grade::from_score(out.score, grades);
    out
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let m = 10f64.powi(decimals);
    (v * m).round() / m
}
