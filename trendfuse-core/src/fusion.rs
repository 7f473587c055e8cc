//! Fusion scorer: trend summary + recent events → score, grade, direction,
//! confidence and reasoning.
//!
//! Pure and deterministic. Every fired rule is recorded as a [`Contribution`]
//! so callers can explain the score and the learner can add bonus points per
//! component.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::buffer::{SignalBuffer, RECENT_SIGNALS};
use crate::domain::{BarDirection, Side, Signal, SignalKind, TrendState, TrendSummary};

/// Setup quality bucket, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "none")]
    Ungraded,
    C,
    B,
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    /// Step function of the score; monotone in `score`.
    pub fn from_score(score: i64, th: &GradeThresholds) -> Self {
        if score >= th.a_plus {
            Grade::APlus
        } else if score >= th.a {
            Grade::A
        } else if score >= th.b {
            Grade::B
        } else if score >= th.c {
            Grade::C
        } else {
            Grade::Ungraded
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Ungraded => "none",
            Grade::C => "C",
            Grade::B => "B",
            Grade::A => "A",
            Grade::APlus => "A+",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade direction implied by the overall trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
    #[serde(rename = "none")]
    Neutral,
}

impl Direction {
    pub fn from_trend(trend: TrendState) -> Self {
        match trend {
            TrendState::Uptrend => Direction::Long,
            TrendState::Downtrend => Direction::Short,
            TrendState::Sideways | TrendState::Unknown => Direction::Neutral,
        }
    }

    pub fn is_resolved(self) -> bool {
        self != Direction::Neutral
    }

    pub fn side(self) -> Option<Side> {
        match self {
            Direction::Long => Some(Side::Long),
            Direction::Short => Some(Side::Short),
            Direction::Neutral => None,
        }
    }

    /// Whether `other` points the opposite way. Neutral opposes nothing.
    pub fn opposes(self, other: Direction) -> bool {
        matches!(
            (self, other),
            (Direction::Long, Direction::Short) | (Direction::Short, Direction::Long)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
            Direction::Neutral => "none",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring rule family; also the unit the learner assigns weights to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionComponent {
    TrendBase,
    #[serde(rename = "confirm_5m")]
    Confirm5m,
    EmaCross,
    Bos,
    Ignition,
    Climax,
    Accumulation,
    Distribution,
}

impl FusionComponent {
    pub const ALL: [FusionComponent; 8] = [
        FusionComponent::TrendBase,
        FusionComponent::Confirm5m,
        FusionComponent::EmaCross,
        FusionComponent::Bos,
        FusionComponent::Ignition,
        FusionComponent::Climax,
        FusionComponent::Accumulation,
        FusionComponent::Distribution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FusionComponent::TrendBase => "trend_base",
            FusionComponent::Confirm5m => "confirm_5m",
            FusionComponent::EmaCross => "ema_cross",
            FusionComponent::Bos => "bos",
            FusionComponent::Ignition => "ignition",
            FusionComponent::Climax => "climax",
            FusionComponent::Accumulation => "accumulation",
            FusionComponent::Distribution => "distribution",
        }
    }
}

/// One fired rule and the points it added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub component: FusionComponent,
    pub points: i64,
    pub label: String,
}

impl Contribution {
    fn new(component: FusionComponent, points: i64, what: impl fmt::Display) -> Self {
        Self {
            component,
            points,
            label: format!("{what} ({})", fmt_points(points)),
        }
    }
}

fn fmt_points(points: i64) -> String {
    if points == 0 {
        "0".to_string()
    } else {
        format!("{points:+}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub a_plus: i64,
    pub a: i64,
    pub b: i64,
    pub c: i64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a_plus: 80,
            a: 65,
            b: 50,
            c: 35,
        }
    }
}

/// Rule points. "agree" applies when the event matches the chosen direction,
/// "contra" otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub trend_base: i64,
    pub confirm_5m: i64,
    pub ema_cross_agree: i64,
    pub ema_cross_contra: i64,
    pub bos_agree: i64,
    pub bos_contra: i64,
    pub ignition_agree: i64,
    pub ignition_contra: i64,
    pub climax: i64,
    pub flow_agree: i64,
    pub flow_contra: i64,
    pub confidence_base: i64,
    pub confidence_direction: i64,
    pub confidence_trend_events: i64,
    pub confidence_volume_events: i64,
    pub recent_signals: usize,
    pub max_reasoning: usize,
    pub grades: GradeThresholds,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            trend_base: 30,
            confirm_5m: 15,
            ema_cross_agree: 20,
            ema_cross_contra: -10,
            bos_agree: 15,
            bos_contra: -5,
            ignition_agree: 12,
            ignition_contra: -5,
            climax: 6,
            flow_agree: 10,
            flow_contra: 3,
            confidence_base: 40,
            confidence_direction: 20,
            confidence_trend_events: 15,
            confidence_volume_events: 15,
            recent_signals: RECENT_SIGNALS,
            max_reasoning: 8,
            grades: GradeThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub score: i64,
    pub grade: Grade,
    pub direction: Direction,
    pub confidence: i64,
    pub reasoning: Vec<String>,
    pub contributions: Vec<Contribution>,
}

impl FusionResult {
    /// Result used when there is nothing to score (e.g. no aligned slow bar).
    pub fn empty() -> Self {
        Self {
            score: 0,
            grade: Grade::Ungraded,
            direction: Direction::Neutral,
            confidence: 0,
            reasoning: Vec::new(),
            contributions: Vec::new(),
        }
    }

    /// Grade at or above `min_grade` with a resolved direction.
    pub fn is_tradable(&self, min_grade: Grade) -> bool {
        self.grade >= min_grade && self.direction.is_resolved()
    }
}

/// Score a setup. Signal lists must be ordered oldest first; only the last
/// `weights.recent_signals` of each are considered.
pub fn fuse(
    summary: &TrendSummary,
    trend_signals: &[Signal],
    volume_signals: &[Signal],
    weights: &FusionWeights,
) -> FusionResult {
    let mut contributions = Vec::new();

    let direction = Direction::from_trend(summary.trend);
    if direction.is_resolved() {
        contributions.push(Contribution::new(
            FusionComponent::TrendBase,
            weights.trend_base,
            format_args!("EMA alignment {}", summary.trend),
        ));
    } else {
        contributions.push(Contribution::new(
            FusionComponent::TrendBase,
            0,
            "No clear trend",
        ));
    }

    let fast_dir = Direction::from_trend(summary.trend_5m);
    if direction.is_resolved() && fast_dir == direction {
        contributions.push(Contribution::new(
            FusionComponent::Confirm5m,
            weights.confirm_5m,
            format_args!("5m alignment confirms {direction}"),
        ));
    }

    let recent_trend = SignalBuffer::from_tail(trend_signals, weights.recent_signals);
    let recent_volume = SignalBuffer::from_tail(volume_signals, weights.recent_signals);

    for s in recent_trend.iter() {
        let agree = |d: Direction| direction == d;
        let (component, points, what) = match s.kind {
            SignalKind::EmaCrossUp => (
                FusionComponent::EmaCross,
                pick(agree(Direction::Long), weights.ema_cross_agree, weights.ema_cross_contra),
                "EMA cross up",
            ),
            SignalKind::EmaCrossDown => (
                FusionComponent::EmaCross,
                pick(agree(Direction::Short), weights.ema_cross_agree, weights.ema_cross_contra),
                "EMA cross down",
            ),
            SignalKind::BosUp => (
                FusionComponent::Bos,
                pick(agree(Direction::Long), weights.bos_agree, weights.bos_contra),
                "BOS up",
            ),
            SignalKind::BosDown => (
                FusionComponent::Bos,
                pick(agree(Direction::Short), weights.bos_agree, weights.bos_contra),
                "BOS down",
            ),
            _ => continue,
        };
        contributions.push(Contribution::new(
            component,
            points,
            format_args!("{what} ({})", s.timeframe),
        ));
    }

    for s in recent_volume.iter() {
        let c = match s.kind {
            SignalKind::Ignition => {
                let agreeing = matches!(
                    (direction, s.direction),
                    (Direction::Long, Some(BarDirection::Up))
                        | (Direction::Short, Some(BarDirection::Down))
                );
                if agreeing {
                    let side = if direction == Direction::Long { "up" } else { "down" };
                    Contribution::new(
                        FusionComponent::Ignition,
                        weights.ignition_agree,
                        format_args!("Ignition {side} ({})", s.timeframe),
                    )
                } else {
                    Contribution::new(
                        FusionComponent::Ignition,
                        weights.ignition_contra,
                        format_args!("Ignition contra-trend ({})", s.timeframe),
                    )
                }
            }
            SignalKind::Climax => Contribution::new(
                FusionComponent::Climax,
                weights.climax,
                format_args!("Climax volume ({})", s.timeframe),
            ),
            SignalKind::Accumulation => Contribution::new(
                FusionComponent::Accumulation,
                pick(direction == Direction::Long, weights.flow_agree, weights.flow_contra),
                format_args!("Accumulation ({})", s.timeframe),
            ),
            SignalKind::Distribution => Contribution::new(
                FusionComponent::Distribution,
                pick(direction == Direction::Short, weights.flow_agree, weights.flow_contra),
                format_args!("Distribution ({})", s.timeframe),
            ),
            _ => continue,
        };
        contributions.push(c);
    }

    let raw: i64 = contributions.iter().map(|c| c.points).sum();
    let score = raw.clamp(0, 100);
    let grade = Grade::from_score(score, &weights.grades);

    let mut confidence = weights.confidence_base;
    if direction.is_resolved() {
        confidence += weights.confidence_direction;
    }
    if !recent_trend.is_empty() {
        confidence += weights.confidence_trend_events;
    }
    if !recent_volume.is_empty() {
        confidence += weights.confidence_volume_events;
    }

    let reasoning = contributions
        .iter()
        .take(weights.max_reasoning)
        .map(|c| c.label.clone())
        .collect();

    FusionResult {
        score,
        grade,
        direction,
        confidence: confidence.clamp(0, 100),
        reasoning,
        contributions,
    }
}

fn pick(agree: bool, agree_pts: i64, contra_pts: i64) -> i64 {
    if agree {
        agree_pts
    } else {
        contra_pts
    }
}
