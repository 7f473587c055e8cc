//! Volume detector: climax and ignition bars, accumulation/distribution windows.

use serde::{Deserialize, Serialize};

use crate::domain::{Signal, SignalKind};
use crate::indicators::IndicatorFrame;

/// Volume event thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeThresholds {
    pub climax_rv: f64,
    pub ignition_rv: f64,
    pub ignition_body_pct: f64,
    /// Bars at or above this rv count as active in the flow window.
    pub active_rv: f64,
    /// Trailing window, current bar included.
    pub flow_window: usize,
    pub min_active: usize,
    /// Most recent climax / ignition events kept by full-series detection.
    pub event_tail: usize,
}

impl Default for VolumeThresholds {
    fn default() -> Self {
        Self {
            climax_rv: 3.0,
            ignition_rv: 2.0,
            ignition_body_pct: 0.6,
            active_rv: 1.5,
            flow_window: 50,
            min_active: 5,
            event_tail: 30,
        }
    }
}

/// Climax and ignition events at bar `i`.
pub fn bar_events(frame: &IndicatorFrame, i: usize, th: &VolumeThresholds) -> Vec<Signal> {
    let mut out = Vec::new();
    if i >= frame.len() {
        return out;
    }
    let row = frame.row(i);
    if row.rv >= th.climax_rv {
        out.push(
            Signal::new(SignalKind::Climax, frame.timeframe(), row.candle.t)
                .with_rv(row.rv)
                .with_direction(row.dir),
        );
    }
    if row.rv >= th.ignition_rv && row.body_pct >= th.ignition_body_pct {
        out.push(
            Signal::new(SignalKind::Ignition, frame.timeframe(), row.candle.t)
                .with_rv(row.rv)
                .with_direction(row.dir),
        );
    }
    out
}

/// Accumulation or distribution verdict over the window ending at bar `i`.
///
/// Needs at least `min_active` active bars; a zero net count emits nothing.
pub fn flow_verdict(frame: &IndicatorFrame, i: usize, th: &VolumeThresholds) -> Option<Signal> {
    if i >= frame.len() {
        return None;
    }
    let start = (i + 1).saturating_sub(th.flow_window);
    let mut active = 0usize;
    let mut net = 0i64;
    for j in start..=i {
        if frame.rv_at(j) >= th.active_rv {
            let row = frame.row(j);
            active += 1;
            net += row.dir.sign();
        }
    }
    if active < th.min_active || net == 0 {
        return None;
    }
    let kind = if net > 0 {
        SignalKind::Accumulation
    } else {
        SignalKind::Distribution
    };
    Some(Signal::new(kind, frame.timeframe(), frame.candle(i).t).with_tally(active, net))
}

/// Volume events local to bar `i`: its own climax/ignition plus the window verdict.
pub fn volume_events_at(frame: &IndicatorFrame, i: usize, th: &VolumeThresholds) -> Vec<Signal> {
    let mut out = bar_events(frame, i, th);
    out.extend(flow_verdict(frame, i, th));
    out
}

/// Full-series detection: the most recent climax events, the most recent
/// ignition events, then the verdict at the latest bar.
pub fn detect(frame: &IndicatorFrame, th: &VolumeThresholds) -> Vec<Signal> {
    let mut climax = Vec::new();
    let mut ignition = Vec::new();
    for i in 0..frame.len() {
        for s in bar_events(frame, i, th) {
            match s.kind {
                SignalKind::Climax => climax.push(s),
                _ => ignition.push(s),
            }
        }
    }

    let mut out = tail(climax, th.event_tail);
    out.extend(tail(ignition, th.event_tail));
    if let Some(last) = frame.len().checked_sub(1) {
        out.extend(flow_verdict(frame, last, th));
    }
    out
}

fn tail(mut v: Vec<Signal>, n: usize) -> Vec<Signal> {
    let skip = v.len().saturating_sub(n);
    v.drain(..skip);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarDirection, Candle, Timeframe};
    use crate::indicators::IndicatorSettings;

    /// Flat 1000-volume series with wide-bodied up candles.
    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle {
                    t: i as i64 * 300_000,
                    open: close - 1.0,
                    high: close + 0.2,
                    low: close - 1.2,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    fn frame(c: &[Candle]) -> IndicatorFrame {
        IndicatorFrame::compute(c, Timeframe::M5, &IndicatorSettings::default())
    }

    #[test]
    fn quiet_volume_emits_nothing() {
        let f = frame(&candles(80));
        assert!(detect(&f, &VolumeThresholds::default()).is_empty());
    }

    #[test]
    fn spike_is_climax_and_ignition() {
        let mut c = candles(40);
        c[30].volume = 10_000.0;
        let f = frame(&c);
        let events = bar_events(&f, 30, &VolumeThresholds::default());
        let kinds: Vec<SignalKind> = events.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SignalKind::Climax, SignalKind::Ignition]);
        assert_eq!(events[1].direction, Some(BarDirection::Up));
        assert!(events[0].rv.unwrap() >= 3.0);
    }

    #[test]
    fn small_body_spike_is_not_ignition() {
        let mut c = candles(40);
        c[30].volume = 2500.0;
        c[30].open = c[30].close - 0.1;
        let f = frame(&c);
        let events = bar_events(&f, 30, &VolumeThresholds::default());
        assert!(events.iter().all(|s| s.kind != SignalKind::Ignition));
    }

    #[test]
    fn undefined_rv_never_fires() {
        let mut c = candles(30);
        c[5].volume = 1_000_000.0;
        let f = frame(&c);
        assert!(bar_events(&f, 5, &VolumeThresholds::default()).is_empty());
    }

    #[test]
    fn five_active_up_bars_is_accumulation() {
        let mut c = candles(100);
        for i in (55..100).step_by(10) {
            c[i].volume = 4000.0;
        }
        let f = frame(&c);
        let verdict = flow_verdict(&f, 99, &VolumeThresholds::default()).unwrap();
        assert_eq!(verdict.kind, SignalKind::Accumulation);
        assert_eq!(verdict.count, Some(5));
        assert_eq!(verdict.score, Some(5));
    }

    #[test]
    fn four_active_bars_is_not_enough() {
        let mut c = candles(100);
        for i in (65..100).step_by(10) {
            c[i].volume = 4000.0;
        }
        let f = frame(&c);
        assert!(flow_verdict(&f, 99, &VolumeThresholds::default()).is_none());
    }

    #[test]
    fn down_closes_are_distribution_and_ties_are_silent() {
        let mut c = candles(100);
        for (k, i) in (55..100).step_by(10).enumerate() {
            c[i].volume = 4000.0;
            // flip to a down candle
            let (o, cl) = (c[i].open, c[i].close);
            c[i].open = cl;
            c[i].close = o;
            if k == 0 {
                c[i].close = c[i].open;
            }
        }
        let f = frame(&c);
        let verdict = flow_verdict(&f, 99, &VolumeThresholds::default()).unwrap();
        assert_eq!(verdict.kind, SignalKind::Distribution);
        assert_eq!(verdict.score, Some(-4));

        let mut tied = candles(100);
        for (k, i) in (45..100).step_by(10).enumerate() {
            tied[i].volume = 4000.0;
            if k % 2 == 0 {
                let (o, cl) = (tied[i].open, tied[i].close);
                tied[i].open = cl;
                tied[i].close = o;
            }
        }
        let f = frame(&tied);
        let th = VolumeThresholds {
            flow_window: 60,
            ..VolumeThresholds::default()
        };
        assert!(flow_verdict(&f, 99, &th).is_none());
    }

    #[test]
    fn detect_keeps_recent_tail() {
        let mut c = candles(200);
        for i in (20..200).step_by(10) {
            c[i].volume = 50_000.0;
        }
        let f = frame(&c);
        let th = VolumeThresholds {
            event_tail: 3,
            ..VolumeThresholds::default()
        };
        let out = detect(&f, &th);
        let climax: Vec<&Signal> = out.iter().filter(|s| s.kind == SignalKind::Climax).collect();
        assert_eq!(climax.len(), 3);
        assert_eq!(climax.last().unwrap().timestamp, f.candle(190).t);
    }
}
