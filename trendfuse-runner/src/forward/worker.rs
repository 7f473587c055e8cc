//! Background worker that steps every active run on a fixed interval.
//!
//! A dedicated thread ticks immediately and then every `interval`; dropping
//! or stopping the handle ends the loop at the next wake-up. Runs are stepped
//! in parallel with rayon; a failed step is logged and retried next tick.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::stepper::Stepper;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub stepped: usize,
    pub failed: usize,
    pub finalized: usize,
}

/// Step every active run once.
pub fn tick(stepper: &Stepper, now: DateTime<Utc>) -> TickReport {
    let runs = match stepper.store().active_runs() {
        Ok(runs) => runs,
        Err(e) => {
            tracing::error!(error = %e, "failed to list active forward-test runs");
            return TickReport {
                failed: 1,
                ..TickReport::default()
            };
        }
    };

    let results: Vec<_> = runs
        .par_iter()
        .map(|run| (run.id, stepper.step(run.id, now)))
        .collect();

    let mut report = TickReport::default();
    for (run_id, result) in results {
        match result {
            Ok(outcome) => {
                report.stepped += 1;
                if outcome.finalized {
                    report.finalized += 1;
                }
            }
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "forward-test step failed");
                report.failed += 1;
            }
        }
    }
    report
}

pub struct WorkerHandle {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker and wait for the current tick to finish.
    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            tracing::error!("forward-test worker thread panicked");
        }
    }
}

pub fn spawn(stepper: Arc<Stepper>, interval: Duration) -> std::io::Result<WorkerHandle> {
    let (tx, rx) = mpsc::channel::<()>();
    let thread = std::thread::Builder::new()
        .name("forward-test-worker".into())
        .spawn(move || {
            tracing::info!(interval_secs = interval.as_secs(), "forward-test worker started");
            loop {
                let report = tick(&stepper, Utc::now());
                tracing::debug!(?report, "worker tick");
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::info!("forward-test worker stopped");
        })?;
    Ok(WorkerHandle { stop: tx, thread })
}
