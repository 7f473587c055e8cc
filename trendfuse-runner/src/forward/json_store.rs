//! JSON-file run store.
//!
//! The whole store lives in `<dir>/forward_runs.json`. Every operation takes
//! an advisory lock on `<dir>/forward_runs.lock` and reads the file fresh, so
//! several handles (or processes) can share one directory. Mutations are
//! applied under the exclusive lock, written to a temp file and renamed over
//! the original, so a crash mid-write never leaves a half-written store.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use trendfuse_core::domain::{RunId, Trade};

use super::run::{CandleCommit, ForwardTestRun, NewRun, TradeExit};
use super::store::{RunStore, StoreError, StoreState};
use crate::metrics::TradeStats;

const STORE_FILE: &str = "forward_runs.json";
const LOCK_FILE: &str = "forward_runs.lock";

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    lock_path: PathBuf,
    // serializes threads sharing this handle; the file lock covers the rest
    local: Mutex<()>,
}

impl JsonStore {
    /// Open the store in `dir`, creating the directory when missing.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let store = Self {
            path: dir.join(STORE_FILE),
            lock_path: dir.join(LOCK_FILE),
            local: Mutex::new(()),
        };
        // fail early on a corrupt file
        store.read(|_| Ok(()))?;
        tracing::debug!(path = %store.path.display(), "opened forward-test store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn local(&self) -> MutexGuard<'_, ()> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock file handle; the lock is released when it is dropped.
    fn file_lock(&self, exclusive: bool) -> Result<File, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        if exclusive {
            file.lock_exclusive()?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(file)
    }

    fn load(&self) -> Result<StoreState, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _local = self.local();
        let _file = self.file_lock(false)?;
        f(&self.load()?)
    }

    /// Read-modify-write under the exclusive lock. Nothing is written when `f` fails.
    fn transact<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _local = self.local();
        let _file = self.file_lock(true)?;
        let mut state = self.load()?;
        let out = f(&mut state)?;
        self.persist(&state)?;
        Ok(out)
    }
}

impl RunStore for JsonStore {
    fn create_run(&self, new: NewRun) -> Result<ForwardTestRun, StoreError> {
        self.transact(|s| Ok(s.create_run(new)))
    }

    fn get_run(&self, id: RunId) -> Result<ForwardTestRun, StoreError> {
        self.read(|s| s.get_run(id))
    }

    fn active_runs(&self) -> Result<Vec<ForwardTestRun>, StoreError> {
        self.read(|s| Ok(s.active_runs()))
    }

    fn open_trade(&self, run_id: RunId) -> Result<Option<Trade>, StoreError> {
        self.read(|s| s.open_trade(run_id))
    }

    fn trades_for_run(&self, run_id: RunId) -> Result<Vec<Trade>, StoreError> {
        self.read(|s| s.trades_for_run(run_id))
    }

    fn commit_candle(&self, run_id: RunId, commit: CandleCommit, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.transact(|s| s.commit_candle(run_id, commit, now))
    }

    fn finalize_run(
        &self,
        run_id: RunId,
        exit: Option<TradeExit>,
        summary: TradeStats,
    ) -> Result<ForwardTestRun, StoreError> {
        self.transact(|s| s.finalize_run(run_id, exit, summary))
    }
}
