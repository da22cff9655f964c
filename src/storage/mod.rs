//! Persisted run artifacts
//!
//! Workers write their own record's runs; nothing here is shared between
//! records, so concurrent writers never touch the same file.
//!
//! Layout under an archive root:
//!
//! ```text
//! <root>/record_0007/run_001.json   one RunResult per run
//! <root>/record_0007/schedule.json  final RecordSchedule
//! ```
//!
//! The cross-record intensity table lives in [`table`] (Parquet) and the
//! aggregated curves are exported as JSON with [`export_curves`].

mod table;

pub use table::{
    intensity_table, load_intensity_table, run_column, table_rows, write_intensity_table,
    RECORD_ID_COLUMN,
};

use crate::curve::AggregatedCurves;
use crate::run::RunResult;
use crate::schedule::RecordSchedule;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const SCHEDULE_FILE: &str = "schedule.json";

/// Per-record, per-run JSON archive.
#[derive(Debug, Clone)]
pub struct RunArchive {
    root: PathBuf,
}

impl RunArchive {
    /// Archive rooted at `root` (created lazily on first write).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Archive root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one record's runs.
    #[must_use]
    pub fn record_dir(&self, record_id: u32) -> PathBuf {
        self.root.join(format!("record_{record_id:04}"))
    }

    /// Persist one run bundle.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written.
    pub fn save_run(&self, run: &RunResult) -> Result<PathBuf> {
        let dir = self.record_dir(run.record_id());
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("run_{:03}.json", run.run_index()));
        write_json(&path, run)?;
        Ok(path)
    }

    /// Persist every run of a schedule plus the schedule itself.
    ///
    /// # Errors
    ///
    /// Returns error if any file cannot be written.
    pub fn save_schedule(&self, schedule: &RecordSchedule) -> Result<()> {
        for run in schedule.runs() {
            self.save_run(run)?;
        }
        write_json(
            &self.record_dir(schedule.record_id()).join(SCHEDULE_FILE),
            schedule,
        )
    }

    /// Load a record's runs ordered by run index.
    ///
    /// # Errors
    ///
    /// Returns error if the record directory is missing or a bundle is
    /// malformed.
    pub fn load_runs(&self, record_id: u32) -> Result<Vec<RunResult>> {
        let dir = self.record_dir(record_id);
        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| {
            Error::Storage(format!("Failed to open record directory {}: {e}", dir.display()))
        })? {
            let path = entry?.path();
            let is_run = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("run_") && name.ends_with(".json"));
            if is_run {
                runs.push(read_json::<RunResult>(&path)?);
            }
        }
        runs.sort_by_key(RunResult::run_index);
        Ok(runs)
    }

    /// Load a schedule saved with [`Self::save_schedule`].
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or malformed.
    pub fn load_schedule(&self, record_id: u32) -> Result<RecordSchedule> {
        read_json(&self.record_dir(record_id).join(SCHEDULE_FILE))
    }

    /// Identifiers of every archived record, ascending.
    ///
    /// # Errors
    ///
    /// Returns error if the root cannot be listed.
    pub fn record_ids(&self) -> Result<Vec<u32>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("record_"))
                .and_then(|id| id.parse().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

/// Export aggregated curves (all directions) as JSON.
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn export_curves<P: AsRef<Path>>(path: P, curves: &[AggregatedCurves]) -> Result<()> {
    write_json(path.as_ref(), &curves)
}

/// Import curves written by [`export_curves`].
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed.
pub fn import_curves<P: AsRef<Path>>(path: P) -> Result<Vec<AggregatedCurves>> {
    read_json(path.as_ref())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    fs::write(path, json)
        .map_err(|e| Error::Storage(format!("Failed to write {}: {e}", path.display())))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)
        .map_err(|e| Error::Storage(format!("Failed to read {}: {e}", path.display())))?;
    Ok(serde_json::from_slice(&bytes)?)
}
