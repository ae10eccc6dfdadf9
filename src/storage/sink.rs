//! RecordSink trait: pluggable output backend
//!
//! The coordinator hands every finished stream to a sink once the run ends:
//! - `CsvDirectorySink`: one CSV file per stream under a run directory
//! - `InMemorySink`: keeps everything in memory for tests

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::record::{write_rows, CsvRecord};
use crate::pipeline::RunSummary;
use crate::types::{KinematicFrame, OrientationSample, RiskLevel, RiskVector};

/// File name of the per-sensor quaternion stream.
pub const QUATERNION_FILE: &str = "quaternions.csv";
/// File name of the kinematic frame stream.
pub const FRAMES_FILE: &str = "frames.csv";
/// File name of the run summary.
pub const SUMMARY_FILE: &str = "summary.json";

/// Trait for persistence backends.
///
/// Implementations must be thread-safe (Send + Sync) so a sink can be shared
/// behind an `Arc` between the coordinator and its caller.
pub trait RecordSink: Send + Sync {
    /// Store one sensor's fused orientation stream
    fn store_quaternions(
        &self,
        sensor: &str,
        samples: &[OrientationSample],
    ) -> Result<(), StorageError>;

    /// Store the kinematic frame stream
    fn store_frames(&self, frames: &[KinematicFrame]) -> Result<(), StorageError>;

    /// Store one tier's per-frame risk stream
    fn store_risk(&self, level: RiskLevel, vectors: &[RiskVector]) -> Result<(), StorageError>;

    /// Store the end-of-run summary
    fn store_summary(&self, summary: &RunSummary) -> Result<(), StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage lock poisoned: {0}")]
    Lock(String),
}

// ============================================================================
// CSV directory backend
// ============================================================================

/// Writes each stream to its own CSV file below `root`.
///
/// Layout: `<root>/<sensor>/quaternions.csv`, `<root>/frames.csv`,
/// `<root>/severe_risk.csv`, `<root>/moderate_risk.csv`, `<root>/summary.json`.
/// Existing files are appended to and the header is only written when a file
/// is created, so repeated runs into the same directory accumulate rows.
#[derive(Debug, Clone)]
pub struct CsvDirectorySink {
    root: PathBuf,
}

impl CsvDirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quaternion_path(&self, sensor: &str) -> PathBuf {
        self.root.join(sensor).join(QUATERNION_FILE)
    }

    pub fn frames_path(&self) -> PathBuf {
        self.root.join(FRAMES_FILE)
    }

    pub fn risk_path(&self, level: RiskLevel) -> PathBuf {
        self.root.join(format!("{}.csv", level.stream_name()))
    }

    fn append<T: CsvRecord>(&self, path: &Path, records: &[T]) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let exists = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        write_rows(BufWriter::new(file), records.iter(), !exists).map_err(io_err)?;

        tracing::debug!(path = %path.display(), rows = records.len(), appended = exists, "Wrote CSV stream");
        Ok(())
    }
}

impl RecordSink for CsvDirectorySink {
    fn store_quaternions(
        &self,
        sensor: &str,
        samples: &[OrientationSample],
    ) -> Result<(), StorageError> {
        self.append(&self.quaternion_path(sensor), samples)
    }

    fn store_frames(&self, frames: &[KinematicFrame]) -> Result<(), StorageError> {
        self.append(&self.frames_path(), frames)
    }

    fn store_risk(&self, level: RiskLevel, vectors: &[RiskVector]) -> Result<(), StorageError> {
        self.append(&self.risk_path(level), vectors)
    }

    fn store_summary(&self, summary: &RunSummary) -> Result<(), StorageError> {
        let path = self.root.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::create_dir_all(&self.root).map_err(|source| StorageError::Io {
            path: self.root.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| StorageError::Io { path, source })
    }

    fn backend_name(&self) -> &'static str {
        "csv"
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory sink for tests and dry runs.
///
/// Repeated stores append, mirroring the CSV backend.
#[derive(Debug, Default)]
pub struct InMemorySink {
    quaternions: RwLock<BTreeMap<String, Vec<OrientationSample>>>,
    frames: RwLock<Vec<KinematicFrame>>,
    risk: RwLock<BTreeMap<RiskLevel, Vec<RiskVector>>>,
    summary: RwLock<Option<RunSummary>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quaternions(&self, sensor: &str) -> Vec<OrientationSample> {
        self.quaternions
            .read()
            .map(|m| m.get(sensor).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn sensors(&self) -> Vec<String> {
        self.quaternions
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn frames(&self) -> Vec<KinematicFrame> {
        self.frames.read().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn risk(&self, level: RiskLevel) -> Vec<RiskVector> {
        self.risk
            .read()
            .map(|m| m.get(&level).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.summary.read().ok().and_then(|s| s.clone())
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Lock(e.to_string())
}

impl RecordSink for InMemorySink {
    fn store_quaternions(
        &self,
        sensor: &str,
        samples: &[OrientationSample],
    ) -> Result<(), StorageError> {
        let mut store = self.quaternions.write().map_err(poisoned)?;
        store
            .entry(sensor.to_string())
            .or_default()
            .extend_from_slice(samples);
        Ok(())
    }

    fn store_frames(&self, frames: &[KinematicFrame]) -> Result<(), StorageError> {
        self.frames.write().map_err(poisoned)?.extend_from_slice(frames);
        Ok(())
    }

    fn store_risk(&self, level: RiskLevel, vectors: &[RiskVector]) -> Result<(), StorageError> {
        let mut store = self.risk.write().map_err(poisoned)?;
        store.entry(level).or_default().extend_from_slice(vectors);
        Ok(())
    }

    fn store_summary(&self, summary: &RunSummary) -> Result<(), StorageError> {
        *self.summary.write().map_err(poisoned)? = Some(summary.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
