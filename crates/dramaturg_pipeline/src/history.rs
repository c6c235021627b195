//! Cross-run metrics history.
//!
//! Every completed or failed run can be appended to a JSON-lines file. The
//! store serialises its own writes; reads never block writers for long
//! because the whole file is loaded and parsed outside the lock.

use crate::{MetricsSnapshot, PipelineResult};
use chrono::{DateTime, Utc};
use dramaturg_core::Stage;
use dramaturg_error::{StorageError, StorageErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

/// One line of the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier
    pub run_id: Uuid,
    /// Human label for the analysed script, usually its file name
    pub script_name: String,
    /// When the record was written
    pub timestamp: DateTime<Utc>,
    /// Metrics of the run
    pub metrics: MetricsSnapshot,
    /// Stage-fatal errors
    pub errors: Vec<String>,
    /// Whether all stages completed
    pub success: bool,
}

impl RunRecord {
    /// Record for a finished pipeline run.
    pub fn from_result(script_name: impl Into<String>, result: &PipelineResult) -> Self {
        Self {
            run_id: result.state.run_id,
            script_name: script_name.into(),
            timestamp: Utc::now(),
            metrics: result.metrics.clone(),
            errors: result.state.errors.clone(),
            success: result.is_success(),
        }
    }
}

/// Per-stage means over a window of runs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StageAverages {
    /// Mean seconds spent in model attempts
    pub avg_duration_secs: f64,
    /// Mean model calls
    pub avg_calls: f64,
    /// Mean failed attempts
    pub avg_retries: f64,
    /// Mean tokens
    pub avg_tokens: f64,
}

/// Aggregate over the most recent runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    /// Runs in the window
    pub total_runs: usize,
    /// Runs that completed
    pub successful_runs: usize,
    /// Runs that failed
    pub failed_runs: usize,
    /// Completed runs as a percentage
    pub success_rate: f64,
    /// Mean wall-clock seconds per run
    pub avg_duration_secs: f64,
    /// Means per stage, over runs in which the stage ran
    pub stage_stats: BTreeMap<Stage, StageAverages>,
}

impl HistoryStats {
    /// Aggregates records; `None` when there are none.
    pub fn from_records(records: &[RunRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let total_runs = records.len();
        let successful_runs = records.iter().filter(|r| r.success).count();
        let avg_duration_secs = records
            .iter()
            .map(|r| r.metrics.total_duration_secs)
            .sum::<f64>()
            / total_runs as f64;

        let mut sums: BTreeMap<Stage, (StageAverages, usize)> = BTreeMap::new();
        for record in records {
            for (stage, stats) in &record.metrics.stages {
                let (sum, count) = sums.entry(*stage).or_default();
                sum.avg_duration_secs += stats.duration_secs;
                sum.avg_calls += stats.calls as f64;
                sum.avg_retries += stats.retries as f64;
                sum.avg_tokens += stats.tokens as f64;
                *count += 1;
            }
        }
        let stage_stats = sums
            .into_iter()
            .map(|(stage, (sum, count))| {
                let n = count as f64;
                let averages = StageAverages {
                    avg_duration_secs: sum.avg_duration_secs / n,
                    avg_calls: sum.avg_calls / n,
                    avg_retries: sum.avg_retries / n,
                    avg_tokens: sum.avg_tokens / n,
                };
                (stage, averages)
            })
            .collect();

        Some(Self {
            total_runs,
            successful_runs,
            failed_runs: total_runs - successful_runs,
            success_rate: successful_runs as f64 / total_runs as f64 * 100.0,
            avg_duration_secs,
            stage_stats,
        })
    }
}

/// Append-only JSON-lines store of [`RunRecord`]s.
///
/// Share one store between concurrent runs (behind an `Arc`); appends are
/// serialised so lines never interleave.
#[derive(Debug)]
pub struct MetricsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MetricsStore {
    /// Store backed by `path`. Nothing is touched until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// History file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record, creating the file and its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    #[instrument(skip(self, record), fields(path = %self.path.display(), run_id = %record.run_id))]
    pub async fn append(&self, record: &RunRecord) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| StorageError::new(StorageErrorKind::FileWrite(e.to_string())))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                        "{}: {}",
                        parent.display(),
                        e
                    )))
                })?;
            }
        }

        let write_error = |e: std::io::Error| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_error)?;
        file.write_all(line.as_bytes()).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;

        debug!(success = record.success, "Appended run record");
        Ok(())
    }

    /// Reads every record, oldest first. A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line does not decode.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load_all(&self) -> Result<Vec<RunRecord>, StorageError> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!("No history file yet");
            return Ok(Vec::new());
        }
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;

        let records = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| {
                    StorageError::new(StorageErrorKind::CorruptRecord {
                        line: index + 1,
                        message: e.to_string(),
                    })
                })
            })
            .collect::<Result<Vec<RunRecord>, _>>()?;
        debug!(records = records.len(), "Loaded run history");
        Ok(records)
    }

    /// Aggregates the most recent `last_n` runs, or all runs when `None`.
    ///
    /// Returns `Ok(None)` for an empty history.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be loaded.
    pub async fn stats(&self, last_n: Option<usize>) -> Result<Option<HistoryStats>, StorageError> {
        let records = self.load_all().await?;
        let window = match last_n {
            Some(n) if n < records.len() => &records[records.len() - n..],
            _ => &records[..],
        };
        Ok(HistoryStats::from_records(window))
    }
}
