//! Per-run stage metrics.
//!
//! A [`MetricsCollector`] belongs to exactly one pipeline run. Concurrent
//! runs each own a collector; aggregation across runs merges the immutable
//! [`MetricsSnapshot`]s they produce.

use dramaturg_core::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Counters for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageStats {
    /// Time spent in model attempts, seconds
    pub duration_secs: f64,
    /// Model calls made
    pub calls: usize,
    /// Failed attempts
    pub retries: usize,
    /// Tokens reported by the provider
    pub tokens: u64,
    /// Attempts rejected by parsing or validation
    pub validation_errors: usize,
}

impl StageStats {
    fn merge(&mut self, other: &StageStats) {
        self.duration_secs += other.duration_secs;
        self.calls += other.calls;
        self.retries += other.retries;
        self.tokens += other.tokens;
        self.validation_errors += other.validation_errors;
    }
}

/// Immutable view of a run's metrics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Wall-clock time since the collector was created, seconds
    pub total_duration_secs: f64,
    /// Per-stage counters
    pub stages: BTreeMap<Stage, StageStats>,
}

impl MetricsSnapshot {
    /// Model calls across all stages.
    pub fn total_calls(&self) -> usize {
        self.stages.values().map(|s| s.calls).sum()
    }

    /// Failed attempts across all stages.
    pub fn total_retries(&self) -> usize {
        self.stages.values().map(|s| s.retries).sum()
    }

    /// Tokens across all stages.
    pub fn total_tokens(&self) -> u64 {
        self.stages.values().map(|s| s.tokens).sum()
    }

    /// Counters for one stage, zero if it never ran.
    pub fn stage(&self, stage: Stage) -> StageStats {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    /// Sums two snapshots.
    ///
    /// # Examples
    ///
    /// ```
    /// use dramaturg_core::Stage;
    /// use dramaturg_pipeline::MetricsCollector;
    /// use std::time::Duration;
    ///
    /// let first = MetricsCollector::new();
    /// first.record_attempt(Stage::Discoverer, Duration::from_millis(5), Some(100), true);
    /// let second = MetricsCollector::new();
    /// second.record_attempt(Stage::Discoverer, Duration::from_millis(5), Some(50), false);
    ///
    /// let merged = first.snapshot().merge(&second.snapshot());
    /// assert_eq!(merged.total_calls(), 2);
    /// assert_eq!(merged.total_tokens(), 150);
    /// assert_eq!(merged.total_retries(), 1);
    /// ```
    pub fn merge(&self, other: &MetricsSnapshot) -> MetricsSnapshot {
        let mut merged = self.clone();
        merged.total_duration_secs += other.total_duration_secs;
        for (stage, stats) in &other.stages {
            merged.stages.entry(*stage).or_default().merge(stats);
        }
        merged
    }
}

/// Records attempts for one pipeline run.
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    stages: Mutex<BTreeMap<Stage, StageStats>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Starts the wall clock.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            stages: Mutex::new(BTreeMap::new()),
        }
    }

    /// Records one model call. A failed attempt also counts as a retry.
    pub fn record_attempt(
        &self,
        stage: Stage,
        duration: Duration,
        tokens: Option<u64>,
        success: bool,
    ) {
        debug!(
            stage = %stage,
            duration_ms = duration.as_millis() as u64,
            tokens = tokens.unwrap_or(0),
            success,
            "Recording stage attempt"
        );
        self.update(stage, |stats| {
            stats.calls += 1;
            stats.duration_secs += duration.as_secs_f64();
            stats.tokens += tokens.unwrap_or(0);
            if !success {
                stats.retries += 1;
            }
        });
    }

    /// Records an attempt rejected by parsing or validation.
    pub fn record_validation_error(&self, stage: Stage) {
        self.update(stage, |stats| stats.validation_errors += 1);
    }

    /// Copies the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let stages = match self.stages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        MetricsSnapshot {
            total_duration_secs: self.started.elapsed().as_secs_f64(),
            stages,
        }
    }

    fn update(&self, stage: Stage, f: impl FnOnce(&mut StageStats)) {
        let mut guard = match self.stages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(guard.entry(stage).or_default());
    }
}
