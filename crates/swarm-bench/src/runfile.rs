//! Run-file store: one JSON document per task id under the runs directory.
//!
//! Written by the batch driver, mutated in place by the offline quality
//! scorer, read-only for the aggregator. The task id is immutable once
//! assigned; the metrics block is not.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::logging::LogResult;

/// Raw metrics block of a run file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Both arms produced output.
    pub success: bool,
    /// Shared quality score kept for older run files; per-arm fields below
    /// take precedence when present.
    pub quality_score: Option<f64>,
    /// Shared constraint adherence, same precedence rule.
    pub constraint_adherence: Option<f64>,
    /// Combined wall time for both arms. Per-arm wall time is not recorded.
    pub wall_time_seconds: f64,
    /// Combined token count across both arms.
    pub tokens_used: u64,
    pub baseline_tokens_used: Option<u64>,
    pub swarm_tokens_used: Option<u64>,
    /// Filled by the offline quality scorer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm_quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_constraint_adherence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm_constraint_adherence: Option<f64>,
    /// Error type of whichever arm raised, when either did.
    pub error_type: Option<String>,
}

/// One run file: both arms' outputs plus raw metrics for a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFile {
    pub task_id: String,
    #[serde(default)]
    pub task_bucket: String,
    /// Null when the monolith arm failed.
    pub baseline_output: Option<String>,
    /// Null when the swarm arm failed (or was never attempted).
    pub swarm_output: Option<String>,
    pub metrics: RunMetrics,
}

impl RunFile {
    /// Effective quality score for the baseline arm (per-arm, else shared).
    pub fn baseline_quality(&self) -> Option<f64> {
        self.metrics
            .baseline_quality_score
            .or(self.metrics.quality_score)
    }

    /// Effective quality score for the swarm arm (per-arm, else shared).
    pub fn swarm_quality(&self) -> Option<f64> {
        self.metrics
            .swarm_quality_score
            .or(self.metrics.quality_score)
    }

    /// Effective constraint adherence for the baseline arm.
    pub fn baseline_constraint(&self) -> Option<f64> {
        self.metrics
            .baseline_constraint_adherence
            .or(self.metrics.constraint_adherence)
    }

    /// Effective constraint adherence for the swarm arm.
    pub fn swarm_constraint(&self) -> Option<f64> {
        self.metrics
            .swarm_constraint_adherence
            .or(self.metrics.constraint_adherence)
    }
}

/// Load all run files from the runs directory, sorted by file name.
///
/// A missing directory is "no runs". Non-JSON entries and files that fail
/// to parse are skipped; corruption is isolated per file, never fatal.
pub fn load_runs(dir: impl AsRef<Path>) -> LogResult<Vec<RunFile>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
        .collect();
    names.sort();

    let mut runs = Vec::new();
    for path in names {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable run file");
                continue;
            }
        };
        match serde_json::from_str::<RunFile>(&text) {
            Ok(run) => runs.push(run),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed run file");
            }
        }
    }
    Ok(runs)
}

/// Write one run file as pretty JSON, overwriting any previous version.
pub fn save_run(dir: impl AsRef<Path>, run: &RunFile) -> LogResult<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", run.task_id));
    let text = serde_json::to_string_pretty(run)?;
    fs::write(path, text)?;
    Ok(())
}
