//! Aggregates run files into the benchmark summary document.
//!
//! Computes per-arm success rates, first-pass success, token averages and
//! deltas, wall-time percentiles, Adjusted Success Rate (ASR), Versonality
//! Performance Delta (VPD), coordination overhead, and a failure histogram.
//! All internal math runs at full f64 precision; rounding happens exactly
//! once, when the output document is assembled.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::BenchConfig;
use crate::logging::LogResult;
use crate::runfile::RunFile;

/// Fallback benchmark version when the manifest is missing or unreadable.
pub const DEFAULT_BENCHMARK_VERSION: &str = "sv-v1";

/// Per-arm metrics block of the summary document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmMetrics {
    pub success_rate: f64,
    /// First-pass success. The batch driver never retries, so this equals
    /// `success_rate`; kept as a separate field on purpose.
    pub fps: f64,
    pub avg_tokens_used: Option<f64>,
    /// Adjusted Success Rate, mean over all runs.
    pub asr: f64,
}

/// Quality and token deltas (swarm − baseline).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deltas {
    pub quality_delta: Option<f64>,
    pub token_cost_delta: Option<f64>,
}

/// Wall-time percentiles over the combined per-task series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WallTimePercentiles {
    pub p50: Option<f64>,
    pub p95: Option<f64>,
}

/// Extra cost attributable to the multi-role arm. Token delta only: the
/// run-file schema records combined wall time, so no time term exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationOverhead {
    pub token_delta: f64,
}

/// One bucket of the failure histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureBucket {
    pub count: usize,
    pub task_ids: Vec<String>,
}

/// The summary document, overwritten wholesale on each aggregator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub benchmark_version: String,
    pub task_count: usize,
    pub baseline_metrics: Option<ArmMetrics>,
    pub swarm_metrics: Option<ArmMetrics>,
    pub deltas: Deltas,
    pub wall_time_seconds: WallTimePercentiles,
    pub coordination_overhead: Option<CoordinationOverhead>,
    /// Versonality Performance Delta: swarm ASR − baseline ASR.
    pub vpd_asr: Option<f64>,
    /// Error type → affected tasks, sorted by error type.
    pub notable_failures: BTreeMap<String, FailureBucket>,
}

/// p-th percentile (0–100) of an ascending-sorted slice, with linear
/// interpolation between the bracketing elements. None for empty input.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let idx = (p / 100.0) * (n - 1) as f64;
    let i = idx.floor() as usize;
    if i >= n - 1 {
        return Some(sorted[n - 1]);
    }
    let frac = idx - i as f64;
    Some(sorted[i] + frac * (sorted[i + 1] - sorted[i]))
}

/// Adjusted Success Rate for one run: success × (quality/5) × adherence.
/// Missing quality or adherence scores as 0; a conservative default, not an
/// estimate.
pub fn asr_per_run(success: bool, quality: Option<f64>, constraint_adherence: Option<f64>) -> f64 {
    let s = if success { 1.0 } else { 0.0 };
    let q = quality.unwrap_or(0.0);
    let c = constraint_adherence.unwrap_or(0.0);
    s * (q / 5.0) * c
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Read the benchmark version string from the manifest, if present.
pub fn read_benchmark_version(path: impl AsRef<Path>) -> String {
    let fallback = || DEFAULT_BENCHMARK_VERSION.to_string();
    let Ok(text) = fs::read_to_string(path) else {
        return fallback();
    };
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("benchmark_version")?.as_str().map(str::to_string))
        .unwrap_or_else(fallback)
}

/// Compute the full summary over all run files of one benchmark execution.
///
/// Zero run files yields a document where every metric is null/zero/empty;
/// aggregation never panics on missing or partial data.
pub fn aggregate(runs: &[RunFile], benchmark_version: String) -> BenchmarkSummary {
    let n = runs.len();
    if n == 0 {
        return BenchmarkSummary {
            benchmark_version,
            task_count: 0,
            baseline_metrics: None,
            swarm_metrics: None,
            deltas: Deltas::default(),
            wall_time_seconds: WallTimePercentiles::default(),
            coordination_overhead: None,
            vpd_asr: None,
            notable_failures: BTreeMap::new(),
        };
    }
    let nf = n as f64;

    // Success from arm-specific output presence, never from manual overrides.
    let baseline_successes = runs.iter().filter(|r| r.baseline_output.is_some()).count();
    let swarm_successes = runs.iter().filter(|r| r.swarm_output.is_some()).count();
    let success_rate_baseline = baseline_successes as f64 / nf;
    let success_rate_swarm = swarm_successes as f64 / nf;

    let mut wall_times: Vec<f64> = runs.iter().map(|r| r.metrics.wall_time_seconds).collect();
    wall_times.sort_by(|a, b| a.total_cmp(b));
    let p50 = percentile(&wall_times, 50.0);
    let p95 = percentile(&wall_times, 95.0);

    let avg_baseline_tokens = mean_of(runs.iter().filter_map(|r| r.metrics.baseline_tokens_used));
    let avg_swarm_tokens = mean_of(runs.iter().filter_map(|r| r.metrics.swarm_tokens_used));
    let token_delta = match (avg_swarm_tokens, avg_baseline_tokens) {
        (Some(s), Some(b)) => Some(s - b),
        _ => None,
    };

    // Quality delta over runs where both arms carry a score.
    let quality_pairs: Vec<f64> = runs
        .iter()
        .filter_map(|r| match (r.baseline_quality(), r.swarm_quality()) {
            (Some(b), Some(s)) => Some(s - b),
            _ => None,
        })
        .collect();
    let quality_delta = if quality_pairs.is_empty() {
        None
    } else {
        Some(quality_pairs.iter().sum::<f64>() / quality_pairs.len() as f64)
    };

    // ASR: mean over all runs, not just ones where both arms succeeded.
    let asr_baseline = runs
        .iter()
        .map(|r| {
            asr_per_run(
                r.baseline_output.is_some(),
                r.baseline_quality(),
                r.baseline_constraint(),
            )
        })
        .sum::<f64>()
        / nf;
    let asr_swarm = runs
        .iter()
        .map(|r| {
            asr_per_run(
                r.swarm_output.is_some(),
                r.swarm_quality(),
                r.swarm_constraint(),
            )
        })
        .sum::<f64>()
        / nf;
    let vpd_asr = asr_swarm - asr_baseline;

    let mut notable_failures: BTreeMap<String, FailureBucket> = BTreeMap::new();
    for r in runs {
        if let Some(error_type) = &r.metrics.error_type {
            let bucket = notable_failures
                .entry(error_type.clone())
                .or_insert_with(|| FailureBucket {
                    count: 0,
                    task_ids: Vec::new(),
                });
            bucket.count += 1;
            bucket.task_ids.push(r.task_id.clone());
        }
    }

    // No retry mechanism exists, so first-pass success equals success rate.
    let fps_baseline = success_rate_baseline;
    let fps_swarm = success_rate_swarm;

    let coordination_overhead = token_delta.map(|d| CoordinationOverhead {
        token_delta: round2(d),
    });

    BenchmarkSummary {
        benchmark_version,
        task_count: n,
        baseline_metrics: Some(ArmMetrics {
            success_rate: round4(success_rate_baseline),
            fps: round4(fps_baseline),
            avg_tokens_used: avg_baseline_tokens.map(round2),
            asr: round4(asr_baseline),
        }),
        swarm_metrics: Some(ArmMetrics {
            success_rate: round4(success_rate_swarm),
            fps: round4(fps_swarm),
            avg_tokens_used: avg_swarm_tokens.map(round2),
            asr: round4(asr_swarm),
        }),
        deltas: Deltas {
            quality_delta: quality_delta.map(round4),
            token_cost_delta: token_delta.map(round2),
        },
        wall_time_seconds: WallTimePercentiles {
            p50: p50.map(round4),
            p95: p95.map(round4),
        },
        coordination_overhead,
        vpd_asr: Some(round4(vpd_asr)),
        notable_failures,
    }
}

fn mean_of(values: impl Iterator<Item = u64>) -> Option<f64> {
    let values: Vec<u64> = values.collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<u64>() as f64 / values.len() as f64)
    }
}

/// Write the summary document, replacing any previous one.
pub fn write_summary(config: &BenchConfig, summary: &BenchmarkSummary) -> LogResult<()> {
    fs::create_dir_all(&config.results_dir)?;
    let path = config.summary_path();
    fs::write(&path, serde_json::to_string_pretty(summary)?)?;
    info!(path = %path.display(), task_count = summary.task_count, "wrote summary document");
    Ok(())
}
