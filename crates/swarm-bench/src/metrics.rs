//! Derived metrics computed from persisted run summaries.
//!
//! Everything here is computed on read and never logged back: stateless,
//! deterministic, and safe to call repeatedly against the same snapshot.
//! Empty filtered sets yield 0.0, never an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::logging::types::{Arm, RunSummary};
use crate::logging::LogResult;

/// Load run summaries from a JSONL log.
///
/// A missing file is "no data", not an error. Blank and malformed lines are
/// skipped so one corrupt record cannot poison the whole scan.
pub fn load_summaries(path: impl AsRef<Path>) -> LogResult<Vec<RunSummary>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<RunSummary>(trimmed) {
            Ok(summary) => out.push(summary),
            Err(e) => warn!(error = %e, "skipping malformed run-summary line"),
        }
    }
    Ok(out)
}

/// Filter applied before every reader operation.
#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    /// Restrict to one arm.
    pub arm: Option<Arm>,
    /// Restrict to one task bucket.
    pub task_bucket: Option<String>,
    /// Restrict to first-pass attempts (retry_count == 0).
    pub first_pass_only: bool,
}

impl SummaryFilter {
    /// Filter for a single arm.
    pub fn arm(arm: Arm) -> Self {
        Self {
            arm: Some(arm),
            ..Self::default()
        }
    }

    fn apply<'a>(&self, summaries: &'a [RunSummary]) -> Vec<&'a RunSummary> {
        summaries
            .iter()
            .filter(|s| self.arm.map_or(true, |a| s.arm == a))
            .filter(|s| {
                self.task_bucket
                    .as_deref()
                    .map_or(true, |b| s.task_bucket == b)
            })
            .filter(|s| !self.first_pass_only || s.retry_count == 0)
            .collect()
    }
}

/// Fraction of runs that succeeded. 0.0 if no runs match.
pub fn success_rate(summaries: &[RunSummary], filter: &SummaryFilter) -> f64 {
    let subset = filter.apply(summaries);
    ratio(
        subset.iter().filter(|s| s.outcome.success).count(),
        subset.len(),
    )
}

/// Success rate restricted to first-pass runs (retry_count == 0).
///
/// With no retry mechanism in the batch driver this equals `success_rate`;
/// the restriction is applied anyway so retried data, if it ever appears,
/// is handled.
pub fn first_pass_success(summaries: &[RunSummary], filter: &SummaryFilter) -> f64 {
    let filter = SummaryFilter {
        first_pass_only: true,
        ..filter.clone()
    };
    success_rate(summaries, &filter)
}

/// Mean (tokens_in + tokens_out) per successful run. 0.0 if no successes.
pub fn tokens_per_success(summaries: &[RunSummary], filter: &SummaryFilter) -> f64 {
    let successful: Vec<_> = filter
        .apply(summaries)
        .into_iter()
        .filter(|s| s.outcome.success)
        .collect();
    if successful.is_empty() {
        return 0.0;
    }
    let total: u64 = successful.iter().map(|s| s.total_tokens()).sum();
    total as f64 / successful.len() as f64
}

/// Mean cost_usd.total per successful run. 0.0 if no successes.
pub fn cost_per_success(summaries: &[RunSummary], filter: &SummaryFilter) -> f64 {
    let successful: Vec<_> = filter
        .apply(summaries)
        .into_iter()
        .filter(|s| s.outcome.success)
        .collect();
    if successful.is_empty() {
        return 0.0;
    }
    let total: f64 = successful.iter().map(|s| s.cost_usd.total).sum();
    total / successful.len() as f64
}

/// Mean quality over summaries carrying a quality score. 0.0 if none do.
pub fn average_quality(summaries: &[RunSummary], filter: &SummaryFilter) -> f64 {
    let scored: Vec<f64> = filter
        .apply(summaries)
        .into_iter()
        .filter_map(|s| s.scores.quality)
        .collect();
    if scored.is_empty() {
        return 0.0;
    }
    scored.iter().sum::<f64>() / scored.len() as f64
}

/// Successful tool calls over total tool calls. 0.0 when no tools ran.
pub fn tool_correctness(summaries: &[RunSummary], filter: &SummaryFilter) -> f64 {
    let subset = filter.apply(summaries);
    let total: u64 = subset.iter().map(|s| s.usage.tool_calls as u64).sum();
    let ok: u64 = subset.iter().map(|s| s.usage.tool_calls_ok as u64).sum();
    if total == 0 {
        return 0.0;
    }
    ok as f64 / total as f64
}

/// Fraction of runs flagged as policy violations.
pub fn policy_violation_rate(summaries: &[RunSummary], filter: &SummaryFilter) -> f64 {
    let subset = filter.apply(summaries);
    ratio(
        subset.iter().filter(|s| s.outcome.policy_violation).count(),
        subset.len(),
    )
}

/// Fraction of runs flagged with a critical hallucination.
pub fn critical_hallucination_rate(summaries: &[RunSummary], filter: &SummaryFilter) -> f64 {
    let subset = filter.apply(summaries);
    ratio(
        subset
            .iter()
            .filter(|s| s.outcome.critical_hallucination)
            .count(),
        subset.len(),
    )
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::types::{CostUsd, FailureReason, Outcome, Scores, Usage};
    use tempfile::tempdir;

    fn summary(arm: Arm, bucket: &str, success: bool, tokens: u64, cost: f64) -> RunSummary {
        RunSummary {
            run_id: "r".into(),
            task_id: "t".into(),
            arm,
            seed: None,
            task_bucket: bucket.into(),
            n_agents: if arm == Arm::Swarm { 6 } else { 1 },
            budgets: None,
            outcome: Outcome {
                success,
                failure_reason: if success {
                    None
                } else {
                    Some(FailureReason::PlanningError)
                },
                policy_violation: false,
                critical_hallucination: false,
            },
            scores: Scores::default(),
            usage: Usage {
                wall_seconds: 1.0,
                tokens_in: tokens / 2,
                tokens_out: tokens - tokens / 2,
                tool_calls: 0,
                tool_calls_ok: 0,
            },
            swarm: None,
            cost_usd: CostUsd {
                model: cost,
                tools: 0.0,
                total: cost,
            },
            retry_count: 0,
        }
    }

    #[test]
    fn test_empty_input_yields_zero_everywhere() {
        let filter = SummaryFilter::default();
        assert_eq!(success_rate(&[], &filter), 0.0);
        assert_eq!(first_pass_success(&[], &filter), 0.0);
        assert_eq!(tokens_per_success(&[], &filter), 0.0);
        assert_eq!(cost_per_success(&[], &filter), 0.0);
        assert_eq!(average_quality(&[], &filter), 0.0);
        assert_eq!(tool_correctness(&[], &filter), 0.0);
        assert_eq!(policy_violation_rate(&[], &filter), 0.0);
        assert_eq!(critical_hallucination_rate(&[], &filter), 0.0);
    }

    #[test]
    fn test_success_rate_with_arm_filter() {
        let data = vec![
            summary(Arm::Monolith, "easy", true, 100, 0.01),
            summary(Arm::Monolith, "easy", false, 0, 0.0),
            summary(Arm::Swarm, "easy", true, 300, 0.03),
        ];
        assert_eq!(success_rate(&data, &SummaryFilter::default()), 2.0 / 3.0);
        assert_eq!(success_rate(&data, &SummaryFilter::arm(Arm::Monolith)), 0.5);
        assert_eq!(success_rate(&data, &SummaryFilter::arm(Arm::Swarm)), 1.0);
    }

    #[test]
    fn test_bucket_filter() {
        let data = vec![
            summary(Arm::Swarm, "easy", true, 100, 0.01),
            summary(Arm::Swarm, "hard", false, 0, 0.0),
        ];
        let filter = SummaryFilter {
            task_bucket: Some("hard".into()),
            ..SummaryFilter::default()
        };
        assert_eq!(success_rate(&data, &filter), 0.0);
    }

    #[test]
    fn test_tokens_and_cost_per_success_ignore_failures() {
        let data = vec![
            summary(Arm::Swarm, "easy", true, 100, 0.02),
            summary(Arm::Swarm, "easy", true, 300, 0.04),
            summary(Arm::Swarm, "easy", false, 9999, 9.99),
        ];
        let filter = SummaryFilter::default();
        assert_eq!(tokens_per_success(&data, &filter), 200.0);
        assert!((cost_per_success(&data, &filter) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_first_pass_equals_success_rate_without_retries() {
        // No retry mechanism records nonzero retry_count, so the two agree.
        let data = vec![
            summary(Arm::Monolith, "easy", true, 100, 0.01),
            summary(Arm::Monolith, "easy", false, 0, 0.0),
        ];
        let filter = SummaryFilter::default();
        assert_eq!(
            first_pass_success(&data, &filter),
            success_rate(&data, &filter)
        );
    }

    #[test]
    fn test_first_pass_excludes_retried_runs() {
        let mut retried = summary(Arm::Monolith, "easy", true, 100, 0.01);
        retried.retry_count = 2;
        let data = vec![retried, summary(Arm::Monolith, "easy", false, 0, 0.0)];
        let filter = SummaryFilter::default();
        assert_eq!(first_pass_success(&data, &filter), 0.0);
        assert_eq!(success_rate(&data, &filter), 0.5);
    }

    #[test]
    fn test_tool_correctness_is_ratio_of_sums() {
        let mut a = summary(Arm::Swarm, "easy", true, 100, 0.01);
        a.usage.tool_calls = 4;
        a.usage.tool_calls_ok = 3;
        let mut b = summary(Arm::Swarm, "easy", true, 100, 0.01);
        b.usage.tool_calls = 6;
        b.usage.tool_calls_ok = 6;
        let data = vec![a, b];
        assert_eq!(tool_correctness(&data, &SummaryFilter::default()), 0.9);
    }

    #[test]
    fn test_average_quality_over_scored_only() {
        let mut a = summary(Arm::Swarm, "easy", true, 100, 0.01);
        a.scores.quality = Some(4.0);
        let b = summary(Arm::Swarm, "easy", true, 100, 0.01);
        let data = vec![a, b];
        assert_eq!(average_quality(&data, &SummaryFilter::default()), 4.0);
    }

    #[test]
    fn test_load_summaries_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let loaded = load_summaries(dir.path().join("absent.jsonl")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_summaries_skips_malformed_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run_summaries.jsonl");
        let good = serde_json::to_string(&summary(Arm::Monolith, "easy", true, 10, 0.0)).unwrap();
        std::fs::write(&path, format!("{}\nnot json at all\n\n", good)).unwrap();

        let loaded = load_summaries(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].outcome.success);
    }
}
