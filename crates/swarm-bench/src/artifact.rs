//! Internal evaluation artifact: where the swarm arm helped or hurt.
//!
//! Derived from the summary document plus all run files. The per-task
//! classification is a token-count heuristic, a proxy for value rather than
//! a quality judgment; that limitation is deliberate and documented.

use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{BenchmarkSummary, CoordinationOverhead, Deltas, FailureBucket};
use crate::config::BenchConfig;
use crate::logging::{ts_utc, LogResult};
use crate::runfile::RunFile;

/// Which way a task moved for the swarm arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Helped,
    Hurt,
    Neutral,
}

/// One classified task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedTask {
    pub task_id: String,
    pub task_bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Cost/efficiency tradeoff block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEfficiency {
    pub swarm_uses_more_tokens: bool,
    pub token_delta: Option<f64>,
    pub baseline_avg_tokens: Option<f64>,
    pub swarm_avg_tokens: Option<f64>,
}

/// Structured evaluation artifact, overwritten wholesale on each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationArtifact {
    pub generated_at: String,
    pub benchmark_version: String,
    pub task_count: usize,
    pub deltas: Deltas,
    pub vpd_asr: Option<f64>,
    pub coordination_overhead: Option<CoordinationOverhead>,
    pub where_versonalities_helped: Vec<ClassifiedTask>,
    pub where_versonalities_hurt: Vec<ClassifiedTask>,
    pub neutral: Vec<ClassifiedTask>,
    pub cost_efficiency_tradeoff: CostEfficiency,
    pub notable_failures: BTreeMap<String, FailureBucket>,
}

/// Classify one run for the swarm arm. First matching rule wins:
/// 1. swarm succeeded where baseline failed → helped
/// 2. baseline succeeded where swarm failed → hurt
/// 3. both succeeded, swarm used fewer tokens → helped
/// 4. both succeeded, swarm used more tokens → hurt
/// 5. otherwise → neutral
pub fn classify(run: &RunFile) -> (Classification, Option<&'static str>) {
    let baseline_ok = run.baseline_output.is_some();
    let swarm_ok = run.swarm_output.is_some();
    let baseline_tokens = run.metrics.baseline_tokens_used.unwrap_or(0);
    let swarm_tokens = run.metrics.swarm_tokens_used.unwrap_or(0);

    match (baseline_ok, swarm_ok) {
        (false, true) => (Classification::Helped, Some("swarm_success_baseline_failed")),
        (true, false) => (Classification::Hurt, Some("baseline_success_swarm_failed")),
        (true, true) if swarm_tokens < baseline_tokens => {
            (Classification::Helped, Some("swarm_fewer_tokens"))
        }
        (true, true) if swarm_tokens > baseline_tokens => {
            (Classification::Hurt, Some("swarm_more_tokens"))
        }
        _ => (Classification::Neutral, None),
    }
}

/// Build the artifact and its narrative rendering.
pub fn generate(summary: &BenchmarkSummary, runs: &[RunFile]) -> (EvaluationArtifact, String) {
    let mut helped = Vec::new();
    let mut hurt = Vec::new();
    let mut neutral = Vec::new();

    for run in runs {
        let (classification, reason) = classify(run);
        let entry = ClassifiedTask {
            task_id: run.task_id.clone(),
            task_bucket: run.task_bucket.clone(),
            reason: reason.map(str::to_string),
        };
        match classification {
            Classification::Helped => helped.push(entry),
            Classification::Hurt => hurt.push(entry),
            Classification::Neutral => neutral.push(entry),
        }
    }

    let token_delta = summary
        .deltas
        .token_cost_delta
        .or_else(|| summary.coordination_overhead.as_ref().map(|o| o.token_delta));
    let baseline_avg = summary
        .baseline_metrics
        .as_ref()
        .and_then(|m| m.avg_tokens_used);
    let swarm_avg = summary
        .swarm_metrics
        .as_ref()
        .and_then(|m| m.avg_tokens_used);

    let artifact = EvaluationArtifact {
        generated_at: ts_utc(),
        benchmark_version: summary.benchmark_version.clone(),
        task_count: summary.task_count,
        deltas: summary.deltas.clone(),
        vpd_asr: summary.vpd_asr,
        coordination_overhead: summary.coordination_overhead.clone(),
        where_versonalities_helped: helped,
        where_versonalities_hurt: hurt,
        neutral,
        cost_efficiency_tradeoff: CostEfficiency {
            swarm_uses_more_tokens: token_delta.map_or(false, |d| d > 0.0),
            token_delta,
            baseline_avg_tokens: baseline_avg,
            swarm_avg_tokens: swarm_avg,
        },
        notable_failures: summary.notable_failures.clone(),
    };

    let narrative = render_narrative(&artifact);
    (artifact, narrative)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

fn task_ids(entries: &[ClassifiedTask]) -> String {
    let ids: Vec<&str> = entries.iter().map(|e| e.task_id.as_str()).collect();
    format!("{:?}", ids)
}

/// Human-readable rendering of the same data.
fn render_narrative(artifact: &EvaluationArtifact) -> String {
    let mut report = String::new();

    report.push_str("Internal evaluation artifact (Evaluation Spec v0.1)\n");
    report.push_str(&format!("Generated: {}\n\n", artifact.generated_at));

    report.push_str("Deltas:\n");
    report.push_str(&format!(
        "  Quality delta: {}\n",
        fmt_opt(artifact.deltas.quality_delta)
    ));
    report.push_str(&format!(
        "  Token cost delta (swarm - baseline): {}\n",
        fmt_opt(artifact.deltas.token_cost_delta)
    ));
    report.push_str(&format!("  VPD (ASR delta): {}\n\n", fmt_opt(artifact.vpd_asr)));

    report.push_str("Cost/efficiency:\n");
    report.push_str(&format!(
        "  Swarm uses more tokens: {}\n",
        artifact.cost_efficiency_tradeoff.swarm_uses_more_tokens
    ));
    report.push_str(&format!(
        "  Baseline avg tokens: {}\n",
        fmt_opt(artifact.cost_efficiency_tradeoff.baseline_avg_tokens)
    ));
    report.push_str(&format!(
        "  Swarm avg tokens: {}\n\n",
        fmt_opt(artifact.cost_efficiency_tradeoff.swarm_avg_tokens)
    ));

    report.push_str(&format!(
        "Where versonalities helped (task_ids): {}\n",
        task_ids(&artifact.where_versonalities_helped)
    ));
    report.push_str(&format!(
        "Where versonalities hurt (task_ids): {}\n",
        task_ids(&artifact.where_versonalities_hurt)
    ));
    report.push_str(&format!(
        "Neutral (task_ids): {}\n\n",
        task_ids(&artifact.neutral)
    ));

    report.push_str("Notable failures:\n");
    if artifact.notable_failures.is_empty() {
        report.push_str("  none\n");
    } else {
        for (error_type, bucket) in &artifact.notable_failures {
            report.push_str(&format!(
                "  {}: {} ({:?})\n",
                error_type, bucket.count, bucket.task_ids
            ));
        }
    }

    report
}

/// Write both renderings, replacing any previous versions.
pub fn write_artifact(
    config: &BenchConfig,
    artifact: &EvaluationArtifact,
    narrative: &str,
) -> LogResult<()> {
    fs::create_dir_all(&config.results_dir)?;
    fs::write(
        config.artifact_json_path(),
        serde_json::to_string_pretty(artifact)?,
    )?;
    fs::write(config.artifact_text_path(), narrative)?;
    info!(
        json = %config.artifact_json_path().display(),
        text = %config.artifact_text_path().display(),
        "wrote evaluation artifact"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::runfile::RunMetrics;

    fn run(
        task_id: &str,
        baseline: Option<&str>,
        swarm: Option<&str>,
        baseline_tokens: Option<u64>,
        swarm_tokens: Option<u64>,
    ) -> RunFile {
        RunFile {
            task_id: task_id.into(),
            task_bucket: "easy".into(),
            baseline_output: baseline.map(str::to_string),
            swarm_output: swarm.map(str::to_string),
            metrics: RunMetrics {
                baseline_tokens_used: baseline_tokens,
                swarm_tokens_used: swarm_tokens,
                ..RunMetrics::default()
            },
        }
    }

    #[test]
    fn test_classification_priority_order() {
        // Rule 1: swarm succeeded where baseline failed.
        let (c, r) = classify(&run("t", None, Some("x"), None, Some(9999)));
        assert_eq!(c, Classification::Helped);
        assert_eq!(r, Some("swarm_success_baseline_failed"));

        // Rule 2: baseline succeeded where swarm failed.
        let (c, r) = classify(&run("t", Some("x"), None, Some(1), None));
        assert_eq!(c, Classification::Hurt);
        assert_eq!(r, Some("baseline_success_swarm_failed"));

        // Rule 3: both present, swarm cheaper.
        let (c, r) = classify(&run("t", Some("x"), Some("y"), Some(500), Some(300)));
        assert_eq!(c, Classification::Helped);
        assert_eq!(r, Some("swarm_fewer_tokens"));

        // Rule 4: both present, swarm dearer.
        let (c, r) = classify(&run("t", Some("x"), Some("y"), Some(500), Some(800)));
        assert_eq!(c, Classification::Hurt);
        assert_eq!(r, Some("swarm_more_tokens"));

        // Rule 5: equal tokens → neutral; both absent → neutral.
        let (c, _) = classify(&run("t", Some("x"), Some("y"), Some(500), Some(500)));
        assert_eq!(c, Classification::Neutral);
        let (c, _) = classify(&run("t", None, None, None, None));
        assert_eq!(c, Classification::Neutral);
    }

    #[test]
    fn test_every_task_lands_in_exactly_one_bucket() {
        let runs = vec![
            run("t1", None, Some("x"), None, Some(10)),
            run("t2", Some("x"), None, Some(10), None),
            run("t3", Some("x"), Some("y"), Some(500), Some(300)),
            run("t4", Some("x"), Some("y"), Some(500), Some(800)),
            run("t5", Some("x"), Some("y"), Some(500), Some(500)),
            run("t6", None, None, None, None),
        ];
        let summary = aggregate(&runs, "sv-v1".into());
        let (artifact, _) = generate(&summary, &runs);

        let total = artifact.where_versonalities_helped.len()
            + artifact.where_versonalities_hurt.len()
            + artifact.neutral.len();
        assert_eq!(total, runs.len());

        let mut all_ids: Vec<&str> = artifact
            .where_versonalities_helped
            .iter()
            .chain(&artifact.where_versonalities_hurt)
            .chain(&artifact.neutral)
            .map(|e| e.task_id.as_str())
            .collect();
        all_ids.sort_unstable();
        all_ids.dedup();
        assert_eq!(all_ids.len(), runs.len());
    }

    #[test]
    fn test_narrative_carries_the_key_figures() {
        let runs = vec![run("t1", Some("x"), Some("y"), Some(500), Some(800))];
        let summary = aggregate(&runs, "sv-v1".into());
        let (artifact, narrative) = generate(&summary, &runs);

        assert_eq!(artifact.task_count, 1);
        assert!(artifact.cost_efficiency_tradeoff.swarm_uses_more_tokens);
        assert!(narrative.contains("Token cost delta (swarm - baseline): 300"));
        assert!(narrative.contains("Where versonalities hurt (task_ids): [\"t1\"]"));
    }

    #[test]
    fn test_artifact_round_trips_through_json() {
        let runs = vec![run("t1", None, Some("x"), None, Some(10))];
        let summary = aggregate(&runs, "sv-v1".into());
        let (artifact, _) = generate(&summary, &runs);

        let json = serde_json::to_string_pretty(&artifact).unwrap();
        let back: EvaluationArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back.where_versonalities_helped.len(), 1);
        assert_eq!(
            back.where_versonalities_helped[0].reason.as_deref(),
            Some("swarm_success_baseline_failed")
        );
    }
}
