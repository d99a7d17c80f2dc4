//! Offline quality scorer.
//!
//! Grades each present arm output against a two-number rubric (quality 0–5,
//! constraint adherence 0–1) via the model-call collaborator and writes the
//! scores back into the run file. Scoring is best-effort and idempotent:
//! a failed call or unparseable reply leaves existing values untouched, and
//! re-running with the same replies yields identical files.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::logging::LogResult;
use crate::pipeline::{ChatMessage, ModelCaller};
use crate::runfile::{load_runs, save_run, RunFile};

const EVAL_SYSTEM: &str = "\
You are an evaluator. Reply with exactly two numbers on one line: quality constraint_adherence.
- quality: 0 to 5 (5 = excellent, correct, complete; 0 = wrong or empty).
- constraint_adherence: 0 to 1 (1 = fully followed instructions/constraints; 0 = ignored).
Output format: two numbers separated by a space, e.g. 4.0 0.95";

const TASK_TRUNCATE: usize = 2000;
const OUTPUT_TRUNCATE: usize = 4000;

/// Numeric tokens (integers and decimals) within a grading reply.
static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\.?[0-9]*").unwrap());

/// Pull the first two numeric tokens out of a grading reply.
///
/// Permissive scan: accepts integers and decimals anywhere in the text.
/// Quality is clamped to [0, 5], adherence to [0, 1], both rounded to two
/// decimal places. Fewer than two tokens → None.
pub fn parse_scores(reply: &str) -> Option<(f64, f64)> {
    // Two numeric tokens is the contract; the pattern tolerates whatever
    // prose the model wraps them in.
    let mut numbers = NUMBER_PATTERN
        .find_iter(reply.trim())
        .filter_map(|m| m.as_str().parse::<f64>().ok());
    let quality = numbers.next()?;
    let adherence = numbers.next()?;
    Some((
        round2(quality.clamp(0.0, 5.0)),
        round2(adherence.clamp(0.0, 1.0)),
    ))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Grades run-file outputs through the collaborator.
pub struct QualityScorer<'a> {
    caller: &'a dyn ModelCaller,
}

impl<'a> QualityScorer<'a> {
    pub fn new(caller: &'a dyn ModelCaller) -> Self {
        Self { caller }
    }

    /// Score one output. None on empty output, call failure, or parse
    /// failure — never an error.
    async fn score_output(
        &self,
        task_prompt: &str,
        output: &str,
        arm_label: &str,
    ) -> Option<(f64, f64)> {
        if output.trim().is_empty() {
            return None;
        }
        let user = format!(
            "Task:\n{}\n\nOutput ({}):\n{}\n\nScore quality 0-5 and constraint_adherence 0-1. One line: quality constraint_adherence",
            truncate(task_prompt, TASK_TRUNCATE),
            arm_label,
            truncate(output, OUTPUT_TRUNCATE),
        );
        let messages = [ChatMessage::system(EVAL_SYSTEM), ChatMessage::user(user)];
        match self.caller.complete(&messages).await {
            Ok(reply) => parse_scores(&reply.content),
            Err(e) => {
                warn!(arm = arm_label, error = %e, "grading call failed; keeping existing score");
                None
            }
        }
    }

    /// Update one run's per-arm scores in place for each present output.
    /// Fields are only written when a fresh score parsed successfully.
    pub async fn evaluate_run(&self, run: &mut RunFile, task_prompt: &str) {
        if let Some(output) = run.baseline_output.clone() {
            if let Some((q, c)) = self.score_output(task_prompt, &output, "baseline").await {
                run.metrics.baseline_quality_score = Some(q);
                run.metrics.baseline_constraint_adherence = Some(c);
            }
        }
        if let Some(output) = run.swarm_output.clone() {
            if let Some((q, c)) = self.score_output(task_prompt, &output, "swarm").await {
                run.metrics.swarm_quality_score = Some(q);
                run.metrics.swarm_constraint_adherence = Some(c);
            }
        }
    }

    /// Score every run file under `runs_dir`, rewriting each in place.
    /// Returns the number of run files updated.
    pub async fn run(
        &self,
        runs_dir: impl AsRef<Path>,
        prompts_by_task: &HashMap<String, String>,
    ) -> LogResult<usize> {
        let runs_dir = runs_dir.as_ref();
        let mut updated = 0;
        for mut run in load_runs(runs_dir)? {
            let prompt = prompts_by_task
                .get(&run.task_id)
                .map(String::as_str)
                .unwrap_or("");
            self.evaluate_run(&mut run, prompt).await;
            save_run(runs_dir, &run)?;
            updated += 1;
        }
        info!(updated, dir = %runs_dir.display(), "quality scoring pass complete");
        Ok(updated)
    }
}
