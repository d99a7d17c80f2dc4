//! Batch driver: run baseline and swarm for each benchmark task.
//!
//! Strictly sequential: one task is fully processed (both arms, baseline
//! first) before the next begins. No retries, no parallelism, no
//! cancellation. A collaborator failure is recorded as a per-arm failure
//! and the batch proceeds; an unwritable log aborts the batch.

use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BenchConfig;
use crate::logging::{
    Arm, CostUsd, EventLogWriter, FailureReason, LogError, LogResult, Outcome, RunSummary, Scores,
    SummaryWriter, Usage,
};
use crate::pipeline::{self, ArmResult, ModelCaller, PipelineError, SWARM_ROLES};
use crate::runfile::{save_run, RunFile, RunMetrics};

/// One benchmark task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub task_bucket: String,
    pub prompt: String,
}

/// The benchmark task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub benchmark_version: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Load the benchmark task list.
pub fn load_tasks(path: impl AsRef<Path>) -> LogResult<TaskList> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Best-effort mapping from a collaborator error name to a failure reason.
pub fn map_failure_reason(error_name: &str) -> FailureReason {
    let name = error_name.to_lowercase();
    if name.contains("timeout") {
        FailureReason::Timeout
    } else if name.contains("budget") {
        FailureReason::BudgetExceeded
    } else if name.contains("tool") {
        FailureReason::ToolFailure
    } else {
        FailureReason::PlanningError
    }
}

/// Outcome of one arm's attempt within a task.
struct ArmAttempt {
    result: Option<ArmResult>,
    error_type: Option<&'static str>,
    wall_seconds: f64,
}

impl ArmAttempt {
    fn tokens(&self) -> (u64, u64) {
        self.result
            .as_ref()
            .map_or((0, 0), |r| (r.tokens_in, r.tokens_out))
    }
}

/// Runs the benchmark over the configured collaborator.
pub struct BatchRunner<'a> {
    config: &'a BenchConfig,
    caller: &'a dyn ModelCaller,
    events: EventLogWriter,
    summaries: SummaryWriter,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a BenchConfig, caller: &'a dyn ModelCaller) -> Self {
        Self {
            config,
            caller,
            events: EventLogWriter::new(&config.events_path),
            summaries: SummaryWriter::new(&config.runs_log_path),
        }
    }

    /// Run every task in the list, writing one run file per task plus two
    /// run summaries (one per arm).
    pub async fn run_batch(&self, tasks: &[Task]) -> LogResult<usize> {
        for task in tasks {
            let run = self.run_task(task).await?;
            save_run(&self.config.runs_dir, &run)?;
            info!(
                task_id = %run.task_id,
                success = run.metrics.success,
                "wrote run file"
            );
        }
        Ok(tasks.len())
    }

    /// Run both arms for one task and emit the run summaries.
    pub async fn run_task(&self, task: &Task) -> LogResult<RunFile> {
        let run_id = Uuid::new_v4().to_string();

        let baseline = self
            .attempt(
                pipeline::run_baseline(
                    self.caller,
                    Some(&self.events),
                    &task.prompt,
                    &run_id,
                    &task.id,
                    &task.task_bucket,
                ),
                Arm::Monolith,
                &task.id,
            )
            .await?;

        // The swarm arm is only attempted when the baseline did not raise;
        // a skipped swarm inherits the baseline's error for its reason.
        let swarm = if baseline.error_type.is_none() {
            self.attempt(
                pipeline::run_swarm(
                    self.caller,
                    Some(&self.events),
                    &task.prompt,
                    &run_id,
                    &task.id,
                    &task.task_bucket,
                ),
                Arm::Swarm,
                &task.id,
            )
            .await?
        } else {
            ArmAttempt {
                result: None,
                error_type: None,
                wall_seconds: 0.0,
            }
        };

        let baseline_reason = baseline.error_type.map(map_failure_reason);
        let swarm_reason = swarm
            .error_type
            .or(baseline.error_type)
            .map(map_failure_reason);

        let (baseline_in, baseline_out) = baseline.tokens();
        let (swarm_in, swarm_out) = swarm.tokens();

        self.summaries.append(self.summary(
            &run_id,
            task,
            Arm::Monolith,
            1,
            baseline.result.is_some(),
            baseline_reason,
            baseline.wall_seconds,
            baseline_in,
            baseline_out,
        ))?;
        self.summaries.append(self.summary(
            &run_id,
            task,
            Arm::Swarm,
            SWARM_ROLES.len() as u32,
            swarm.result.is_some(),
            swarm_reason,
            swarm.wall_seconds,
            swarm_in,
            swarm_out,
        ))?;

        let baseline_tokens = baseline.result.as_ref().map(|_| baseline_in + baseline_out);
        let swarm_tokens = swarm.result.as_ref().map(|_| swarm_in + swarm_out);
        let wall_time_seconds = baseline.wall_seconds + swarm.wall_seconds;

        Ok(RunFile {
            task_id: task.id.clone(),
            task_bucket: task.task_bucket.clone(),
            baseline_output: baseline.result.map(|r| r.content),
            swarm_output: swarm.result.map(|r| r.content),
            metrics: RunMetrics {
                success: baseline_tokens.is_some() && swarm_tokens.is_some(),
                wall_time_seconds: (wall_time_seconds * 10_000.0).round() / 10_000.0,
                tokens_used: baseline_tokens.unwrap_or(0) + swarm_tokens.unwrap_or(0),
                baseline_tokens_used: baseline_tokens,
                swarm_tokens_used: swarm_tokens,
                error_type: baseline
                    .error_type
                    .or(swarm.error_type)
                    .map(str::to_string),
                ..RunMetrics::default()
            },
        })
    }

    /// Drive one arm, timing it and splitting collaborator failures (kept,
    /// recorded) from log failures (propagated).
    async fn attempt(
        &self,
        arm: impl std::future::Future<Output = Result<ArmResult, PipelineError>>,
        which: Arm,
        task_id: &str,
    ) -> Result<ArmAttempt, LogError> {
        let start = Instant::now();
        let outcome = arm.await;
        let wall_seconds = start.elapsed().as_secs_f64();
        match outcome {
            Ok(result) => Ok(ArmAttempt {
                result: Some(result),
                error_type: None,
                wall_seconds,
            }),
            Err(PipelineError::Model(e)) => {
                warn!(task_id, arm = which.as_str(), error = %e, "arm failed");
                Ok(ArmAttempt {
                    result: None,
                    error_type: Some(e.kind_name()),
                    wall_seconds,
                })
            }
            Err(PipelineError::Log(e)) => Err(e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn summary(
        &self,
        run_id: &str,
        task: &Task,
        arm: Arm,
        n_agents: u32,
        success: bool,
        failure_reason: Option<FailureReason>,
        wall_seconds: f64,
        tokens_in: u64,
        tokens_out: u64,
    ) -> RunSummary {
        RunSummary {
            run_id: run_id.to_string(),
            task_id: task.id.clone(),
            arm,
            seed: None,
            task_bucket: task.task_bucket.clone(),
            n_agents,
            budgets: None,
            outcome: Outcome {
                success,
                failure_reason,
                policy_violation: false,
                critical_hallucination: false,
            },
            scores: Scores::default(),
            usage: Usage {
                wall_seconds,
                tokens_in,
                tokens_out,
                tool_calls: 0,
                tool_calls_ok: 0,
            },
            swarm: None,
            cost_usd: CostUsd {
                model: self.config.cost_usd(tokens_in, tokens_out),
                tools: 0.0,
                total: self.config.cost_usd(tokens_in, tokens_out),
            },
            retry_count: 0,
        }
    }
}
