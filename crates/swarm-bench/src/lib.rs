//! Monolith-vs-swarm benchmark core.
//!
//! Compares two LLM-invocation strategies — one monolithic call versus a
//! fixed-sequence multi-role ("swarm") pipeline — over a benchmark of
//! tasks, and turns the persisted logs into comparative metrics.
//!
//! The load-bearing pieces:
//! - `logging`: append-only event and run-summary JSONL schemas and writers
//! - `metrics`: read-time derived metrics over the run-summary log
//! - `runfile`: per-task run documents written by the batch driver
//! - `aggregate`: the summary document (success rates, percentiles, ASR,
//!   VPD, coordination overhead, failure histogram)
//! - `artifact`: per-task helped/hurt/neutral classification + narrative
//!
//! The glue around them:
//! - `pipeline`: the two arms over the model-call collaborator
//! - `provider`: an OpenAI-compatible chat-completions client
//! - `scorer`: the offline quality-scoring pass over run files
//! - `runner`: the sequential batch driver
//!
//! # Usage
//!
//! ```bash
//! swarm-bench run          # execute the benchmark, write runs/ + logs
//! swarm-bench score        # offline quality scoring over runs/
//! swarm-bench aggregate    # write results/summary_v1.json
//! swarm-bench artifact     # write the internal evaluation artifact
//! swarm-bench metrics      # ad-hoc queries over the run-summary log
//! ```

pub mod aggregate;
pub mod artifact;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod runfile;
pub mod runner;
pub mod scorer;

// Re-export the key schema types
pub use logging::{
    Arm, Budgets, CostUsd, Event, EventKind, EventLogWriter, EventMetadata, FailureReason,
    LogError, LogResult, Outcome, Phase, RunSummary, Scores, SummaryWriter, SwarmStats, Usage,
};

// Re-export the aggregation surface
pub use aggregate::{
    aggregate, percentile, read_benchmark_version, write_summary, ArmMetrics, BenchmarkSummary,
    CoordinationOverhead, Deltas, FailureBucket, WallTimePercentiles,
};

// Re-export the reader surface
pub use metrics::{load_summaries, SummaryFilter};

// Re-export the run-file store
pub use runfile::{load_runs, save_run, RunFile, RunMetrics};

// Re-export the evaluation artifact surface
pub use artifact::{classify, generate, write_artifact, Classification, EvaluationArtifact};

// Re-export the collaborator boundary
pub use pipeline::{ChatMessage, ModelCaller, ModelError, ModelReply, PipelineError};

pub use config::BenchConfig;
pub use provider::ChatCompletionsClient;
pub use runner::{load_tasks, map_failure_reason, BatchRunner, Task, TaskList};
pub use scorer::{parse_scores, QualityScorer};
