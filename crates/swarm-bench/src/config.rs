//! Benchmark configuration.
//!
//! All file paths and model settings are resolved from the environment once
//! at process start and passed by reference to every component that needs
//! them. No module-level mutable path state.

use std::path::PathBuf;

/// Top-level benchmark configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Append-only event log (one JSON line per state transition).
    pub events_path: PathBuf,
    /// Append-only run-summary log used by the metrics reader.
    pub summaries_path: PathBuf,
    /// Append-only run-summary log written by the batch driver.
    pub runs_log_path: PathBuf,
    /// Directory holding one run file per task id.
    pub runs_dir: PathBuf,
    /// Directory for the summary document and evaluation artifact.
    pub results_dir: PathBuf,
    /// Benchmark task list (tasks_v1.json, falling back to benchmark_v1.json).
    pub tasks_path: PathBuf,
    /// Benchmark manifest carrying the version string.
    pub benchmark_path: PathBuf,
    /// Model identifier passed to the chat-completions endpoint.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Input cost in USD per million tokens.
    pub cost_input_per_1m: f64,
    /// Output cost in USD per million tokens.
    pub cost_output_per_1m: f64,
    /// Provider API key (None until `SWARM_API_KEY` is set).
    pub api_key: Option<String>,
    /// Provider base URL (OpenAI-compatible chat completions).
    pub base_url: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl BenchConfig {
    /// Build the configuration from the environment, with fixed relative
    /// defaults for every path override that is absent.
    pub fn from_env() -> Self {
        let tasks_path = if PathBuf::from("tasks_v1.json").is_file() {
            PathBuf::from("tasks_v1.json")
        } else {
            PathBuf::from("benchmark_v1.json")
        };
        Self {
            events_path: env_path("SWARM_EVENTS_PATH", "logs/events.jsonl"),
            summaries_path: env_path("SWARM_SUMMARIES_PATH", "logs/run_summaries.jsonl"),
            runs_log_path: env_path("SWARM_RUNS_PATH", "logs/runs.jsonl"),
            runs_dir: env_path("SWARM_RUNS_DIR", "runs"),
            results_dir: env_path("SWARM_RESULTS_DIR", "results"),
            tasks_path,
            benchmark_path: PathBuf::from("benchmark_v1.json"),
            model: std::env::var("SWARM_MODEL")
                .unwrap_or_else(|_| "llama-3.1-8b-instant".into()),
            temperature: env_f64("SWARM_TEMPERATURE", 0.0),
            cost_input_per_1m: env_f64("SWARM_COST_INPUT_PER_1M", 0.05),
            cost_output_per_1m: env_f64("SWARM_COST_OUTPUT_PER_1M", 0.10),
            api_key: std::env::var("SWARM_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: std::env::var("SWARM_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".into()),
        }
    }

    /// Path of the summary document written by the aggregator.
    pub fn summary_path(&self) -> PathBuf {
        self.results_dir.join("summary_v1.json")
    }

    /// Path of the structured evaluation artifact.
    pub fn artifact_json_path(&self) -> PathBuf {
        self.results_dir.join("internal_evaluation.json")
    }

    /// Path of the narrative evaluation artifact.
    pub fn artifact_text_path(&self) -> PathBuf {
        self.results_dir.join("internal_evaluation.txt")
    }

    /// Cost in USD for a single call at the configured per-million rates.
    pub fn cost_usd(&self, tokens_in: u64, tokens_out: u64) -> f64 {
        (tokens_in as f64 * self.cost_input_per_1m + tokens_out as f64 * self.cost_output_per_1m)
            / 1e6
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
