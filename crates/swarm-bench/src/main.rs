use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use swarm_bench::{
    aggregate, artifact, metrics, runner, Arm, BatchRunner, BenchConfig, BenchmarkSummary,
    ChatCompletionsClient, QualityScorer, SummaryFilter,
};

#[derive(Parser)]
#[command(name = "swarm-bench", about = "Monolith-vs-swarm benchmark runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run baseline and swarm for each benchmark task
    Run {
        /// Task list path (defaults to tasks_v1.json / benchmark_v1.json)
        #[arg(long)]
        tasks: Option<PathBuf>,
        /// Only run the first N tasks
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Offline quality scoring over runs/
    Score,
    /// Aggregate run files into results/summary_v1.json
    Aggregate,
    /// Generate the internal evaluation artifact
    Artifact,
    /// Ad-hoc derived metrics from the run-summary log
    Metrics {
        /// Restrict to one arm: monolith | swarm
        #[arg(long)]
        arm: Option<String>,
        /// Restrict to one task bucket
        #[arg(long)]
        bucket: Option<String>,
        /// Restrict to first-pass attempts (retry_count == 0)
        #[arg(long)]
        first_pass: bool,
        /// Summary log to read (defaults to the canonical run-summary log;
        /// pass the batch driver's runs log to inspect a batch)
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = BenchConfig::from_env();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { tasks, limit } => {
            let caller = ChatCompletionsClient::from_config(&config)
                .context("building chat-completions client")?;
            let tasks_path = tasks.unwrap_or_else(|| config.tasks_path.clone());
            let list = runner::load_tasks(&tasks_path)
                .with_context(|| format!("loading tasks from {}", tasks_path.display()))?;
            let mut tasks = list.tasks;
            if let Some(limit) = limit {
                tasks.truncate(limit);
            }
            info!(count = tasks.len(), "starting batch run");
            let count = BatchRunner::new(&config, &caller).run_batch(&tasks).await?;
            info!(count, "batch run complete");
        }
        Command::Score => {
            let caller = ChatCompletionsClient::from_config(&config)
                .context("building chat-completions client")?;
            let prompts: HashMap<String, String> = runner::load_tasks(&config.tasks_path)
                .map(|list| {
                    list.tasks
                        .into_iter()
                        .map(|t| (t.id, t.prompt))
                        .collect()
                })
                .unwrap_or_default();
            let updated = QualityScorer::new(&caller)
                .run(&config.runs_dir, &prompts)
                .await?;
            info!(updated, "quality scoring complete");
        }
        Command::Aggregate => {
            let runs = swarm_bench::load_runs(&config.runs_dir)?;
            let version = aggregate::read_benchmark_version(&config.benchmark_path);
            let summary = aggregate::aggregate(&runs, version);
            aggregate::write_summary(&config, &summary)?;
            info!(task_count = summary.task_count, "aggregation complete");
        }
        Command::Artifact => {
            let summary_path = config.summary_path();
            let text = std::fs::read_to_string(&summary_path).with_context(|| {
                format!(
                    "no summary at {}; run `swarm-bench aggregate` first",
                    summary_path.display()
                )
            })?;
            let summary: BenchmarkSummary =
                serde_json::from_str(&text).context("parsing summary document")?;
            let runs = swarm_bench::load_runs(&config.runs_dir)?;
            let (doc, narrative) = artifact::generate(&summary, &runs);
            artifact::write_artifact(&config, &doc, &narrative)?;
        }
        Command::Metrics {
            arm,
            bucket,
            first_pass,
            log,
        } => {
            let arm = match arm.as_deref() {
                None => None,
                Some("monolith") => Some(Arm::Monolith),
                Some("swarm") => Some(Arm::Swarm),
                Some(other) => bail!("unknown arm {other:?}; expected monolith or swarm"),
            };
            let filter = SummaryFilter {
                arm,
                task_bucket: bucket,
                first_pass_only: first_pass,
            };
            let log = log.unwrap_or_else(|| config.summaries_path.clone());
            let summaries = metrics::load_summaries(&log)?;
            println!("runs matched:                  {}", summaries.len());
            println!(
                "success rate:                  {:.4}",
                metrics::success_rate(&summaries, &filter)
            );
            println!(
                "first-pass success:            {:.4}",
                metrics::first_pass_success(&summaries, &filter)
            );
            println!(
                "tokens per success:            {:.2}",
                metrics::tokens_per_success(&summaries, &filter)
            );
            println!(
                "cost per success (USD):        {:.6}",
                metrics::cost_per_success(&summaries, &filter)
            );
            println!(
                "average quality:               {:.4}",
                metrics::average_quality(&summaries, &filter)
            );
            println!(
                "tool correctness:              {:.4}",
                metrics::tool_correctness(&summaries, &filter)
            );
            println!(
                "policy violation rate:         {:.4}",
                metrics::policy_violation_rate(&summaries, &filter)
            );
            println!(
                "critical hallucination rate:   {:.4}",
                metrics::critical_hallucination_rate(&summaries, &filter)
            );
        }
    }

    Ok(())
}
