//! Append-only JSONL writers for events and run summaries.
//!
//! Each append creates parent directories on demand, opens the file in
//! append mode, writes one serialized line, flushes, and closes. I/O errors
//! propagate to the caller; events are never best-effort-swallowed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::error::LogResult;
use super::types::{Event, RunSummary};

/// Serialize one record and append it as a single line.
fn append_line<T: Serialize>(path: &Path, record: &T) -> LogResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.flush()?;
    Ok(())
}

/// Appends one event per state transition to the shared event log.
pub struct EventLogWriter {
    path: PathBuf,
}

impl EventLogWriter {
    /// Create a writer for the given log path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append one event. Safe for single-writer sequential use only.
    pub fn append(&self, event: &Event) -> LogResult<()> {
        append_line(&self.path, event)?;
        debug!(run_id = %event.run_id, event = ?event.event, "event appended");
        Ok(())
    }
}

/// Appends one run summary per completed attempt.
pub struct SummaryWriter {
    path: PathBuf,
}

impl SummaryWriter {
    /// Create a writer for the given summary log path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Validate the outcome invariant, then append one summary.
    ///
    /// Rejects with a validation error before anything is persisted when
    /// `success` is false and no failure reason was supplied.
    pub fn append(&self, mut summary: RunSummary) -> LogResult<()> {
        summary.validate()?;
        append_line(&self.path, &summary)?;
        debug!(
            run_id = %summary.run_id,
            arm = summary.arm.as_str(),
            success = summary.outcome.success,
            "run summary appended"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::types::{
        Arm, CostUsd, EventKind, FailureReason, Outcome, Phase, Scores, Usage,
    };
    use tempfile::tempdir;

    fn summary(success: bool, failure_reason: Option<FailureReason>) -> RunSummary {
        RunSummary {
            run_id: "r-1".into(),
            task_id: "t-1".into(),
            arm: Arm::Swarm,
            seed: None,
            task_bucket: "easy".into(),
            n_agents: 6,
            budgets: None,
            outcome: Outcome {
                success,
                failure_reason,
                policy_violation: false,
                critical_hallucination: false,
            },
            scores: Scores::default(),
            usage: Usage {
                wall_seconds: 0.5,
                tokens_in: 100,
                tokens_out: 200,
                tool_calls: 0,
                tool_calls_ok: 0,
            },
            swarm: None,
            cost_usd: CostUsd::default(),
            retry_count: 0,
        }
    }

    #[test]
    fn test_event_append_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/logs/events.jsonl");
        let writer = EventLogWriter::new(&path);

        let e = Event::new(
            "r-1",
            "t-1",
            Arm::Monolith,
            "monolith",
            "monolith",
            Phase::Act,
            EventKind::Message,
        );
        writer.append(&e).unwrap();
        writer.append(&e.clone().with_tokens(5, 7)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let _: Event = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn test_summary_invariant_rejected_before_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run_summaries.jsonl");
        let writer = SummaryWriter::new(&path);

        let err = writer.append(summary(false, None)).unwrap_err();
        assert!(matches!(err, crate::logging::LogError::Validation(_)));
        // Nothing persisted.
        assert!(!path.exists());
    }

    #[test]
    fn test_stray_failure_reason_cleared_on_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run_summaries.jsonl");
        let writer = SummaryWriter::new(&path);

        writer
            .append(summary(true, Some(FailureReason::Timeout)))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let back: RunSummary = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert!(back.outcome.success);
        assert!(back.outcome.failure_reason.is_none());
    }

    #[test]
    fn test_summary_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run_summaries.jsonl");
        let writer = SummaryWriter::new(&path);

        let original = summary(false, Some(FailureReason::ToolFailure));
        writer.append(original.clone()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let back: RunSummary = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(back.run_id, original.run_id);
        assert_eq!(back.usage.tokens_in, original.usage.tokens_in);
        assert_eq!(
            back.outcome.failure_reason,
            Some(FailureReason::ToolFailure)
        );
    }
}
