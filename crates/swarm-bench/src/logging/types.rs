//! Record schemas for the event log and the run-summary log.
//!
//! Records are immutable once written. Unknown enum values are rejected at
//! deserialization rather than coerced to a catch-all.

use serde::{Deserialize, Serialize};

use super::error::{LogError, LogResult};
use super::ts_utc;

/// One of the two compared strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    /// Single monolithic call.
    Monolith,
    /// Fixed-sequence multi-role pipeline.
    Swarm,
}

impl Arm {
    /// Stable wire name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arm::Monolith => "monolith",
            Arm::Swarm => "swarm",
        }
    }
}

/// Pipeline phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Plan,
    Act,
    Tool,
    Verify,
    Decide,
    Finalize,
}

/// Kind of state transition the event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    ToolCall,
    ToolResult,
    Error,
    Retry,
    Escalation,
    JudgeScore,
    End,
}

/// Exactly one reason per failed run. Closed set; unknown values are a
/// deserialization error, not a new category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PlanningError,
    ToolMisuse,
    Hallucination,
    Timeout,
    ConstraintBreak,
    BudgetExceeded,
    ToolFailure,
}

/// Free-form context attached to every event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Task bucket (difficulty/category label).
    #[serde(default)]
    pub task_bucket: String,
    /// Retry counter at emission time.
    #[serde(default)]
    pub retry_count: u32,
    /// Optional deterministic seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Target agent of a handoff, when the event records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_to: Option<String>,
}

/// One record per state transition. Append-only; ordering within a run is
/// the append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// UTC timestamp, second precision.
    pub ts: String,
    pub run_id: String,
    pub task_id: String,
    pub arm: Arm,
    pub agent_id: String,
    /// Role name within the swarm sequence ("monolith" for the baseline arm).
    pub versonality: String,
    pub phase: Phase,
    pub event: EventKind,
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
    /// Tool name, when the event concerns a tool invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Whether the tool invocation succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_ok: Option<bool>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl Event {
    /// Create an event stamped now, with zero token counts.
    pub fn new(
        run_id: impl Into<String>,
        task_id: impl Into<String>,
        arm: Arm,
        agent_id: impl Into<String>,
        versonality: impl Into<String>,
        phase: Phase,
        event: EventKind,
    ) -> Self {
        Self {
            ts: ts_utc(),
            run_id: run_id.into(),
            task_id: task_id.into(),
            arm,
            agent_id: agent_id.into(),
            versonality: versonality.into(),
            phase,
            event,
            tokens_in: 0,
            tokens_out: 0,
            tool: None,
            tool_ok: None,
            metadata: EventMetadata::default(),
        }
    }

    /// Attach token counts.
    pub fn with_tokens(mut self, tokens_in: u64, tokens_out: u64) -> Self {
        self.tokens_in = tokens_in;
        self.tokens_out = tokens_out;
        self
    }

    /// Attach a tool name and its success flag.
    pub fn with_tool(mut self, tool: impl Into<String>, tool_ok: bool) -> Self {
        self.tool = Some(tool.into());
        self.tool_ok = Some(tool_ok);
        self
    }

    /// Attach the task bucket.
    pub fn with_bucket(mut self, task_bucket: impl Into<String>) -> Self {
        self.metadata.task_bucket = task_bucket.into();
        self
    }

    /// Attach the retry counter.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.metadata.retry_count = retry_count;
        self
    }
}

/// Optional per-run resource budgets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Budgets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_seconds: Option<f64>,
}

/// Run outcome block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    /// Set iff `success` is false.
    pub failure_reason: Option<FailureReason>,
    #[serde(default)]
    pub policy_violation: bool,
    #[serde(default)]
    pub critical_hallucination: bool,
}

/// Score block; both fields start unset and are filled offline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scores {
    /// Quality 0–5.
    pub quality: Option<f64>,
    /// Constraint adherence 0–1.
    #[serde(default)]
    pub constraint_adherence: Option<f64>,
}

/// Resource usage block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub wall_seconds: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    #[serde(default)]
    pub tool_calls: u32,
    #[serde(default)]
    pub tool_calls_ok: u32,
}

/// Swarm-specific coordination stats; absent on the monolith arm and on
/// swarm runs that supplied none of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmStats {
    #[serde(default)]
    pub conflict: bool,
    #[serde(default)]
    pub consensus_seconds: f64,
    #[serde(default)]
    pub handoffs: u32,
    #[serde(default)]
    pub duplicate_work: bool,
}

/// Cost breakdown in USD.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostUsd {
    #[serde(default)]
    pub model: f64,
    #[serde(default)]
    pub tools: f64,
    pub total: f64,
}

/// One record per (run id, arm) pair, written exactly once at the end of
/// that arm's attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub task_id: String,
    pub arm: Arm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub task_bucket: String,
    pub n_agents: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budgets: Option<Budgets>,
    pub outcome: Outcome,
    pub scores: Scores,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm: Option<SwarmStats>,
    pub cost_usd: CostUsd,
    #[serde(default)]
    pub retry_count: u32,
}

impl RunSummary {
    /// Total tokens consumed by this attempt.
    pub fn total_tokens(&self) -> u64 {
        self.usage.tokens_in + self.usage.tokens_out
    }

    /// Enforce the outcome invariant before the record is persisted.
    ///
    /// A failed run without a failure reason is rejected. A successful run
    /// carrying a stray failure reason has the reason cleared: success wins
    /// over a leftover failure code, but only in that direction.
    pub fn validate(&mut self) -> LogResult<()> {
        if !self.outcome.success && self.outcome.failure_reason.is_none() {
            return Err(LogError::Validation(
                "failure_reason must be set when success is false".into(),
            ));
        }
        if self.outcome.success && self.outcome.failure_reason.is_some() {
            self.outcome.failure_reason = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(success: bool, failure_reason: Option<FailureReason>) -> RunSummary {
        RunSummary {
            run_id: "r-1".into(),
            task_id: "t-1".into(),
            arm: Arm::Monolith,
            seed: None,
            task_bucket: "easy".into(),
            n_agents: 1,
            budgets: None,
            outcome: Outcome {
                success,
                failure_reason,
                policy_violation: false,
                critical_hallucination: false,
            },
            scores: Scores::default(),
            usage: Usage {
                wall_seconds: 1.0,
                tokens_in: 10,
                tokens_out: 20,
                tool_calls: 0,
                tool_calls_ok: 0,
            },
            swarm: None,
            cost_usd: CostUsd::default(),
            retry_count: 0,
        }
    }

    #[test]
    fn test_validate_all_outcome_combinations() {
        // success + no reason: fine
        assert!(summary(true, None).validate().is_ok());

        // success + stray reason: silently cleared
        let mut s = summary(true, Some(FailureReason::Timeout));
        s.validate().unwrap();
        assert!(s.outcome.failure_reason.is_none());

        // failure + reason: fine, reason kept
        let mut s = summary(false, Some(FailureReason::Timeout));
        s.validate().unwrap();
        assert_eq!(s.outcome.failure_reason, Some(FailureReason::Timeout));

        // failure + no reason: rejected
        let err = summary(false, None).validate().unwrap_err();
        assert!(matches!(err, LogError::Validation(_)));
    }

    #[test]
    fn test_summary_round_trips_through_json() {
        let mut s = summary(false, Some(FailureReason::BudgetExceeded));
        s.swarm = Some(SwarmStats {
            conflict: true,
            consensus_seconds: 2.5,
            handoffs: 4,
            duplicate_work: false,
        });
        let line = serde_json::to_string(&s).unwrap();
        let back: RunSummary = serde_json::from_str(&line).unwrap();
        assert_eq!(back.run_id, "r-1");
        assert_eq!(back.arm, Arm::Monolith);
        assert_eq!(
            back.outcome.failure_reason,
            Some(FailureReason::BudgetExceeded)
        );
        assert_eq!(back.swarm.as_ref().unwrap().handoffs, 4);
        assert_eq!(back.total_tokens(), 30);
    }

    #[test]
    fn test_unknown_failure_reason_is_rejected() {
        let line = r#"{"run_id":"r","task_id":"t","arm":"swarm","task_bucket":"","n_agents":6,
            "outcome":{"success":false,"failure_reason":"gremlins"},
            "scores":{"quality":null},
            "usage":{"wall_seconds":0,"tokens_in":0,"tokens_out":0},
            "cost_usd":{"total":0},"retry_count":0}"#;
        assert!(serde_json::from_str::<RunSummary>(line).is_err());
    }

    #[test]
    fn test_event_builder_defaults() {
        let e = Event::new(
            "r-1",
            "t-1",
            Arm::Swarm,
            "builder",
            "builder",
            Phase::Act,
            EventKind::Message,
        )
        .with_bucket("hard");

        assert_eq!(e.tokens_in, 0);
        assert_eq!(e.tokens_out, 0);
        assert!(e.tool.is_none());
        assert_eq!(e.metadata.task_bucket, "hard");

        let line = serde_json::to_string(&e).unwrap();
        assert!(line.contains("\"arm\":\"swarm\""));
        assert!(line.contains("\"event\":\"message\""));
        // Unset optionals stay off the wire.
        assert!(!line.contains("tool_ok"));
        assert!(!line.contains("handoff_to"));
    }
}
