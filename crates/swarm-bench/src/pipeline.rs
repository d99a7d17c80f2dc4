//! Monolith and swarm arms over the model-call collaborator.
//!
//! Both arms are synchronous flows: one task is fully processed before the
//! next begins, and each call blocks until the collaborator returns or
//! fails. The collaborator's retry/timeout behavior is its own business;
//! here it is a dependency that may fail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{Arm, Event, EventKind, EventLogWriter, LogError, Phase};

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Generated text plus normalized token counts.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub content: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Failure at the collaborator boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("SWARM_API_KEY is not set; export it to call the model API")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl ModelError {
    /// Short type name used as the run file's error_type and as input to
    /// the best-effort failure-reason mapping.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ModelError::MissingApiKey => "ConfigError",
            ModelError::Http(e) if e.is_timeout() => "TimeoutError",
            ModelError::Http(_) => "APIError",
            ModelError::Decode(_) => "DecodeError",
        }
    }
}

/// The model-call collaborator: given an ordered list of role-tagged
/// messages, return generated text plus token counts.
#[async_trait]
pub trait ModelCaller: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelReply, ModelError>;
}

/// Error from running one arm: either the collaborator failed (recorded as
/// a per-arm failure) or the event log was unwritable (propagated).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Shared system prompt enforcing the one-role-at-a-time workflow.
pub const SWARM_SYSTEM_PROMPT: &str = "\
You are part of a Swarm Versonalities v1 workflow. Follow these rules strictly:

1. Use exactly ONE versonality at a time
2. Do NOT skip roles in the sequence
3. Planner: Create a plan but do NOT solve the task
4. Analyst: Analyze requirements but do NOT draft output
5. Builder: Create the actual output
6. Critic: Review and provide feedback but do NOT rewrite
7. Editor: Produce the final clean artifact

Current role will be specified in each message.";

/// One stage of the fixed swarm sequence.
#[derive(Debug, Clone, Copy)]
pub struct SwarmRole {
    pub agent_id: &'static str,
    pub phase: Phase,
    pub role_name: &'static str,
    pub instruction: &'static str,
}

/// The fixed role sequence: Planner → Analyst → Builder → Critic →
/// Builder (revise) → Editor.
pub const SWARM_ROLES: &[SwarmRole] = &[
    SwarmRole {
        agent_id: "planner",
        phase: Phase::Plan,
        role_name: "PLANNER",
        instruction: "Create a plan for completing this task. Do NOT solve it.",
    },
    SwarmRole {
        agent_id: "analyst",
        phase: Phase::Decide,
        role_name: "ANALYST",
        instruction: "Analyze the requirements and plan. Do NOT draft any output.",
    },
    SwarmRole {
        agent_id: "builder",
        phase: Phase::Act,
        role_name: "BUILDER",
        instruction: "Create the actual output based on the plan and analysis.",
    },
    SwarmRole {
        agent_id: "critic",
        phase: Phase::Verify,
        role_name: "CRITIC",
        instruction: "Review the output and provide feedback. Do NOT rewrite it.",
    },
    SwarmRole {
        agent_id: "builder2",
        phase: Phase::Act,
        role_name: "BUILDER",
        instruction: "Revise the output based on the critic's feedback.",
    },
    SwarmRole {
        agent_id: "editor",
        phase: Phase::Finalize,
        role_name: "EDITOR",
        instruction:
            "Produce the final clean artifact. Output ONLY the final result, no meta-commentary.",
    },
];

/// Result of one arm's attempt.
#[derive(Debug, Clone)]
pub struct ArmResult {
    pub content: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Monolithic arm: one call, no versonalities.
pub async fn run_baseline(
    caller: &dyn ModelCaller,
    events: Option<&EventLogWriter>,
    task: &str,
    run_id: &str,
    task_id: &str,
    task_bucket: &str,
) -> Result<ArmResult, PipelineError> {
    if let Some(events) = events {
        events.append(
            &Event::new(
                run_id,
                task_id,
                Arm::Monolith,
                "monolith",
                "monolith",
                Phase::Act,
                EventKind::Message,
            )
            .with_bucket(task_bucket),
        )?;
    }

    let reply = caller.complete(&[ChatMessage::user(task)]).await?;

    if let Some(events) = events {
        events.append(
            &Event::new(
                run_id,
                task_id,
                Arm::Monolith,
                "monolith",
                "monolith",
                Phase::Act,
                EventKind::End,
            )
            .with_tokens(reply.tokens_in, reply.tokens_out)
            .with_bucket(task_bucket),
        )?;
    }

    Ok(ArmResult {
        content: reply.content,
        tokens_in: reply.tokens_in,
        tokens_out: reply.tokens_out,
    })
}

/// Swarm arm: the fixed role sequence over one growing conversation.
/// Returns the editor's final content plus summed token counts.
pub async fn run_swarm(
    caller: &dyn ModelCaller,
    events: Option<&EventLogWriter>,
    task: &str,
    run_id: &str,
    task_id: &str,
    task_bucket: &str,
) -> Result<ArmResult, PipelineError> {
    let mut conversation = vec![ChatMessage::system(SWARM_SYSTEM_PROMPT)];
    let mut total_in = 0u64;
    let mut total_out = 0u64;
    let mut final_content = String::new();

    for role in SWARM_ROLES {
        // Only the planner sees the raw task; everyone else works from the
        // conversation so far.
        let user_content = if role.agent_id == "planner" {
            format!(
                "Role: {}\n\nTask: {}\n\n{}",
                role.role_name, task, role.instruction
            )
        } else {
            format!("Role: {}\n\n{}", role.role_name, role.instruction)
        };
        conversation.push(ChatMessage::user(user_content));

        if let Some(events) = events {
            events.append(
                &Event::new(
                    run_id,
                    task_id,
                    Arm::Swarm,
                    role.agent_id,
                    role.role_name.to_lowercase(),
                    role.phase,
                    EventKind::Message,
                )
                .with_bucket(task_bucket),
            )?;
        }

        let reply = caller.complete(&conversation).await?;
        total_in += reply.tokens_in;
        total_out += reply.tokens_out;

        if let Some(events) = events {
            events.append(
                &Event::new(
                    run_id,
                    task_id,
                    Arm::Swarm,
                    role.agent_id,
                    role.role_name.to_lowercase(),
                    role.phase,
                    EventKind::End,
                )
                .with_tokens(reply.tokens_in, reply.tokens_out)
                .with_bucket(task_bucket),
            )?;
        }

        conversation.push(ChatMessage::assistant(reply.content.clone()));
        final_content = reply.content;
    }

    Ok(ArmResult {
        content: final_content,
        tokens_in: total_in,
        tokens_out: total_out,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedCaller;
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_baseline_single_call_with_events() {
        let dir = tempdir().unwrap();
        let events_path = dir.path().join("events.jsonl");
        let events = EventLogWriter::new(&events_path);
        let caller = ScriptedCaller::ok(&[("answer", 10, 20)]);

        let result = run_baseline(&caller, Some(&events), "2+2?", "r-1", "t-1", "easy")
            .await
            .unwrap();
        assert_eq!(result.content, "answer");
        assert_eq!(result.tokens_in, 10);
        assert_eq!(result.tokens_out, 20);
        assert_eq!(caller.calls.lock().unwrap().len(), 1);

        let contents = std::fs::read_to_string(&events_path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"event\":\"message\""));
        assert!(lines[1].contains("\"event\":\"end\""));
        assert!(lines[1].contains("\"tokens_out\":20"));
    }

    #[tokio::test]
    async fn test_swarm_runs_all_roles_and_sums_tokens() {
        let caller = ScriptedCaller::ok(&[
            ("plan", 10, 10),
            ("analysis", 10, 10),
            ("draft", 10, 10),
            ("critique", 10, 10),
            ("revision", 10, 10),
            ("final artifact", 10, 10),
        ]);

        let result = run_swarm(&caller, None, "write a haiku", "r-1", "t-1", "easy")
            .await
            .unwrap();
        assert_eq!(result.content, "final artifact");
        assert_eq!(result.tokens_in, 60);
        assert_eq!(result.tokens_out, 60);

        let calls = caller.calls.lock().unwrap();
        assert_eq!(calls.len(), SWARM_ROLES.len());
        // First call: system prompt + planner message carrying the task.
        assert_eq!(calls[0][0].role, "system");
        assert!(calls[0][1].content.contains("Task: write a haiku"));
        // Later calls never restate the task.
        assert!(!calls[2].last().unwrap().content.contains("write a haiku"));
        // Conversation grows by two messages per role.
        assert_eq!(calls[5].len(), 1 + 2 * 5 + 1);
    }

    #[tokio::test]
    async fn test_swarm_surfaces_collaborator_failure() {
        let caller = ScriptedCaller::new(vec![
            Ok(ModelReply {
                content: "plan".into(),
                tokens_in: 1,
                tokens_out: 1,
            }),
            Err(ModelError::Decode("bad payload".into())),
        ]);

        let err = run_swarm(&caller, None, "task", "r-1", "t-1", "easy")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Model(ModelError::Decode(_))));
    }

    #[test]
    fn test_model_error_kind_names() {
        assert_eq!(ModelError::MissingApiKey.kind_name(), "ConfigError");
        assert_eq!(ModelError::Decode("x".into()).kind_name(), "DecodeError");
    }
}
