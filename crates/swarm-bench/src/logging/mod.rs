//! Event-level logging (JSONL) and run-summary persistence.
//!
//! Two append-only, line-delimited logs back the whole benchmark:
//! - the event log: one record per meaningful state transition
//! - the run-summary log: one record per (run, arm) attempt
//!
//! Both assume a single writer process; each append is an
//! open-append-close sequence, not an atomic transaction.

pub mod error;
pub mod types;
pub mod writer;

pub use error::{LogError, LogResult};
pub use types::{
    Arm, Budgets, CostUsd, Event, EventKind, EventMetadata, FailureReason, Outcome, Phase,
    RunSummary, Scores, SwarmStats, Usage,
};
pub use writer::{EventLogWriter, SummaryWriter};

use chrono::{SecondsFormat, Utc};

/// Current UTC timestamp, RFC 3339 with second precision and a `Z` suffix.
pub fn ts_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
