//! Session data model persisted in `.looper/state/session.json`.
//!
//! Field names are part of the on-disk contract and use camelCase, so the
//! session file can be inspected and consumed by external tooling. The
//! structures here are plain data; persistence lives in
//! [`crate::io::session_store`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One durable record per run-series of agent iterations.
///
/// `iterations` is append-only within a session's lifetime. The checkpoint,
/// when present, always names an iteration number less than or equal to
/// `iterations.len()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Globally unique session identifier.
    pub id: String,
    /// Creation timestamp.
    pub started_at: DateTime<Utc>,
    /// Commit hash at session creation, or `"unknown"`.
    #[serde(default)]
    pub start_commit: String,
    /// Branch name at session creation, or `"unknown"`.
    pub branch: String,
    /// Completed iterations, in invocation order.
    #[serde(default)]
    pub iterations: Vec<IterationResult>,
    /// Resume anchor written after each completed iteration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,
    /// Agent conversation id, reused to resume the same conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_session_id: Option<String>,
    /// Cumulative cost in USD across recorded iterations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
}

impl Session {
    /// True iff the session carries a resume anchor.
    pub fn can_resume(&self) -> bool {
        self.checkpoint.is_some()
    }

    /// Cumulative recorded cost, defaulting to zero when none was recorded.
    pub fn cost_so_far(&self) -> f64 {
        self.total_cost_usd.unwrap_or(0.0)
    }
}

/// Outcome of one agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IterationResult {
    /// Ordinal iteration number (1-based).
    pub iteration: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration, non-negative.
    pub duration_seconds: f64,
    pub success: bool,
    /// Raw agent output text.
    pub output: String,
    /// Status string reported by the agent, when it reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
    /// Whether the task document reported completion after this iteration.
    pub tasks_complete: bool,
    /// Set when a cost ceiling was met or exceeded by this iteration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_limit_exceeded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_limit_reason: Option<LimitScope>,
}

/// Resume marker. Iteration numbers are non-decreasing across saves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
    /// Commit hash when the checkpoint was taken, or `"unknown"`.
    pub commit: String,
}

/// Token and cost accounting for one iteration. All fields are non-negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageInfo {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Actual cost in USD. Zero when the agent omitted a cost figure.
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
}

/// Which ceiling a cost overage was measured against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LimitScope {
    Iteration,
    Session,
}
