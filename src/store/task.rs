// src/store/task.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a task.
///
/// Legal transitions: QUEUED -> RUNNING -> {COMPLETED, FAILED}. The claim
/// protocol in the store is the only code path that performs QUEUED ->
/// RUNNING; recovery may move RUNNING back to QUEUED between process
/// lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    /// COMPLETED and FAILED are terminal; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown task status '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(TaskStatus::Queued),
            "RUNNING" => Ok(TaskStatus::Running),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A persisted task row.
///
/// Timestamps are Unix milliseconds; `started_at_ms` is set by the claim,
/// `finished_at_ms` by the terminal commit.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub duration_ms: u64,
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    pub created_at_ms: i64,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
}

/// A task submission, as received from a client.
///
/// The dependency list is treated as a set: admission deduplicates it
/// before the task is persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub dependencies: Vec<String>,
}
