//! Task and result records.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use uuid::Uuid;

/// Unique task identifier.
pub type TaskId = String;

/// One unit of retrieval work, keyed by a KW number. The number is carried
/// as submitted; validation and correction happen inside the agent loop, so
/// a bad number becomes a `Failed` result rather than a rejected submission.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kw_number: String,
    pub submitted_at: DateTime<Local>,
}

impl Task {
    pub fn new(kw_number: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kw_number: kw_number.into(),
            submitted_at: Local::now(),
        }
    }
}

/// Final status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    Failed,
}

/// Immutable outcome record of one completed task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub kw_number: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub error: Option<String>,
    pub files: Vec<PathBuf>,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
