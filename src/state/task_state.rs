/// Task status definitions for dispatched fetch tasks
use std::fmt;

/// Represents the current status of a fetch task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    // ===== Active States =====
    /// Task is waiting for a worker slot
    Queued,

    /// Task holds a worker slot and is fetching or parsing
    Running,

    // ===== Terminal States =====
    /// Fetch succeeded and the response was parsed
    Succeeded,

    /// Fetch collaborator reported a failure
    Failed,

    /// Dispatcher shut down before the task got a worker slot
    Cancelled,
}

impl TaskStatus {
    /// Returns true if the task will not change status again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
