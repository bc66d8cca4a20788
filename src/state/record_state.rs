/// Record state definitions for the controller's per-record decision
///
/// Every record starts as `Found` when the controller is notified and ends in
/// exactly one terminal state.
use std::fmt;

/// Represents the fate of a discovered record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    // ===== Active States =====
    /// Record has been received and fanned out to listeners
    Found,

    // ===== Terminal States =====
    /// Record was new and a fetch task was submitted for it
    Dispatched,

    /// Record's canonical key had already been scheduled in this run
    Dropped,

    /// Record was flagged by its parser as not fetchable
    Ignored,

    /// Record was refused by an admission policy or by the dispatcher
    Rejected,
}

impl RecordState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Found)
    }

    /// Returns true if a fetch task was created for the record
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched)
    }

    /// Returns the stable name used in logs and statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Dispatched => "dispatched",
            Self::Dropped => "dropped",
            Self::Ignored => "ignored",
            Self::Rejected => "rejected",
        }
    }

    /// Returns all possible record states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Found,
            Self::Dispatched,
            Self::Dropped,
            Self::Ignored,
            Self::Rejected,
        ]
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
