//! State module for tracking discovery and task progress
//!
//! # Components
//!
//! - `RecordState`: where a discovered record ended up (dispatched, dropped, ...)
//! - `TaskStatus`: lifecycle of a dispatched fetch task
//! - `HostState`: per-host request bookkeeping for politeness delays

mod host_state;
mod record_state;
mod task_state;

// Re-export main types
pub use host_state::HostState;
pub use record_state::RecordState;
pub use task_state::TaskStatus;
