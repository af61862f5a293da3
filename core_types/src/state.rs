//! Logical process states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical state of a process
///
/// The registry keeps queue membership consistent with this value:
/// `Ready` processes sit in the ready queue, `Blocked` ones in the blocked
/// queue and `Running` ones in exactly one core slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Created but not yet admitted
    New,
    /// Waiting in the ready queue
    Ready,
    /// Holding a core
    Running,
    /// Waiting for I/O completion
    Blocked,
    /// Finished; kept for reporting
    Terminated,
}

impl ProcessState {
    /// All states, in lifecycle order
    pub const ALL: [ProcessState; 5] = [
        ProcessState::New,
        ProcessState::Ready,
        ProcessState::Running,
        ProcessState::Blocked,
        ProcessState::Terminated,
    ];

    /// Checks if the process will never run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Terminated)
    }

    /// Checks if the process competes for a core
    pub fn is_schedulable(&self) -> bool {
        matches!(self, ProcessState::Ready | ProcessState::Running)
    }

    /// Upper-case name used in histories and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::New => "NEW",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Blocked => "BLOCKED",
            ProcessState::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
