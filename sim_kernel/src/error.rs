//! Control-plane errors
//!
//! Steady-state scheduling never fails; only commands issued by the
//! control layer can be rejected, and a rejected command has no side
//! effects.

use core_types::Pid;
use std::fmt;
use thiserror::Error;

/// Operating mode of a simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    /// Multi-core scheduler with the I/O manager
    MultiCore,
    /// Priority-preemptive real-time engine
    Rtos,
}

impl fmt::Display for SimMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimMode::MultiCore => f.write_str("multi-core"),
            SimMode::Rtos => f.write_str("RTOS"),
        }
    }
}

/// Rejected control commands
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler is not running")]
    NotRunning,

    #[error("An interrupt is already pending")]
    InterruptPending,

    #[error("PID {0} is already in use")]
    PidInUse(Pid),

    #[error("Invalid PID: {0}")]
    InvalidPid(u32),

    #[error("Process {0} not found")]
    ProcessNotFound(Pid),

    #[error("Process table is full ({0} entries)")]
    TableFull(usize),

    #[error("No free PID left")]
    PidsExhausted,

    #[error("Rejected while {active} mode is running")]
    ModeConflict { active: SimMode },

    #[error("Failed to spawn worker thread: {0}")]
    SpawnFailed(String),
}

impl From<std::io::Error> for ControlError {
    fn from(err: std::io::Error) -> Self {
        ControlError::SpawnFailed(err.to_string())
    }
}
