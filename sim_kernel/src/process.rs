//! Process model
//!
//! One [`Process`] struct covers ordinary processes, RTOS tasks and
//! interrupt service routines. The variant-specific data lives in
//! [`ProcessKind`], which the engines match on instead of probing for
//! optional attributes.

use core_types::{CoreId, Pid, ProcessState};
use serde::{Deserialize, Serialize};

/// Base address of the simulated task stacks
pub const STACK_REGION_BASE: u32 = 0x2000_0000;
/// Stack reserved per RTOS task
pub const STACK_SIZE: u32 = 0x400;
/// Display name for interrupt service routines
pub const ISR_NAME: &str = "GPIO_IRQ_Handler";

/// RTOS-specific task parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtosParams {
    pub period: u64,
    pub deadline: u64,
    /// Only used to populate the register display
    pub stack_base: u32,
}

/// Interrupt service routine parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsrParams {
    pub name: String,
    /// Simulated time at which the interrupt fired
    pub raised_at: u64,
}

/// What kind of schedulable entity a process is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessKind {
    /// Ordinary multi-core process
    Standard,
    /// Periodic real-time task
    Task(RtosParams),
    /// Ephemeral interrupt service pseudo-process
    Isr(IsrParams),
}

/// A simulated process and its accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub pid: Pid,
    pub state: ProcessState,
    pub arrival_time: u64,
    pub burst_time: u64,
    pub remaining_time: u64,
    pub priority: u32,
    /// Core currently executing the process; only set while RUNNING
    pub core: Option<CoreId>,
    pub start_time: Option<u64>,
    pub finish_time: Option<u64>,
    pub wait_time: u64,
    pub turnaround_time: Option<u64>,
    pub response_time: Option<u64>,
    /// First time the process entered the ready queue
    pub first_ready_at: Option<u64>,
    pub kind: ProcessKind,
}

impl Process {
    /// Creates an ordinary process in the NEW state
    pub fn new(pid: Pid, arrival_time: u64, burst_time: u64, priority: u32) -> Self {
        Self {
            pid,
            state: ProcessState::New,
            arrival_time,
            burst_time,
            remaining_time: burst_time,
            priority,
            core: None,
            start_time: None,
            finish_time: None,
            wait_time: 0,
            turnaround_time: None,
            response_time: None,
            first_ready_at: None,
            kind: ProcessKind::Standard,
        }
    }

    /// Creates an RTOS task with a stack slot derived from its PID
    pub fn rtos_task(pid: Pid, burst_time: u64, priority: u32) -> Self {
        let stack_base = STACK_REGION_BASE.wrapping_add(pid.as_u32().wrapping_mul(STACK_SIZE));
        Self {
            kind: ProcessKind::Task(RtosParams {
                period: 0,
                deadline: 0,
                stack_base,
            }),
            ..Self::new(pid, 0, burst_time, priority)
        }
    }

    /// Creates an interrupt service routine raised at `now`
    pub fn isr(pid: Pid, budget: u64, priority: u32, now: u64) -> Self {
        Self {
            kind: ProcessKind::Isr(IsrParams {
                name: ISR_NAME.to_string(),
                raised_at: now,
            }),
            ..Self::new(pid, now, budget, priority)
        }
    }

    pub fn is_isr(&self) -> bool {
        matches!(self.kind, ProcessKind::Isr(_))
    }

    /// Stack base shown in the register display
    pub fn stack_base(&self) -> u32 {
        match &self.kind {
            ProcessKind::Task(params) => params.stack_base,
            ProcessKind::Standard | ProcessKind::Isr(_) => STACK_REGION_BASE,
        }
    }

    /// Consumes up to `delta` ticks of remaining work
    ///
    /// Returns true once no work remains.
    pub fn consume(&mut self, delta: u64) -> bool {
        self.remaining_time = self.remaining_time.saturating_sub(delta);
        self.remaining_time == 0
    }
}
