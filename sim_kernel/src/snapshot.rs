//! Read-only views of the registry
//!
//! Observers never hold the lock while rendering; they copy everything
//! they need in one critical section and work from the copy.

use crate::process::Process;
use crate::registry::{HistoryEntry, RegisterFile, Registry, RegistryState, RtosEvent};
use core_types::{CoreId, Pid, ProcessState, RunId};
use serde::{Deserialize, Serialize};

/// A consistent copy of the shared state taken under one lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub run_id: RunId,
    pub clock: u64,
    /// Processes in PID order
    pub processes: Vec<Process>,
    pub ready: Vec<Pid>,
    pub blocked: Vec<Pid>,
    /// One entry per core, `None` when idle
    pub running: Vec<Option<Pid>>,
    pub histories: Vec<Vec<HistoryEntry>>,
    pub timeline: Vec<RtosEvent>,
    pub pending_isr: Option<Pid>,
    pub registers: RegisterFile,
}

impl RegistrySnapshot {
    pub fn capture(state: &RegistryState) -> Self {
        Self {
            run_id: state.run_id(),
            clock: state.now(),
            processes: state.processes().cloned().collect(),
            ready: state.ready_queue().iter().copied().collect(),
            blocked: state.blocked_queue().iter().copied().collect(),
            running: state.running_slots().to_vec(),
            histories: state.histories().to_vec(),
            timeline: state.timeline().iter().cloned().collect(),
            pending_isr: state.pending_isr(),
            registers: *state.registers(),
        }
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    pub fn count_in(&self, state: ProcessState) -> usize {
        self.processes.iter().filter(|p| p.state == state).count()
    }

    pub fn running_on(&self, core: CoreId) -> Option<Pid> {
        self.running.get(core.0).copied().flatten()
    }

    pub fn active_cores(&self) -> usize {
        self.running.iter().filter(|slot| slot.is_some()).count()
    }

    /// Serializes the snapshot for external consumers
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Registry {
    /// Copies the whole state under the lock
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::capture(&self.lock())
    }
}
