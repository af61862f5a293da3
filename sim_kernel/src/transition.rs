//! Process state machine
//!
//! [`RegistryState::transition`] is the only way a process changes logical
//! state. In one critical section it:
//!
//! 1. leaves the old queue or slot (no-op if the process is not there)
//! 2. updates the state field
//! 3. joins the new queue tail or core slot
//! 4. records timing (start, response, finish, turnaround)

use crate::registry::{Registry, RegistryState};
use core_types::{CoreId, Pid, ProcessState};

impl RegistryState {
    /// Moves `pid` to `new_state`
    ///
    /// The caller must already hold the lock. Entering `Running` requires a
    /// valid `core` whose slot is free (or already holds `pid`). Returns
    /// false, changing nothing, when the PID is unknown, the transition is
    /// a self-transition outside `Running`, or the core requirement fails.
    pub fn transition(&mut self, pid: Pid, new_state: ProcessState, core: Option<CoreId>) -> bool {
        let now = self.now();
        self.transition_at(pid, new_state, core, now)
    }

    /// Like [`RegistryState::transition`], stamping timing fields with `at`
    ///
    /// Workers use this to date an event at the end of the quantum they
    /// just executed, which the boot core's clock has not reached yet.
    pub fn transition_at(
        &mut self,
        pid: Pid,
        new_state: ProcessState,
        core: Option<CoreId>,
        at: u64,
    ) -> bool {
        let Some(old_state) = self.process(pid).map(|p| p.state) else {
            return false;
        };
        if old_state == new_state && new_state != ProcessState::Running {
            return false;
        }
        if new_state == ProcessState::Running {
            let Some(core) = core else {
                return false;
            };
            if core.0 >= self.num_cores() {
                return false;
            }
            if matches!(self.running_on(core), Some(other) if other != pid) {
                return false;
            }
        }

        match old_state {
            ProcessState::Ready => {
                self.remove_from_ready(pid);
            }
            ProcessState::Blocked => {
                self.remove_from_blocked(pid);
            }
            ProcessState::Running => self.clear_slot_of(pid),
            ProcessState::New | ProcessState::Terminated => {}
        }

        let now = at;
        let Some(process) = self.process_mut(pid) else {
            return false;
        };
        process.state = new_state;
        if new_state != ProcessState::Running {
            process.core = None;
        }
        match new_state {
            ProcessState::Ready => {
                process.first_ready_at.get_or_insert(now);
            }
            ProcessState::Running => {
                process.core = core;
                if process.start_time.is_none() {
                    let ready_since = process.first_ready_at.unwrap_or(process.arrival_time);
                    process.start_time = Some(now);
                    process.response_time = Some(now.saturating_sub(ready_since));
                }
            }
            ProcessState::Terminated => {
                process.finish_time = Some(now);
                process.turnaround_time = Some(now.saturating_sub(process.arrival_time));
            }
            ProcessState::New | ProcessState::Blocked => {}
        }

        match (new_state, core) {
            (ProcessState::Ready, _) => self.push_ready(pid),
            (ProcessState::Blocked, _) => self.push_blocked(pid),
            (ProcessState::Running, Some(core)) => {
                self.occupy_slot(core, pid);
            }
            _ => {}
        }
        true
    }
}

impl Registry {
    /// Locks the registry and performs a single transition
    pub fn transition(&self, pid: Pid, new_state: ProcessState, core: Option<CoreId>) -> bool {
        self.lock().transition(pid, new_state, core)
    }
}
