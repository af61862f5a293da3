//! # Shared State Registry
//!
//! The single source of truth for a simulation: process table, ready and
//! blocked queues, per-core running slots, the global clock, per-core
//! execution history and the RTOS event timeline.
//!
//! ## Locking discipline
//!
//! Everything lives in one [`RegistryState`] behind one coarse
//! [`parking_lot::Mutex`]. Callers either hold a [`RegistryGuard`] and use
//! the `RegistryState` primitives directly, or use the [`Registry`]
//! convenience methods which take the lock for a single operation. Helpers
//! that must compose inside a larger critical section take
//! `&mut RegistryState`, which is how a caller that "already holds the
//! lock" invokes them without deadlocking.
//!
//! Nothing in here sleeps or blocks while the lock is held.
//!
//! Removing a PID from a queue it is not in is a no-op, never an error.

use crate::chance::Chance;
use crate::process::Process;
use crate::timer::SimClock;
use core_types::{CoreId, EventId, Pid, ProcessState, RunId};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Lock guard over the registry state
pub type RegistryGuard<'a> = MutexGuard<'a, RegistryState>;

/// Default number of retained RTOS timeline events
pub const DEFAULT_TIMELINE_CAPACITY: usize = 2000;

/// What a core did at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreEvent {
    Running,
    Preempted,
    Blocked,
    Terminated,
}

/// One entry of a core's execution history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: u64,
    pub pid: Pid,
    pub event: CoreEvent,
}

/// Kinds of RTOS timeline events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RtosEventKind {
    IsrTrigger,
    SwitchStart,
    TaskSwitch,
    IsrExec,
    Blocked,
    Wakeup,
    IsrFinish,
    TaskFinish,
    Idle,
}

/// An immutable RTOS timeline record
///
/// `id` is assigned under the registry lock from a counter that never goes
/// backwards, so events sharing a timestamp stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtosEvent {
    pub id: EventId,
    pub time: u64,
    #[serde(rename = "type")]
    pub kind: RtosEventKind,
    pub prev_pid: Option<Pid>,
    pub next_pid: Option<Pid>,
    pub info: String,
}

/// Simulated register file shown by the RTOS display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    pub general: [u32; 13],
    pub sp: u32,
    pub lr: u32,
    pub pc: u32,
}

impl RegisterFile {
    pub const RESET_SP: u32 = 0x2000_1000;
    pub const RESET_LR: u32 = 0xFFFF_FFFF;
    pub const RESET_PC: u32 = 0x0800_0000;
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            general: [0; 13],
            sp: Self::RESET_SP,
            lr: Self::RESET_LR,
            pc: Self::RESET_PC,
        }
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.general.iter().enumerate() {
            writeln!(f, "R{:<2} 0x{:08X}", i, r)?;
        }
        writeln!(f, "SP  0x{:08X}", self.sp)?;
        writeln!(f, "LR  0x{:08X}", self.lr)?;
        write!(f, "PC  0x{:08X}", self.pc)
    }
}

/// All shared scheduling state
#[derive(Debug)]
pub struct RegistryState {
    processes: BTreeMap<Pid, Process>,
    ready: VecDeque<Pid>,
    blocked: VecDeque<Pid>,
    running: Vec<Option<Pid>>,
    clock: SimClock,
    history: Vec<Vec<HistoryEntry>>,
    timeline: VecDeque<RtosEvent>,
    timeline_capacity: usize,
    next_event_id: u64,
    next_pid: Pid,
    pending_isr: Option<Pid>,
    registers: RegisterFile,
    run_id: RunId,
}

impl RegistryState {
    fn new(num_cores: usize) -> Self {
        let num_cores = num_cores.max(1);
        Self {
            processes: BTreeMap::new(),
            ready: VecDeque::new(),
            blocked: VecDeque::new(),
            running: vec![None; num_cores],
            clock: SimClock::new(),
            history: vec![Vec::new(); num_cores],
            timeline: VecDeque::new(),
            timeline_capacity: DEFAULT_TIMELINE_CAPACITY,
            next_event_id: 1,
            next_pid: Pid::FIRST,
            pending_isr: None,
            registers: RegisterFile::default(),
            run_id: RunId::new(),
        }
    }

    // --- process table ---

    /// Inserts a process under its PID
    ///
    /// Returns false, leaving the table untouched, if the PID is taken.
    pub fn insert_process(&mut self, process: Process) -> bool {
        if self.processes.contains_key(&process.pid) {
            return false;
        }
        if process.pid >= self.next_pid {
            self.next_pid = process.pid.next();
        }
        self.processes.insert(process.pid, process);
        true
    }

    /// Removes a process from the table and every queue or slot
    pub fn remove_process(&mut self, pid: Pid) -> Option<Process> {
        self.remove_from_ready(pid);
        self.remove_from_blocked(pid);
        self.clear_slot_of(pid);
        if self.pending_isr == Some(pid) {
            self.pending_isr = None;
        }
        self.processes.remove(&pid)
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn process_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.processes.get_mut(&pid)
    }

    /// Processes in PID order
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// PIDs currently in the given state, in PID order
    pub fn pids_in_state(&self, state: ProcessState) -> Vec<Pid> {
        self.processes
            .values()
            .filter(|p| p.state == state)
            .map(|p| p.pid)
            .collect()
    }

    /// Hands out the next PID, above every PID ever inserted
    pub fn allocate_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid = pid.next();
        pid
    }

    /// Creates a NEW process with explicit attributes
    ///
    /// Returns `None` if the table already holds `max_processes` entries,
    /// or if the PID space is used up and the next PID is still live.
    pub fn spawn_process(
        &mut self,
        arrival_time: u64,
        burst_time: u64,
        priority: u32,
        max_processes: usize,
    ) -> Option<Pid> {
        if self.processes.len() >= max_processes {
            return None;
        }
        let pid = self.allocate_pid();
        self.insert_process(Process::new(pid, arrival_time, burst_time, priority))
            .then_some(pid)
    }

    /// Creates up to `count` NEW processes with random attributes
    ///
    /// Arrival is drawn from [0, 2], burst from [3, 15] and priority from
    /// [1, 10]. Stops early once `max_processes` is reached.
    pub fn spawn_random_processes(
        &mut self,
        count: usize,
        chance: &mut dyn Chance,
        max_processes: usize,
    ) -> Vec<Pid> {
        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            let arrival = chance.pick(0, 2);
            let burst = chance.pick(3, 15);
            let priority = chance.pick(1, 10) as u32;
            match self.spawn_process(arrival, burst, priority, max_processes) {
                Some(pid) => spawned.push(pid),
                None => break,
            }
        }
        spawned
    }

    // --- queues and slots ---

    pub fn ready_queue(&self) -> &VecDeque<Pid> {
        &self.ready
    }

    pub fn blocked_queue(&self) -> &VecDeque<Pid> {
        &self.blocked
    }

    pub fn push_ready(&mut self, pid: Pid) {
        self.ready.push_back(pid);
    }

    pub fn push_blocked(&mut self, pid: Pid) {
        self.blocked.push_back(pid);
    }

    /// Removes `pid` from the ready queue; no-op if absent
    pub fn remove_from_ready(&mut self, pid: Pid) -> bool {
        remove_from(&mut self.ready, pid)
    }

    /// Removes `pid` from the blocked queue; no-op if absent
    pub fn remove_from_blocked(&mut self, pid: Pid) -> bool {
        remove_from(&mut self.blocked, pid)
    }

    pub fn num_cores(&self) -> usize {
        self.running.len()
    }

    /// Process occupying a core's running slot
    pub fn running_on(&self, core: CoreId) -> Option<Pid> {
        self.running.get(core.0).copied().flatten()
    }

    pub fn running_slots(&self) -> &[Option<Pid>] {
        &self.running
    }

    /// Puts `pid` into a core's slot; out-of-range cores are ignored
    pub fn occupy_slot(&mut self, core: CoreId, pid: Pid) -> bool {
        match self.running.get_mut(core.0) {
            Some(slot) => {
                *slot = Some(pid);
                true
            }
            None => false,
        }
    }

    /// Clears every slot that references `pid`
    pub fn clear_slot_of(&mut self, pid: Pid) {
        for slot in self.running.iter_mut() {
            if *slot == Some(pid) {
                *slot = None;
            }
        }
    }

    /// Empties a core's slot without touching the process state
    ///
    /// Used when a worker shuts down mid-execution: the process keeps its
    /// last recorded state for inspection.
    pub fn release_slot(&mut self, core: CoreId) -> Option<Pid> {
        let pid = self.running.get_mut(core.0)?.take()?;
        if let Some(process) = self.processes.get_mut(&pid) {
            process.core = None;
        }
        Some(pid)
    }

    // --- clock ---

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Advances the global clock; only the authorized actor calls this
    pub fn advance_clock(&mut self, delta: u64) -> u64 {
        self.clock.advance(delta)
    }

    /// Charges `delta` ticks of waiting to every ready process
    pub fn accrue_ready_wait(&mut self, delta: u64) {
        for pid in &self.ready {
            if let Some(process) = self.processes.get_mut(pid) {
                process.wait_time = process.wait_time.saturating_add(delta);
            }
        }
    }

    // --- history ---

    pub fn record_history(&mut self, core: CoreId, time: u64, pid: Pid, event: CoreEvent) {
        if let Some(history) = self.history.get_mut(core.0) {
            history.push(HistoryEntry { time, pid, event });
        }
    }

    pub fn history(&self, core: CoreId) -> &[HistoryEntry] {
        self.history.get(core.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn histories(&self) -> &[Vec<HistoryEntry>] {
        &self.history
    }

    // --- RTOS timeline ---

    pub fn set_timeline_capacity(&mut self, capacity: usize) {
        self.timeline_capacity = capacity.max(1);
        self.compact_timeline();
    }

    /// Appends an event stamped with the current clock
    ///
    /// The id comes from a counter that survives every reset.
    pub fn record_event(
        &mut self,
        kind: RtosEventKind,
        prev_pid: Option<Pid>,
        next_pid: Option<Pid>,
        info: impl Into<String>,
    ) -> EventId {
        let id = EventId::from_raw(self.next_event_id);
        self.next_event_id += 1;
        self.timeline.push_back(RtosEvent {
            id,
            time: self.clock.now(),
            kind,
            prev_pid,
            next_pid,
            info: info.into(),
        });
        self.compact_timeline();
        id
    }

    fn compact_timeline(&mut self) {
        while self.timeline.len() > self.timeline_capacity {
            self.timeline.pop_front();
        }
    }

    pub fn timeline(&self) -> &VecDeque<RtosEvent> {
        &self.timeline
    }

    /// Events with an id greater than `after`, for incremental consumers
    pub fn events_since(&self, after: Option<EventId>) -> Vec<RtosEvent> {
        self.timeline
            .iter()
            .filter(|e| after.map_or(true, |a| e.id > a))
            .cloned()
            .collect()
    }

    pub fn pending_isr(&self) -> Option<Pid> {
        self.pending_isr
    }

    pub fn set_pending_isr(&mut self, pid: Option<Pid>) {
        self.pending_isr = pid;
    }

    pub fn take_pending_isr(&mut self) -> Option<Pid> {
        self.pending_isr.take()
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    // --- lifecycle ---

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Starts a new run: fresh run id, empty slots and history
    ///
    /// The process table and queues are kept so processes spawned before
    /// start take part in the run. Anything left on a core goes back to
    /// the ready queue.
    pub fn begin_run(&mut self) {
        self.run_id = RunId::new();
        let stranded: Vec<Pid> = self.running.iter().flatten().copied().collect();
        for pid in stranded {
            self.transition(pid, ProcessState::Ready, None);
        }
        for history in self.history.iter_mut() {
            history.clear();
        }
    }

    /// Drops every process and empties all queues and slots
    ///
    /// Clock, histories and timeline are untouched.
    pub fn clear_processes(&mut self) {
        self.processes.clear();
        self.ready.clear();
        self.blocked.clear();
        for slot in self.running.iter_mut() {
            *slot = None;
        }
        self.pending_isr = None;
        self.next_pid = Pid::FIRST;
    }

    /// Clears all transient state for a fresh run
    ///
    /// The event id counter is deliberately kept.
    pub fn reset(&mut self) {
        self.clear_processes();
        for history in self.history.iter_mut() {
            history.clear();
        }
        self.clock = SimClock::new();
        self.timeline.clear();
        self.registers = RegisterFile::default();
    }

    // --- invariants ---

    /// Verifies queue disjointness and state/membership consistency
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen: BTreeMap<Pid, &'static str> = BTreeMap::new();
        let mut note = |pid: Pid, place: &'static str| -> Result<(), String> {
            match seen.insert(pid, place) {
                Some(previous) => Err(format!("{} is in both {} and {}", pid, previous, place)),
                None => Ok(()),
            }
        };

        for pid in &self.ready {
            note(*pid, "ready queue")?;
        }
        for pid in &self.blocked {
            note(*pid, "blocked queue")?;
        }
        for pid in self.running.iter().flatten() {
            note(*pid, "a running slot")?;
        }

        for (pid, place) in &seen {
            let process = self
                .processes
                .get(pid)
                .ok_or_else(|| format!("{} in {} is missing from the table", pid, place))?;
            let expected = match *place {
                "ready queue" => ProcessState::Ready,
                "blocked queue" => ProcessState::Blocked,
                _ => ProcessState::Running,
            };
            if process.state != expected {
                return Err(format!(
                    "{} is in {} but its state is {}",
                    pid, place, process.state
                ));
            }
        }

        for process in self.processes.values() {
            let tracked = matches!(
                process.state,
                ProcessState::Ready | ProcessState::Blocked | ProcessState::Running
            );
            if tracked && !seen.contains_key(&process.pid) {
                return Err(format!(
                    "{} is {} but not in any queue or slot",
                    process.pid, process.state
                ));
            }
        }
        Ok(())
    }
}

fn remove_from(queue: &mut VecDeque<Pid>, pid: Pid) -> bool {
    match queue.iter().position(|p| *p == pid) {
        Some(index) => {
            queue.remove(index);
            true
        }
        None => false,
    }
}

/// Handle to the shared state
///
/// Workers receive an `Arc<Registry>` at construction; there is no global
/// instance.
#[derive(Debug)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new(num_cores: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState::new(num_cores)),
        }
    }

    /// Acquires the registry lock
    pub fn lock(&self) -> RegistryGuard<'_> {
        self.state.lock()
    }

    /// Runs `f` under the lock
    pub fn with<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    pub fn now(&self) -> u64 {
        self.lock().now()
    }

    pub fn process(&self, pid: Pid) -> Option<Process> {
        self.lock().process(pid).cloned()
    }

    pub fn check_invariants(&self) -> Result<(), String> {
        self.lock().check_invariants()
    }
}
