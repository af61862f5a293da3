//! Multi-core scheduler workers
//!
//! One [`CoreWorker`] per virtual CPU. Workers never talk to each other;
//! they cooperate only through the shared [`Registry`]. Each loop
//! iteration ([`CoreWorker::step`]) is:
//!
//! 1. admission of NEW processes (boot core only)
//! 2. dispatch from the ready queue if the core is idle
//! 3. one quantum of execution, ending in termination, preemption,
//!    an I/O block or nothing
//! 4. clock advance and wait accounting (boot core only)
//!
//! Tests drive `step` directly for deterministic schedules; the controller
//! runs [`CoreWorker::run`] on a dedicated thread.

use crate::chance::Chance;
use crate::config::{PriorityOrder, SimConfig};
use crate::policy::AlgorithmHandle;
use crate::registry::{CoreEvent, Registry};
use crate::timer::Pacer;
use core_types::{CoreId, Pid, ProcessState};
use services_logger::{LogSource, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-core knobs taken from [`SimConfig`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreSettings {
    pub quantum: u64,
    pub time_slice: u64,
    pub tick_interval_ms: u64,
    pub admission_probability: f64,
    pub io_block_probability: f64,
    pub priority_order: PriorityOrder,
}

impl CoreSettings {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            quantum: config.quantum.max(1),
            time_slice: config.time_slice.max(1),
            tick_interval_ms: config.tick_interval_ms,
            admission_probability: config.admission_probability,
            io_block_probability: config.io_block_probability,
            priority_order: config.priority_order,
        }
    }
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self::from_config(&SimConfig::default())
    }
}

/// What one step did on this core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to run
    Idle,
    /// Ran a quantum; the process keeps the core
    Executed(Pid),
    /// The process finished
    Terminated(Pid),
    /// The time slice expired and the process went back to READY
    Preempted(Pid),
    /// The process issued an I/O request
    Blocked(Pid),
}

/// A virtual CPU
pub struct CoreWorker {
    core: CoreId,
    registry: Arc<Registry>,
    algorithm: AlgorithmHandle,
    settings: CoreSettings,
    chance: Box<dyn Chance>,
    pacer: Arc<dyn Pacer>,
    logger: Logger,
    running: Arc<AtomicBool>,
    current: Option<Pid>,
    /// Quantum ticks used by `current` since its dispatch
    slice_used: u64,
}

impl CoreWorker {
    pub fn new(
        core: CoreId,
        registry: Arc<Registry>,
        algorithm: AlgorithmHandle,
        settings: CoreSettings,
        chance: Box<dyn Chance>,
        pacer: Arc<dyn Pacer>,
        logger: Logger,
    ) -> Self {
        Self {
            core,
            registry,
            algorithm,
            settings,
            chance,
            pacer,
            logger,
            running: Arc::new(AtomicBool::new(true)),
            current: None,
            slice_used: 0,
        }
    }

    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Flag checked once per loop iteration; clearing it stops the worker
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    /// Runs one loop iteration
    pub fn step(&mut self) -> StepOutcome {
        if self.core.is_boot() {
            self.admit_new();
        }
        if self.current.is_none() {
            self.dispatch();
        }

        self.pacer.pause(self.settings.tick_interval_ms);
        let outcome = match self.current {
            Some(pid) => self.execute(pid),
            None => StepOutcome::Idle,
        };

        if self.core.is_boot() && self.running.load(Ordering::Acquire) {
            self.advance_clock();
        }
        outcome
    }

    /// Steps until the running flag is cleared, then releases the core
    pub fn run(mut self) {
        self.logger
            .info(LogSource::Core(self.core), "core started")
            .field("algorithm", self.algorithm.get())
            .emit();

        while self.running.load(Ordering::Acquire) {
            self.step();
        }

        if let Some(pid) = self.current.take() {
            let mut state = self.registry.lock();
            if state.running_on(self.core) == Some(pid) {
                state.release_slot(self.core);
            }
        }
        self.logger
            .info(LogSource::Core(self.core), "core stopped")
            .emit();
    }

    fn admit_new(&mut self) {
        let (admitted, now) = {
            let mut state = self.registry.lock();
            let mut admitted = Vec::new();
            for pid in state.pids_in_state(ProcessState::New) {
                if self.chance.roll(self.settings.admission_probability)
                    && state.transition(pid, ProcessState::Ready, None)
                {
                    admitted.push(pid);
                }
            }
            (admitted, state.now())
        };
        for pid in admitted {
            self.logger
                .debug(LogSource::Core(self.core), "admitted")
                .field("pid", pid)
                .field("time", now)
                .emit();
        }
    }

    fn dispatch(&mut self) {
        let algorithm = self.algorithm.get();
        let mut state = self.registry.lock();
        let Some(pid) = algorithm.select(&state, self.settings.priority_order) else {
            return;
        };
        if state.transition(pid, ProcessState::Running, Some(self.core)) {
            let now = state.now();
            state.record_history(self.core, now, pid, CoreEvent::Running);
            self.current = Some(pid);
            self.slice_used = 0;
        }
    }

    fn execute(&mut self, pid: Pid) -> StepOutcome {
        let mut state = self.registry.lock();

        // someone else (control layer, reset) took the process off this core
        if state.running_on(self.core) != Some(pid) {
            self.current = None;
            return StepOutcome::Idle;
        }

        let quantum = self.settings.quantum;
        let end = state.now().saturating_add(quantum);
        let finished = match state.process_mut(pid) {
            Some(process) => process.consume(quantum),
            None => {
                self.current = None;
                return StepOutcome::Idle;
            }
        };
        self.slice_used = self.slice_used.saturating_add(quantum);

        let (event, next_state, outcome) = if finished {
            (
                CoreEvent::Terminated,
                ProcessState::Terminated,
                StepOutcome::Terminated(pid),
            )
        } else if self.algorithm.get().is_time_sliced() && self.slice_used >= self.settings.time_slice
        {
            (
                CoreEvent::Preempted,
                ProcessState::Ready,
                StepOutcome::Preempted(pid),
            )
        } else if self.chance.roll(self.settings.io_block_probability) {
            (CoreEvent::Blocked, ProcessState::Blocked, StepOutcome::Blocked(pid))
        } else {
            return StepOutcome::Executed(pid);
        };

        state.record_history(self.core, end, pid, event);
        state.transition_at(pid, next_state, None, end);
        self.current = None;
        self.slice_used = 0;
        outcome
    }

    fn advance_clock(&self) {
        let mut state = self.registry.lock();
        state.advance_clock(self.settings.quantum);
        state.accrue_ready_wait(self.settings.quantum);
    }
}
