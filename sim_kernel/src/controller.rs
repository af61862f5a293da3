//! # Control Layer
//!
//! Owns the worker threads of each simulation mode and turns the external
//! commands (start, stop, set algorithm, trigger interrupt) into registry
//! mutations. Rejected commands return a [`ControlError`] and change
//! nothing.
//!
//! [`Simulator`] bundles one registry with both controllers and keeps the
//! two modes from running at the same time.

use crate::chance::{Chance, SeededChance};
use crate::config::{ConfigError, SimConfig};
use crate::error::{ControlError, SimMode};
use crate::io_manager::IoManager;
use crate::policy::{AlgorithmHandle, SchedulingAlgorithm};
use crate::process::Process;
use crate::registry::Registry;
use crate::rtos::RtosEngine;
use crate::smp::{CoreSettings, CoreWorker};
use crate::snapshot::RegistrySnapshot;
use crate::stats::SchedulingStats;
use crate::timer::{Pacer, SleepPacer};
use core_types::{CoreId, EventId, Pid, ProcessState};
use parking_lot::Mutex;
use services_logger::{LogSource, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Chance stream ids; cores use their index
const IO_ACTOR: u64 = 1 << 32;
const RTOS_ACTOR: u64 = (1 << 32) + 1;
const CONTROL_ACTOR: u64 = (1 << 32) + 2;

struct Worker {
    name: String,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Threads started together and stopped together
#[derive(Default)]
struct WorkerGroup {
    workers: Vec<Worker>,
}

impl WorkerGroup {
    fn spawn(
        &mut self,
        name: String,
        running: Arc<AtomicBool>,
        body: impl FnOnce() + Send + 'static,
    ) -> Result<(), ControlError> {
        let handle = thread::Builder::new().name(name.clone()).spawn(body)?;
        self.workers.push(Worker {
            name,
            running,
            handle,
        });
        Ok(())
    }

    /// Clears every flag, then joins each thread until a shared deadline
    ///
    /// Threads still alive at the deadline are detached and logged.
    fn shutdown(self, timeout: Duration, logger: &Logger) {
        for worker in &self.workers {
            worker.running.store(false, Ordering::Release);
        }

        let deadline = Instant::now() + timeout;
        for worker in self.workers {
            while !worker.handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            if !worker.handle.is_finished() {
                logger
                    .warn(LogSource::Controller, "worker did not stop in time")
                    .field("worker", &worker.name)
                    .field("timeout_ms", timeout.as_millis())
                    .emit();
                continue;
            }
            if worker.handle.join().is_err() {
                logger
                    .error(LogSource::Controller, "worker panicked")
                    .field("worker", &worker.name)
                    .emit();
            }
        }
    }
}

fn chance_for(config: &SimConfig, actor: u64) -> Box<dyn Chance> {
    Box::new(SeededChance::for_actor(config.seed, actor))
}

/// Starts and stops the multi-core scheduler
pub struct SchedulerController {
    registry: Arc<Registry>,
    config: SimConfig,
    algorithm: AlgorithmHandle,
    pacer: Arc<dyn Pacer>,
    logger: Logger,
    chance: Mutex<Box<dyn Chance>>,
    workers: Mutex<Option<WorkerGroup>>,
}

impl SchedulerController {
    pub fn new(registry: Arc<Registry>, config: SimConfig, logger: Logger) -> Self {
        Self::with_pacer(registry, config, logger, Arc::new(SleepPacer))
    }

    pub fn with_pacer(
        registry: Arc<Registry>,
        config: SimConfig,
        logger: Logger,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        let chance = Mutex::new(chance_for(&config, CONTROL_ACTOR));
        Self {
            registry,
            config,
            algorithm: AlgorithmHandle::default(),
            pacer,
            logger,
            chance,
            workers: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.workers.lock().is_some()
    }

    pub fn algorithm(&self) -> SchedulingAlgorithm {
        self.algorithm.get()
    }

    /// Spawns one worker per core plus the I/O manager
    ///
    /// Seeds `initial_process_count` processes when the table is empty.
    pub fn start(&self, algorithm: SchedulingAlgorithm) -> Result<(), ControlError> {
        let mut slot = self.workers.lock();
        if slot.is_some() {
            self.logger
                .warn(LogSource::Controller, "start rejected: already running")
                .emit();
            return Err(ControlError::AlreadyRunning);
        }

        self.algorithm.set(algorithm);
        {
            let mut state = self.registry.lock();
            if state.process_count() == 0 {
                let mut chance = self.chance.lock();
                state.spawn_random_processes(
                    self.config.initial_process_count,
                    chance.as_mut(),
                    self.config.max_process_count,
                );
            }
            state.begin_run();
        }

        let mut group = WorkerGroup::default();
        if let Err(err) = self.spawn_workers(&mut group) {
            group.shutdown(self.join_timeout(), &self.logger);
            return Err(err);
        }
        *slot = Some(group);

        self.logger
            .info(LogSource::Controller, "scheduler started")
            .field("algorithm", algorithm)
            .field("cores", self.config.num_cores)
            .emit();
        Ok(())
    }

    fn spawn_workers(&self, group: &mut WorkerGroup) -> Result<(), ControlError> {
        let settings = CoreSettings::from_config(&self.config);
        for index in 0..self.config.num_cores {
            let worker = CoreWorker::new(
                CoreId(index),
                Arc::clone(&self.registry),
                self.algorithm.clone(),
                settings,
                chance_for(&self.config, index as u64),
                Arc::clone(&self.pacer),
                self.logger.clone(),
            );
            group.spawn(format!("core-{}", index), worker.running_flag(), move || {
                worker.run()
            })?;
        }

        let io = IoManager::new(
            Arc::clone(&self.registry),
            chance_for(&self.config, IO_ACTOR),
            Arc::clone(&self.pacer),
            self.logger.clone(),
            self.config.io_poll_interval_ms,
            self.config.io_complete_probability,
        );
        group.spawn("io-manager".to_string(), io.running_flag(), move || io.run())
    }

    /// Stops all workers and clears the registry for a fresh run
    ///
    /// Returns false if the scheduler was not running.
    pub fn stop(&self) -> bool {
        let Some(group) = self.workers.lock().take() else {
            return false;
        };
        group.shutdown(self.join_timeout(), &self.logger);
        self.registry.lock().reset();
        self.logger
            .info(LogSource::Controller, "scheduler stopped")
            .emit();
        true
    }

    /// Switches the policy used by every core at its next dispatch
    pub fn set_algorithm(&self, algorithm: SchedulingAlgorithm) {
        let previous = self.algorithm.get();
        self.algorithm.set(algorithm);
        if previous != algorithm {
            self.logger
                .info(LogSource::Controller, "algorithm changed")
                .field("from", previous)
                .field("to", algorithm)
                .emit();
        }
    }

    /// Like [`SchedulerController::set_algorithm`], by display name
    ///
    /// Unknown names fall back to FCFS.
    pub fn set_algorithm_by_name(&self, name: &str) -> SchedulingAlgorithm {
        let algorithm = SchedulingAlgorithm::parse(name).unwrap_or_else(|| {
            self.logger
                .warn(LogSource::Controller, "unknown algorithm, using FCFS")
                .field("name", name)
                .emit();
            SchedulingAlgorithm::default()
        });
        self.set_algorithm(algorithm);
        algorithm
    }

    /// Adds `count` random NEW processes; stops at the table limit
    pub fn spawn_processes(&self, count: usize) -> Vec<Pid> {
        let mut state = self.registry.lock();
        let mut chance = self.chance.lock();
        state.spawn_random_processes(count, chance.as_mut(), self.config.max_process_count)
    }

    pub fn spawn_process(
        &self,
        arrival_time: u64,
        burst_time: u64,
        priority: u32,
    ) -> Result<Pid, ControlError> {
        let max = self.config.max_process_count;
        let mut state = self.registry.lock();
        if state.process_count() >= max {
            return Err(ControlError::TableFull(max));
        }
        state
            .spawn_process(arrival_time, burst_time, priority, max)
            .ok_or(ControlError::PidsExhausted)
    }

    /// Moves a live process to BLOCKED, as if it had issued an I/O request
    ///
    /// Returns false if the process already finished or is already blocked.
    pub fn block_process(&self, pid: Pid) -> Result<bool, ControlError> {
        let (current, moved) = {
            let mut state = self.registry.lock();
            let current = state
                .process(pid)
                .map(|p| p.state)
                .ok_or(ControlError::ProcessNotFound(pid))?;
            if current.is_terminal() {
                return Ok(false);
            }
            (current, state.transition(pid, ProcessState::Blocked, None))
        };
        if moved {
            self.logger
                .info(LogSource::Process(pid), "blocked by request")
                .field("from", current)
                .emit();
        }
        Ok(moved)
    }

    fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.config.join_timeout_ms)
    }
}

impl Drop for SchedulerController {
    fn drop(&mut self) {
        if let Some(group) = self.workers.get_mut().take() {
            group.shutdown(Duration::from_millis(self.config.join_timeout_ms), &self.logger);
        }
    }
}

/// Starts, pauses and resets the RTOS engine
pub struct RtosController {
    registry: Arc<Registry>,
    config: SimConfig,
    pacer: Arc<dyn Pacer>,
    logger: Logger,
    chance: Mutex<Box<dyn Chance>>,
    engine: Mutex<Option<WorkerGroup>>,
}

impl RtosController {
    pub fn new(registry: Arc<Registry>, config: SimConfig, logger: Logger) -> Self {
        Self::with_pacer(registry, config, logger, Arc::new(SleepPacer))
    }

    pub fn with_pacer(
        registry: Arc<Registry>,
        config: SimConfig,
        logger: Logger,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        let chance = Mutex::new(chance_for(&config, CONTROL_ACTOR));
        Self {
            registry,
            config,
            pacer,
            logger,
            chance,
            engine: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.engine.lock().is_some()
    }

    /// Starts the engine thread, generating tasks if the table is empty
    ///
    /// A paused run resumes from the current table.
    pub fn start(&self) -> Result<(), ControlError> {
        let mut slot = self.engine.lock();
        if slot.is_some() {
            self.logger
                .warn(LogSource::Controller, "RTOS start rejected: already running")
                .emit();
            return Err(ControlError::AlreadyRunning);
        }

        if self.registry.lock().process_count() == 0 {
            self.generate_tasks(self.config.rtos.task_count);
        }

        let engine = RtosEngine::new(
            Arc::clone(&self.registry),
            self.config.rtos.clone(),
            chance_for(&self.config, RTOS_ACTOR),
            Arc::clone(&self.pacer),
            self.logger.clone(),
        );
        let mut group = WorkerGroup::default();
        group.spawn("rtos".to_string(), engine.running_flag(), move || engine.run())?;
        *slot = Some(group);
        Ok(())
    }

    /// Pauses the engine; the table and timeline are kept
    pub fn stop(&self) -> bool {
        let Some(group) = self.engine.lock().take() else {
            return false;
        };
        group.shutdown(self.join_timeout(), &self.logger);
        true
    }

    /// Stops the engine and clears tasks, timeline, clock and registers
    ///
    /// Event ids keep counting from where they were.
    pub fn reset(&self) {
        self.stop();
        self.registry.lock().reset();
        self.logger.info(LogSource::Controller, "RTOS reset").emit();
    }

    /// Replaces the table with `count` freshly generated tasks
    pub fn generate_tasks(&self, count: u32) -> Vec<Pid> {
        let mut state = self.registry.lock();
        let mut chance = self.chance.lock();
        state.load_rtos_tasks(count, &self.config.rtos, chance.as_mut())
    }

    /// Raises an interrupt serviced by a new ISR with PID `id`
    pub fn trigger_interrupt(&self, id: Pid) -> Result<EventId, ControlError> {
        let result = if self.is_running() {
            self.registry
                .lock()
                .trigger_interrupt(id, &self.config.rtos)
        } else {
            Err(ControlError::NotRunning)
        };

        match &result {
            Ok(event) => self
                .logger
                .info(LogSource::Controller, "interrupt triggered")
                .field("isr", id)
                .field("event", event)
                .emit(),
            Err(err) => self
                .logger
                .warn(LogSource::Controller, "interrupt rejected")
                .field("isr", id)
                .field("reason", err)
                .emit(),
        }
        result
    }

    fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.config.join_timeout_ms)
    }
}

impl Drop for RtosController {
    fn drop(&mut self) {
        if let Some(group) = self.engine.get_mut().take() {
            group.shutdown(Duration::from_millis(self.config.join_timeout_ms), &self.logger);
        }
    }
}

/// One registry shared by both modes, at most one mode running
pub struct Simulator {
    config: SimConfig,
    registry: Arc<Registry>,
    logger: Logger,
    scheduler: SchedulerController,
    rtos: RtosController,
    /// Mode of the last start; guards mode switches
    mode: Mutex<Option<SimMode>>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        Self::with_pacer(config, Arc::new(SleepPacer))
    }

    pub fn with_pacer(config: SimConfig, pacer: Arc<dyn Pacer>) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(Registry::new(config.num_cores));
        registry
            .lock()
            .set_timeline_capacity(config.rtos.timeline_capacity);
        let logger = Logger::new();
        let scheduler = SchedulerController::with_pacer(
            Arc::clone(&registry),
            config.clone(),
            logger.clone(),
            Arc::clone(&pacer),
        );
        let rtos = RtosController::with_pacer(
            Arc::clone(&registry),
            config.clone(),
            logger.clone(),
            pacer,
        );
        Ok(Self {
            config,
            registry,
            logger,
            scheduler,
            rtos,
            mode: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn scheduler(&self) -> &SchedulerController {
        &self.scheduler
    }

    pub fn rtos(&self) -> &RtosController {
        &self.rtos
    }

    /// Mode currently running, if any
    pub fn active_mode(&self) -> Option<SimMode> {
        if self.scheduler.is_running() {
            Some(SimMode::MultiCore)
        } else if self.rtos.is_running() {
            Some(SimMode::Rtos)
        } else {
            None
        }
    }

    pub fn start_multicore(&self, algorithm: SchedulingAlgorithm) -> Result<(), ControlError> {
        let mut mode = self.mode.lock();
        if self.rtos.is_running() {
            return Err(self.conflict(SimMode::Rtos));
        }
        self.enter_mode(&mut mode, SimMode::MultiCore);
        self.scheduler.start(algorithm)
    }

    pub fn stop_multicore(&self) -> bool {
        self.scheduler.stop()
    }

    pub fn start_rtos(&self) -> Result<(), ControlError> {
        let mut mode = self.mode.lock();
        if self.scheduler.is_running() {
            return Err(self.conflict(SimMode::MultiCore));
        }
        self.enter_mode(&mut mode, SimMode::Rtos);
        self.rtos.start()
    }

    pub fn stop_rtos(&self) -> bool {
        self.rtos.stop()
    }

    /// Clears the RTOS run; refused while the multi-core scheduler owns
    /// the registry
    pub fn reset_rtos(&self) -> Result<(), ControlError> {
        let _mode = self.mode.lock();
        if self.scheduler.is_running() {
            return Err(self.conflict(SimMode::MultiCore));
        }
        self.rtos.reset();
        Ok(())
    }

    pub fn set_algorithm(&self, algorithm: SchedulingAlgorithm) {
        self.scheduler.set_algorithm(algorithm);
    }

    /// Raises an interrupt with a raw id from the control surface
    pub fn trigger_interrupt(&self, id: u32) -> Result<EventId, ControlError> {
        let pid = Pid::new(id).ok_or(ControlError::InvalidPid(id))?;
        self.rtos.trigger_interrupt(pid)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    pub fn stats(&self) -> SchedulingStats {
        SchedulingStats::from_snapshot(&self.snapshot())
    }

    pub fn process(&self, pid: Pid) -> Option<Process> {
        self.registry.process(pid)
    }

    /// Stops whichever mode is running
    pub fn shutdown(&self) {
        self.scheduler.stop();
        self.rtos.stop();
    }

    /// A table left by the other mode is meaningless here, so switching
    /// modes starts from a clean registry.
    fn enter_mode(&self, mode: &mut Option<SimMode>, next: SimMode) {
        if matches!(*mode, Some(previous) if previous != next) {
            self.registry.lock().reset();
        }
        *mode = Some(next);
    }

    fn conflict(&self, active: SimMode) -> ControlError {
        self.logger
            .warn(LogSource::Controller, "command rejected: other mode running")
            .field("active", active)
            .emit();
        ControlError::ModeConflict { active }
    }
}
