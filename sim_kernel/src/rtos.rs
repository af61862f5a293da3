//! # RTOS Preemptive Engine
//!
//! A strict-priority, fully preemptive scheduler that runs instead of the
//! multi-core workers. One thread owns the loop; the control layer only
//! injects interrupts through the registry.
//!
//! ## Cycle
//!
//! Each [`RtosEngine::run_cycle`]:
//!
//! 1. advances the simulated clock by one tick
//! 2. picks a target: a pending ISR unconditionally, otherwise the most
//!    urgent (lowest value) runnable task, after letting blocked tasks
//!    wake spontaneously
//! 3. context-switches if the target differs from the running task
//! 4. charges one tick to the running task, which may block or finish
//!
//! Every step is logged to the registry timeline with an event id taken
//! under the lock, so events sharing a timestamp keep a total order.
//!
//! Lower priority values are more urgent. Ties keep the running task.

use crate::chance::Chance;
use crate::config::RtosConfig;
use crate::error::ControlError;
use crate::process::Process;
use crate::registry::{RegisterFile, Registry, RegistryState, RtosEventKind};
use crate::timer::Pacer;
use core_types::{CoreId, EventId, Pid, ProcessState};
use services_logger::{LogSource, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The RTOS runs on a single core
pub const RTOS_CORE: CoreId = CoreId(0);

const REASON_IRQ: &str = "Hardware IRQ";
const REASON_PREEMPTION: &str = "Preemption";

impl RegistryState {
    /// Replaces the process table with `count` READY RTOS tasks
    ///
    /// Tasks get PIDs `1..=count`, a burst from `task_burst_range` and a
    /// priority from `priority_range`.
    pub fn load_rtos_tasks(
        &mut self,
        count: u32,
        config: &RtosConfig,
        chance: &mut dyn Chance,
    ) -> Vec<Pid> {
        self.clear_processes();
        let [burst_low, burst_high] = config.task_burst_range;
        let [prio_low, prio_high] = config.priority_range;
        let mut pids = Vec::with_capacity(count as usize);
        for raw in 1..=count {
            let Some(pid) = Pid::new(raw) else {
                continue;
            };
            let burst = chance.pick(burst_low, burst_high);
            let priority = chance.pick(u64::from(prio_low), u64::from(prio_high)) as u32;
            if self.insert_process(Process::rtos_task(pid, burst, priority)) {
                self.transition(pid, ProcessState::Ready, None);
                pids.push(pid);
            }
        }
        pids
    }

    /// Raises an external interrupt serviced by a new ISR with PID `id`
    ///
    /// Rejected without side effects if an interrupt is already pending or
    /// `id` names a live process.
    pub fn trigger_interrupt(
        &mut self,
        id: Pid,
        config: &RtosConfig,
    ) -> Result<EventId, ControlError> {
        if self.pending_isr().is_some() {
            return Err(ControlError::InterruptPending);
        }
        if self.process(id).is_some() {
            return Err(ControlError::PidInUse(id));
        }

        let now = self.now();
        self.insert_process(Process::isr(id, config.isr_budget, config.isr_priority, now));
        self.transition(id, ProcessState::Ready, None);
        self.set_pending_isr(Some(id));
        Ok(self.record_event(
            RtosEventKind::IsrTrigger,
            None,
            Some(id),
            "External hardware interrupt",
        ))
    }
}

/// The real-time scheduling loop
pub struct RtosEngine {
    registry: Arc<Registry>,
    config: RtosConfig,
    chance: Box<dyn Chance>,
    pacer: Arc<dyn Pacer>,
    logger: Logger,
    running: Arc<AtomicBool>,
    current: Option<Pid>,
    last_ran: Option<Pid>,
    idle: bool,
}

impl RtosEngine {
    /// Creates an engine, resuming whatever task holds the RTOS core
    pub fn new(
        registry: Arc<Registry>,
        config: RtosConfig,
        chance: Box<dyn Chance>,
        pacer: Arc<dyn Pacer>,
        logger: Logger,
    ) -> Self {
        let current = {
            let mut state = registry.lock();
            state.set_timeline_capacity(config.timeline_capacity);
            state.running_on(RTOS_CORE)
        };
        Self {
            registry,
            config,
            chance,
            pacer,
            logger,
            running: Arc::new(AtomicBool::new(true)),
            current,
            last_ran: current,
            idle: false,
        }
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Task currently holding the CPU
    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    /// Runs one scheduling cycle; returns the task left running
    pub fn run_cycle(&mut self) -> Option<Pid> {
        let registry = Arc::clone(&self.registry);
        let mut state = registry.lock();
        state.advance_clock(self.config.tick);

        if let Some(pid) = self.current {
            if state.running_on(RTOS_CORE) != Some(pid) {
                self.current = None;
            }
        }

        let (target, reason) = match state.take_pending_isr() {
            Some(isr) if state.process(isr).is_some() => (Some(isr), REASON_IRQ),
            _ => {
                self.wake_blocked(&mut state);
                (self.most_urgent(&state), REASON_PREEMPTION)
            }
        };

        if target != self.current {
            self.switch_to(&mut state, target, reason);
        }

        match self.current {
            Some(pid) => {
                self.idle = false;
                self.last_ran = Some(pid);
                self.execute(&mut state, pid);
            }
            None if !self.idle => {
                self.idle = true;
                state.record_event(RtosEventKind::Idle, self.last_ran, None, "Idle");
            }
            None => {}
        }
        self.current
    }

    /// Paces and cycles until the running flag is cleared
    ///
    /// The running task keeps its slot on exit, so a later engine resumes
    /// it.
    pub fn run(mut self) {
        self.logger.info(LogSource::Rtos, "RTOS started").emit();
        while self.running.load(Ordering::Acquire) {
            self.pacer.pause(self.config.tick_interval_ms);
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            self.run_cycle();
        }
        self.logger.info(LogSource::Rtos, "RTOS stopped").emit();
    }

    fn wake_blocked(&mut self, state: &mut RegistryState) {
        let blocked: Vec<Pid> = state.blocked_queue().iter().copied().collect();
        for pid in blocked {
            if self.chance.roll(self.config.wake_probability)
                && state.transition(pid, ProcessState::Ready, None)
            {
                state.record_event(RtosEventKind::Wakeup, None, Some(pid), "Sem Given");
            }
        }
    }

    /// Running task first so ties keep it, then the ready queue in order
    fn most_urgent(&self, state: &RegistryState) -> Option<Pid> {
        let runnable = |pid: Pid| {
            state
                .process(pid)
                .filter(|p| p.remaining_time > 0)
                .map(|p| (pid, p.priority))
        };
        let incumbent = self
            .current
            .filter(|pid| state.process(*pid).map(|p| p.state) == Some(ProcessState::Running))
            .and_then(runnable);

        state
            .ready_queue()
            .iter()
            .copied()
            .filter_map(runnable)
            .fold(incumbent, |best, (pid, priority)| match best {
                Some((_, best_priority)) if priority >= best_priority => best,
                _ => Some((pid, priority)),
            })
            .map(|(pid, _)| pid)
    }

    fn switch_to(&mut self, state: &mut RegistryState, target: Option<Pid>, reason: &str) {
        let prev = self.current.take();
        if let Some(prev_pid) = prev {
            match state.process(prev_pid).map(|p| (p.is_isr(), p.state)) {
                Some((true, _)) => {
                    state.transition(prev_pid, ProcessState::Terminated, None);
                    state.remove_process(prev_pid);
                }
                Some((false, ProcessState::Running)) => {
                    state.transition(prev_pid, ProcessState::Ready, None);
                }
                _ => {}
            }
            if target.is_some() {
                state.record_event(RtosEventKind::SwitchStart, Some(prev_pid), None, "Save Context");
            }
        }

        let Some(next) = target else {
            return;
        };
        if !state.transition(next, ProcessState::Running, Some(RTOS_CORE)) {
            return;
        }
        self.current = Some(next);

        let is_isr = state.process(next).map(Process::is_isr).unwrap_or(false);
        self.load_registers(state, next);
        let kind = if is_isr {
            RtosEventKind::IsrExec
        } else {
            RtosEventKind::TaskSwitch
        };
        state.record_event(kind, prev, Some(next), reason);
    }

    fn load_registers(&mut self, state: &mut RegistryState, pid: Pid) {
        let stack_base = state
            .process(pid)
            .map(Process::stack_base)
            .unwrap_or(crate::process::STACK_REGION_BASE);
        let r0 = self.chance.word();
        let registers = state.registers_mut();
        registers.sp = stack_base;
        registers.pc = RegisterFile::RESET_PC | (pid.as_u32() & 0xFFFF);
        registers.general[0] = r0;
    }

    fn execute(&mut self, state: &mut RegistryState, pid: Pid) {
        let tick = self.config.tick;
        let Some((finished, is_isr)) = state
            .process_mut(pid)
            .map(|p| (p.consume(tick), p.is_isr()))
        else {
            self.current = None;
            return;
        };

        if finished {
            if is_isr {
                state.record_event(RtosEventKind::IsrFinish, Some(pid), None, "ISR Return");
                state.transition(pid, ProcessState::Terminated, None);
                state.remove_process(pid);
            } else {
                state.transition(pid, ProcessState::Terminated, None);
                state.record_event(RtosEventKind::TaskFinish, Some(pid), None, "Task complete");
            }
            self.current = None;
            return;
        }

        if !is_isr && self.chance.roll(self.config.block_probability) {
            state.transition(pid, ProcessState::Blocked, None);
            state.record_event(RtosEventKind::Blocked, Some(pid), None, "Blocked");
            self.current = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chance::ScriptedChance;
    use crate::registry::RtosEvent;
    use crate::timer::NoPacer;

    fn pid(raw: u32) -> Pid {
        Pid::new(raw).unwrap()
    }

    fn quiet_config() -> RtosConfig {
        RtosConfig {
            block_probability: 0.0,
            wake_probability: 0.0,
            ..RtosConfig::default()
        }
    }

    /// Registry with tasks of the given (burst, priority), PIDs from 1
    fn registry_with(tasks: &[(u64, u32)]) -> Arc<Registry> {
        let registry = Arc::new(Registry::new(1));
        {
            let mut state = registry.lock();
            for (i, &(burst, priority)) in tasks.iter().enumerate() {
                let p = pid(i as u32 + 1);
                state.insert_process(Process::rtos_task(p, burst, priority));
                state.transition(p, ProcessState::Ready, None);
            }
        }
        registry
    }

    fn engine(registry: &Arc<Registry>, config: RtosConfig, chance: ScriptedChance) -> RtosEngine {
        RtosEngine::new(
            Arc::clone(registry),
            config,
            Box::new(chance),
            Arc::new(NoPacer),
            Logger::new(),
        )
    }

    fn kinds(events: &[RtosEvent]) -> Vec<RtosEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_selects_lowest_priority_value() {
        let registry = registry_with(&[(100, 5), (100, 2), (100, 7)]);
        let mut rtos = engine(&registry, quiet_config(), ScriptedChance::new());

        assert_eq!(rtos.run_cycle(), Some(pid(2)));
        let state = registry.lock();
        assert_eq!(state.now(), 20);
        assert_eq!(state.process(pid(2)).unwrap().remaining_time, 80);
        let event = state.timeline().back().unwrap();
        assert_eq!(event.kind, RtosEventKind::TaskSwitch);
        assert_eq!(event.next_pid, Some(pid(2)));
        assert_eq!(event.info, "Preemption");
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_running_task_keeps_cpu_on_tie() {
        let registry = registry_with(&[(100, 3), (100, 3)]);
        let mut rtos = engine(&registry, quiet_config(), ScriptedChance::new());

        assert_eq!(rtos.run_cycle(), Some(pid(1)));
        assert_eq!(rtos.run_cycle(), Some(pid(1)));
        let state = registry.lock();
        let switches = state
            .timeline()
            .iter()
            .filter(|e| e.kind == RtosEventKind::TaskSwitch)
            .count();
        assert_eq!(switches, 1);
    }

    #[test]
    fn test_task_runs_to_completion() {
        let registry = registry_with(&[(40, 3)]);
        let mut rtos = engine(&registry, quiet_config(), ScriptedChance::new());

        assert_eq!(rtos.run_cycle(), Some(pid(1)));
        assert_eq!(rtos.run_cycle(), None);

        let state = registry.lock();
        let p = state.process(pid(1)).unwrap();
        assert_eq!(p.state, ProcessState::Terminated);
        assert_eq!(p.finish_time, Some(40));
        let events: Vec<RtosEvent> = state.timeline().iter().cloned().collect();
        assert_eq!(
            kinds(&events),
            vec![RtosEventKind::TaskSwitch, RtosEventKind::TaskFinish]
        );
    }

    #[test]
    fn test_idle_recorded_once() {
        let registry = registry_with(&[(20, 3)]);
        let mut rtos = engine(&registry, quiet_config(), ScriptedChance::new());
        rtos.run_cycle();
        rtos.run_cycle();
        rtos.run_cycle();

        let state = registry.lock();
        let events: Vec<RtosEvent> = state.timeline().iter().cloned().collect();
        assert_eq!(
            kinds(&events),
            vec![
                RtosEventKind::TaskSwitch,
                RtosEventKind::TaskFinish,
                RtosEventKind::Idle
            ]
        );
        assert_eq!(events[2].prev_pid, Some(pid(1)));
    }

    #[test]
    fn test_interrupt_preempts_and_is_removed_after_finish() {
        let registry = registry_with(&[(1000, 2)]);
        let config = RtosConfig {
            isr_budget: 40,
            ..quiet_config()
        };
        let mut rtos = engine(&registry, config.clone(), ScriptedChance::new());
        rtos.run_cycle();

        let isr = pid(99);
        registry.lock().trigger_interrupt(isr, &config).unwrap();

        assert_eq!(rtos.run_cycle(), Some(isr));
        {
            let state = registry.lock();
            assert_eq!(state.pending_isr(), None);
            assert_eq!(state.process(pid(1)).unwrap().state, ProcessState::Ready);
            assert_eq!(state.registers().pc, 0x0800_0063);
            let last = state.timeline().back().unwrap();
            assert_eq!(last.kind, RtosEventKind::IsrExec);
            assert_eq!(last.prev_pid, Some(pid(1)));
            assert_eq!(last.info, "Hardware IRQ");
        }

        // ISR finishes on its second tick and the task resumes
        assert_eq!(rtos.run_cycle(), None);
        assert_eq!(rtos.run_cycle(), Some(pid(1)));

        let state = registry.lock();
        assert!(state.process(isr).is_none());
        let events: Vec<RtosEvent> = state.timeline().iter().cloned().collect();
        assert_eq!(
            kinds(&events),
            vec![
                RtosEventKind::TaskSwitch,
                RtosEventKind::IsrTrigger,
                RtosEventKind::SwitchStart,
                RtosEventKind::IsrExec,
                RtosEventKind::IsrFinish,
                RtosEventKind::TaskSwitch,
            ]
        );
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_second_trigger_rejected_while_pending() {
        let registry = registry_with(&[(100, 2)]);
        let config = quiet_config();
        let mut state = registry.lock();

        assert!(state.trigger_interrupt(pid(99), &config).is_ok());
        assert_eq!(
            state.trigger_interrupt(pid(98), &config),
            Err(ControlError::InterruptPending)
        );
        assert!(state.process(pid(98)).is_none());
        let triggers = state
            .timeline()
            .iter()
            .filter(|e| e.kind == RtosEventKind::IsrTrigger)
            .count();
        assert_eq!(triggers, 1);
    }

    #[test]
    fn test_trigger_rejects_live_pid() {
        let registry = registry_with(&[(100, 2)]);
        let mut state = registry.lock();
        assert_eq!(
            state.trigger_interrupt(pid(1), &quiet_config()),
            Err(ControlError::PidInUse(pid(1)))
        );
        assert_eq!(state.pending_isr(), None);
    }

    #[test]
    fn test_isr_interrupted_by_isr_is_discarded() {
        let registry = registry_with(&[(1000, 2)]);
        let config = quiet_config();
        let mut rtos = engine(&registry, config.clone(), ScriptedChance::new());

        registry.lock().trigger_interrupt(pid(90), &config).unwrap();
        assert_eq!(rtos.run_cycle(), Some(pid(90)));
        registry.lock().trigger_interrupt(pid(91), &config).unwrap();
        assert_eq!(rtos.run_cycle(), Some(pid(91)));

        let state = registry.lock();
        assert!(state.process(pid(90)).is_none());
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_blocking_and_wakeup() {
        let registry = registry_with(&[(1000, 2), (1000, 5)]);
        let config = RtosConfig {
            block_probability: 0.5,
            wake_probability: 0.5,
            ..RtosConfig::default()
        };
        // cycle 1: block roll true; cycle 2: wake roll false, block roll false;
        // cycle 3: wake roll true
        let chance = ScriptedChance::new().with_rolls([true, false, false, true]);
        let mut rtos = engine(&registry, config, chance);

        assert_eq!(rtos.run_cycle(), None);
        assert_eq!(registry.lock().blocked_queue().front(), Some(&pid(1)));

        assert_eq!(rtos.run_cycle(), Some(pid(2)));
        assert_eq!(rtos.run_cycle(), Some(pid(1)));

        let state = registry.lock();
        let events: Vec<RtosEvent> = state.timeline().iter().cloned().collect();
        assert!(kinds(&events).contains(&RtosEventKind::Blocked));
        assert!(kinds(&events).contains(&RtosEventKind::Wakeup));
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_isr_never_blocks() {
        let registry = Arc::new(Registry::new(1));
        let config = RtosConfig {
            block_probability: 1.0,
            ..quiet_config()
        };
        registry.lock().trigger_interrupt(pid(99), &config).unwrap();
        let mut rtos = engine(&registry, config, ScriptedChance::always());

        assert_eq!(rtos.run_cycle(), Some(pid(99)));
        assert!(registry.lock().blocked_queue().is_empty());
    }

    #[test]
    fn test_event_ids_strictly_increasing() {
        let registry = registry_with(&[(60, 4), (60, 3), (60, 6)]);
        let config = quiet_config();
        let mut rtos = engine(&registry, config.clone(), ScriptedChance::new());
        for i in 0..20 {
            if i % 4 == 0 {
                let _ = registry.lock().trigger_interrupt(pid(50 + i), &config);
            }
            rtos.run_cycle();
        }

        let state = registry.lock();
        let ids: Vec<u64> = state.timeline().iter().map(|e| e.id.as_u64()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let times: Vec<u64> = state.timeline().iter().map(|e| e.time).collect();
        assert!(times.windows(2).any(|w| w[0] == w[1]));
    }

    #[test]
    fn test_engine_resumes_running_task() {
        let registry = registry_with(&[(1000, 2)]);
        let mut first = engine(&registry, quiet_config(), ScriptedChance::new());
        first.run_cycle();
        drop(first);

        let second = engine(&registry, quiet_config(), ScriptedChance::new());
        assert_eq!(second.current(), Some(pid(1)));
    }

    #[test]
    fn test_load_rtos_tasks() {
        let registry = Arc::new(Registry::new(1));
        let mut chance = ScriptedChance::new().with_picks([120, 4, 10, 99]);
        let config = RtosConfig::default();
        let pids = registry.lock().load_rtos_tasks(3, &config, &mut chance);

        assert_eq!(pids, vec![pid(1), pid(2), pid(3)]);
        let state = registry.lock();
        let first = state.process(pid(1)).unwrap();
        assert_eq!((first.burst_time, first.priority), (120, 4));
        let second = state.process(pid(2)).unwrap();
        // picks are clamped into the configured ranges
        assert_eq!((second.burst_time, second.priority), (50, 10));
        assert_eq!(first.stack_base(), 0x2000_0400);
        assert_eq!(state.ready_queue().len(), 3);
    }
}
