//! Lifecycle Tests
//!
//! Validates that redundant or badly timed control commands are rejected
//! cleanly and never leave the registry in a corrupt state.

use sim_kernel::{
    ControlError, RegisterFile, RtosConfig, RtosEventKind, SchedulingAlgorithm, SimConfig, SimMode,
};
use std::time::Duration;
use tests_concurrency::{fast_config, test_simulator, wait_until};

/// RTOS config whose engine cycles slowly enough to observe a pending IRQ
fn slow_rtos_config() -> SimConfig {
    SimConfig {
        rtos: RtosConfig {
            tick_interval_ms: 200,
            ..RtosConfig::default()
        },
        ..fast_config()
    }
}

/// Test: repeated start/stop cycles
#[test]
fn test_start_stop_cycles() {
    let sim = test_simulator(fast_config());
    assert!(!sim.stop_multicore());

    for _ in 0..5 {
        sim.start_multicore(SchedulingAlgorithm::RoundRobin).unwrap();
        assert_eq!(
            sim.start_multicore(SchedulingAlgorithm::Fcfs),
            Err(ControlError::AlreadyRunning)
        );
        std::thread::sleep(Duration::from_millis(10));
        sim.registry().check_invariants().unwrap();
        assert!(sim.stop_multicore());
        assert!(!sim.stop_multicore());

        let snapshot = sim.snapshot();
        assert!(snapshot.processes.is_empty());
        assert_eq!(snapshot.clock, 0);
        assert!(snapshot.histories.iter().all(|h| h.is_empty()));
    }
}

/// Test: each start gets a fresh run id
#[test]
fn test_each_run_has_its_own_id() {
    let sim = test_simulator(fast_config());
    sim.start_multicore(SchedulingAlgorithm::Fcfs).unwrap();
    let first = sim.snapshot().run_id;
    sim.stop_multicore();
    sim.start_multicore(SchedulingAlgorithm::Fcfs).unwrap();
    let second = sim.snapshot().run_id;
    sim.stop_multicore();
    assert_ne!(first, second);
}

/// Test: only one interrupt may be pending at a time
#[test]
fn test_second_interrupt_rejected_while_pending() {
    let sim = test_simulator(slow_rtos_config());
    sim.start_rtos().unwrap();

    sim.trigger_interrupt(90).unwrap();
    assert_eq!(sim.trigger_interrupt(91), Err(ControlError::InterruptPending));
    assert!(sim.process(core_types::Pid::new(91).unwrap()).is_none());

    // once the engine picks it up, the next interrupt is accepted
    assert!(wait_until(Duration::from_secs(2), || sim
        .snapshot()
        .pending_isr
        .is_none()));
    assert!(sim.trigger_interrupt(91).is_ok());
    sim.reset_rtos().unwrap();
}

/// Test: event ids keep increasing across resets
#[test]
fn test_event_ids_survive_reset() {
    let sim = test_simulator(fast_config());
    sim.start_rtos().unwrap();
    assert!(wait_until(Duration::from_secs(2), || sim
        .snapshot()
        .timeline
        .len()
        >= 3));
    sim.stop_rtos();
    let before = sim.snapshot().timeline.last().map(|e| e.id).unwrap();

    sim.reset_rtos().unwrap();
    let cleared = sim.snapshot();
    assert!(cleared.timeline.is_empty());
    assert!(cleared.processes.is_empty());
    assert_eq!(cleared.registers, RegisterFile::default());

    sim.start_rtos().unwrap();
    assert!(wait_until(Duration::from_secs(2), || !sim
        .snapshot()
        .timeline
        .is_empty()));
    sim.stop_rtos();
    let after = sim.snapshot().timeline.first().map(|e| e.id).unwrap();
    assert!(after > before);
}

/// Test: stop pauses the RTOS and start resumes from the same table
#[test]
fn test_rtos_pause_and_resume() {
    let sim = test_simulator(fast_config());
    sim.start_rtos().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert!(sim.stop_rtos());
    assert!(!sim.stop_rtos());

    let paused = sim.snapshot();
    assert_eq!(paused.processes.len(), 5);
    let clock = paused.clock;

    sim.start_rtos().unwrap();
    assert!(wait_until(Duration::from_secs(2), || sim.snapshot().clock > clock));
    sim.stop_rtos();

    let resumed = sim.snapshot();
    let pids: Vec<_> = resumed.processes.iter().map(|p| p.pid).collect();
    let paused_pids: Vec<_> = paused.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, paused_pids);
    sim.registry().check_invariants().unwrap();
}

/// Test: RTOS events are ordered by id with non-decreasing timestamps
#[test]
fn test_rtos_timeline_order_with_interrupts() {
    let sim = test_simulator(fast_config());
    sim.start_rtos().unwrap();
    for id in 100..110 {
        let _ = sim.trigger_interrupt(id);
        std::thread::sleep(Duration::from_millis(5));
    }
    sim.stop_rtos();

    let timeline = sim.snapshot().timeline;
    assert!(timeline.windows(2).all(|w| w[0].id < w[1].id));
    assert!(timeline.windows(2).all(|w| w[0].time <= w[1].time));
    assert!(timeline.iter().any(|e| e.kind == RtosEventKind::IsrExec));
    sim.registry().check_invariants().unwrap();
}

/// Test: the two modes exclude each other
#[test]
fn test_modes_exclude_each_other() {
    let sim = test_simulator(fast_config());
    sim.start_multicore(SchedulingAlgorithm::Fcfs).unwrap();
    assert_eq!(
        sim.start_rtos(),
        Err(ControlError::ModeConflict {
            active: SimMode::MultiCore
        })
    );
    sim.stop_multicore();

    sim.start_rtos().unwrap();
    assert_eq!(
        sim.start_multicore(SchedulingAlgorithm::Fcfs),
        Err(ControlError::ModeConflict {
            active: SimMode::Rtos
        })
    );
    sim.reset_rtos().unwrap();
    assert_eq!(sim.active_mode(), None);
}

/// Test: an RTOS reset cannot wipe the registry under running cores
#[test]
fn test_rtos_reset_rejected_during_multicore_run() {
    let sim = test_simulator(fast_config());
    sim.start_multicore(SchedulingAlgorithm::RoundRobin).unwrap();
    assert!(wait_until(Duration::from_secs(2), || sim.snapshot().clock > 20));
    let before = sim.snapshot();

    assert_eq!(
        sim.reset_rtos(),
        Err(ControlError::ModeConflict {
            active: SimMode::MultiCore
        })
    );

    let after = sim.snapshot();
    assert!(after.clock >= before.clock);
    assert_eq!(after.processes.len(), before.processes.len());
    assert_eq!(after.run_id, before.run_id);
    assert!(sim.scheduler().is_running());

    let samples = tests_concurrency::sample_registry(&sim, Duration::from_millis(30)).unwrap();
    assert!(samples.windows(2).all(|w| w[0].clock <= w[1].clock));
    assert!(samples.iter().all(|s| s.clock >= before.clock));
    sim.stop_multicore();

    // with the scheduler stopped the reset goes through
    assert_eq!(sim.reset_rtos(), Ok(()));
}
