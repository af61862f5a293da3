//! Integration tests for the schedsimd host runtime

use core_types::ProcessState;
use schedsimd::{HostMode, HostRuntime, HostRuntimeConfig, HostRuntimeError, ScriptError};
use sim_kernel::{RtosConfig, RtosEventKind, SchedulingAlgorithm, SimConfig};
use std::io::Write;

fn fast_config() -> SimConfig {
    SimConfig {
        num_cores: 2,
        tick_interval_ms: 1,
        io_poll_interval_ms: 2,
        admission_probability: 1.0,
        io_block_probability: 0.0,
        seed: Some(11),
        rtos: RtosConfig {
            tick_interval_ms: 1,
            block_probability: 0.0,
            wake_probability: 0.0,
            ..RtosConfig::default()
        },
        ..SimConfig::default()
    }
}

fn scripted(script: &str) -> HostRuntimeConfig {
    HostRuntimeConfig {
        sim: fast_config(),
        script: Some(script.to_string()),
        ..HostRuntimeConfig::default()
    }
}

#[test]
fn test_scripted_multicore_session() {
    let script = r#"
        spawn 3
        start RR
        wait 50ms
        algorithm SJF
        wait 50ms
        stats
        stop
    "#;

    let mut runtime = HostRuntime::new(scripted(script)).unwrap();
    runtime.run().unwrap();

    let output = runtime.output();
    assert_eq!(output[0], "spawned: 3");
    assert_eq!(output[1], "algorithm: SJF");
    let stats: serde_json::Value = serde_json::from_str(&output[2]).unwrap();
    assert_eq!(stats["total"], 3);

    // stop clears the registry, but the host kept what it looked like
    let snapshot = runtime.final_snapshot().unwrap();
    assert_eq!(snapshot.processes.len(), 3);
    assert!(snapshot.clock > 0);
    assert!(runtime.simulator().snapshot().processes.is_empty());
}

#[test]
fn test_rejected_commands_do_not_abort_the_script() {
    let script = r#"
        irq 5
        start
        start
        rtos start
        block 77
        quit
        spawn 1
    "#;

    let mut runtime = HostRuntime::new(scripted(script)).unwrap();
    runtime.run().unwrap();

    let errors: Vec<&String> = runtime
        .output()
        .iter()
        .filter(|line| line.starts_with("error:"))
        .collect();
    assert_eq!(errors.len(), 4);
    assert!(errors[0].contains("not running"));
    assert!(errors[1].contains("already running"));
    assert!(errors[2].contains("multi-core"));
    assert!(errors[3].contains("not found"));
    // nothing after quit ran
    assert!(!runtime.output().iter().any(|line| line.starts_with("spawned")));
    // run() stops whatever was left running
    assert_eq!(runtime.simulator().active_mode(), None);
}

#[test]
fn test_unknown_start_algorithm_falls_back_to_fcfs() {
    let mut runtime = HostRuntime::new(scripted("start lottery\nstop")).unwrap();
    runtime.run().unwrap();
    assert_eq!(
        runtime.output()[0],
        "warning: unknown algorithm lottery, using FCFS"
    );
    assert_eq!(
        runtime.simulator().scheduler().algorithm(),
        SchedulingAlgorithm::Fcfs
    );
}

#[test]
fn test_scripted_rtos_interrupt() {
    let script = r#"
        rtos start
        wait 20ms
        irq 99
        wait 50ms
        rtos stop
        snapshot
    "#;

    let mut runtime = HostRuntime::new(scripted(script)).unwrap();
    runtime.run().unwrap();

    assert!(runtime.output()[0].starts_with("interrupt: 99 #"));
    let snapshot = runtime.simulator().snapshot();
    let trigger = snapshot
        .timeline
        .iter()
        .position(|e| e.kind == RtosEventKind::IsrTrigger)
        .unwrap();
    assert!(snapshot.timeline[trigger..]
        .iter()
        .any(|e| e.kind == RtosEventKind::IsrExec));
    let ids: Vec<u64> = snapshot.timeline.iter().map(|e| e.id.as_u64()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_fixed_plan_captures_final_state() {
    let config = HostRuntimeConfig {
        mode: HostMode::MultiCore,
        algorithm: SchedulingAlgorithm::Priority,
        sim: fast_config(),
        duration_ms: 100,
        ..HostRuntimeConfig::default()
    };

    let mut runtime = HostRuntime::new(config).unwrap();
    runtime.run().unwrap();

    let snapshot = runtime.final_snapshot().unwrap();
    assert_eq!(snapshot.processes.len(), 5);
    assert!(snapshot
        .processes
        .iter()
        .any(|p| p.state != ProcessState::New));
    assert_eq!(runtime.simulator().active_mode(), None);
}

#[test]
fn test_fixed_rtos_plan_with_interrupt() {
    let config = HostRuntimeConfig {
        mode: HostMode::Rtos,
        sim: fast_config(),
        duration_ms: 60,
        interrupt_after_ms: Some(20),
        interrupt_id: 42,
        ..HostRuntimeConfig::default()
    };

    let mut runtime = HostRuntime::new(config).unwrap();
    runtime.run().unwrap();

    let snapshot = runtime.final_snapshot().unwrap();
    assert!(snapshot
        .timeline
        .iter()
        .any(|e| e.kind == RtosEventKind::IsrTrigger && e.next_pid.map(|p| p.as_u32()) == Some(42)));
}

#[test]
fn test_bad_script_is_rejected_up_front() {
    let result = HostRuntime::new(scripted("start\nlaunch rockets"));
    assert!(matches!(
        result,
        Err(HostRuntimeError::Script(ScriptError::ParseError { line: 2, .. }))
    ));
}

#[test]
fn test_config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"num_cores": 3, "seed": 5, "rtos": {{"tick": 10}}}}"#).unwrap();

    let sim = SimConfig::from_file(file.path()).unwrap();
    assert_eq!(sim.num_cores, 3);
    assert_eq!(sim.rtos.tick, 10);

    let runtime = HostRuntime::new(HostRuntimeConfig {
        sim,
        ..HostRuntimeConfig::default()
    })
    .unwrap();
    assert_eq!(runtime.simulator().snapshot().running.len(), 3);
}

#[test]
fn test_rtos_reset_refused_during_multicore_run() {
    let script = r#"
        start FCFS
        wait 30ms
        rtos reset
        snapshot
        stop
    "#;

    let mut runtime = HostRuntime::new(scripted(script)).unwrap();
    runtime.run().unwrap();

    let output = runtime.output();
    assert!(output[0].starts_with("error:"));
    assert!(output[0].contains("multi-core"));
    let snapshot: serde_json::Value = serde_json::from_str(&output[1]).unwrap();
    assert_eq!(snapshot["processes"].as_array().unwrap().len(), 5);
    assert!(snapshot["clock"].as_u64().unwrap() > 0);
}
