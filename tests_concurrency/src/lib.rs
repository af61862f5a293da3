//! Concurrency Test Utilities
//!
//! This crate provides shared utilities for tests that run the simulator on
//! real threads.
//!
//! ## Test Philosophy
//!
//! - **Invariants under contention**: queue disjointness and state
//!   consistency hold in every snapshot, whatever the interleaving
//! - **No loss, no duplication**: every process is accounted for exactly once
//! - **Redundant commands are harmless**: repeated start/stop/trigger never
//!   corrupt state
//! - **Bounded waits**: tests poll with deadlines instead of fixed sleeps

use sim_kernel::{RegistrySnapshot, RtosConfig, SimConfig, Simulator};
use std::time::{Duration, Instant};

/// Configuration with millisecond pacing and a fixed seed
pub fn fast_config() -> SimConfig {
    SimConfig {
        num_cores: 4,
        tick_interval_ms: 1,
        io_poll_interval_ms: 2,
        join_timeout_ms: 2000,
        seed: Some(42),
        rtos: RtosConfig {
            tick_interval_ms: 1,
            ..RtosConfig::default()
        },
        ..SimConfig::default()
    }
}

/// Creates a simulator that sleeps between ticks like production
pub fn test_simulator(config: SimConfig) -> Simulator {
    match Simulator::new(config) {
        Ok(simulator) => simulator,
        Err(err) => panic!("invalid test config: {}", err),
    }
}

/// Polls `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Samples the registry for `duration`, checking invariants every time
///
/// Returns the snapshots taken, oldest first.
pub fn sample_registry(
    simulator: &Simulator,
    duration: Duration,
) -> Result<Vec<RegistrySnapshot>, String> {
    let deadline = Instant::now() + duration;
    let mut samples = Vec::new();
    while Instant::now() < deadline {
        simulator.registry().check_invariants()?;
        samples.push(simulator.snapshot());
        std::thread::sleep(Duration::from_millis(2));
    }
    Ok(samples)
}

/// Checks that a snapshot's queues and slots never share a PID
pub fn assert_disjoint(snapshot: &RegistrySnapshot) {
    let mut seen: Vec<_> = snapshot
        .ready
        .iter()
        .chain(snapshot.blocked.iter())
        .chain(snapshot.running.iter().flatten())
        .copied()
        .collect();
    let total = seen.len();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), total, "a PID appears twice in {:?}", snapshot);
}
