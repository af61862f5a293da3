//! Clock and PID Tests
//!
//! Validates that simulated time only moves forward and that PIDs stay
//! unique when several threads create processes at once.

use core_types::Pid;
use sim_kernel::{SchedulingAlgorithm, SimConfig};
use std::collections::BTreeSet;
use std::time::Duration;
use tests_concurrency::{fast_config, sample_registry, test_simulator};

/// Test: the global clock never goes backwards between snapshots
#[test]
fn test_clock_is_monotonic() {
    let sim = test_simulator(fast_config());
    sim.start_multicore(SchedulingAlgorithm::RoundRobin).unwrap();

    let samples = sample_registry(&sim, Duration::from_millis(200)).unwrap();
    sim.stop_multicore();

    let clocks: Vec<u64> = samples.iter().map(|s| s.clock).collect();
    assert!(clocks.windows(2).all(|w| w[0] <= w[1]));
    assert!(clocks.last().copied().unwrap_or(0) > 0);
}

/// Test: concurrent spawners never hand out the same PID
#[test]
fn test_concurrent_spawns_get_unique_pids() {
    let config = SimConfig {
        max_process_count: 1000,
        ..fast_config()
    };
    let sim = test_simulator(config);
    sim.start_multicore(SchedulingAlgorithm::Fcfs).unwrap();

    let spawned: Vec<Vec<Pid>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut pids = Vec::new();
                    for _ in 0..10 {
                        pids.extend(sim.scheduler().spawn_processes(3));
                    }
                    pids
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let all: Vec<Pid> = spawned.into_iter().flatten().collect();
    let unique: BTreeSet<Pid> = all.iter().copied().collect();
    assert_eq!(all.len(), 120);
    assert_eq!(unique.len(), 120);

    let snapshot = sim.snapshot();
    // 5 seeded on start plus everything spawned
    assert_eq!(snapshot.processes.len(), 125);
    sim.stop_multicore();
}

/// Test: the table limit holds against concurrent spawners
#[test]
fn test_table_limit_holds_under_contention() {
    let config = SimConfig {
        max_process_count: 30,
        ..fast_config()
    };
    let sim = test_simulator(config);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..20 {
                    sim.scheduler().spawn_processes(1);
                }
            });
        }
    });

    assert_eq!(sim.snapshot().processes.len(), 30);
}
