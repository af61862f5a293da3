//! Aggregate scheduling metrics derived from a snapshot

use crate::snapshot::RegistrySnapshot;
use core_types::ProcessState;
use serde::Serialize;

/// Summary statistics for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulingStats {
    pub clock: u64,
    pub total: usize,
    pub new: usize,
    pub ready: usize,
    pub running: usize,
    pub blocked: usize,
    pub terminated: usize,
    pub active_cores: usize,
    pub num_cores: usize,
    /// Mean wait over terminated processes, `None` until one finishes
    pub average_wait: Option<f64>,
    /// Mean turnaround over terminated processes
    pub average_turnaround: Option<f64>,
    /// Mean response time over processes that have run at least once
    pub average_response: Option<f64>,
    /// Terminated processes per tick
    pub throughput: f64,
}

impl SchedulingStats {
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let finished: Vec<_> = snapshot
            .processes
            .iter()
            .filter(|p| p.state == ProcessState::Terminated)
            .collect();

        let average_wait = mean(finished.iter().map(|p| p.wait_time));
        let average_turnaround = mean(finished.iter().filter_map(|p| p.turnaround_time));
        let average_response = mean(snapshot.processes.iter().filter_map(|p| p.response_time));
        let throughput = if snapshot.clock == 0 {
            0.0
        } else {
            finished.len() as f64 / snapshot.clock as f64
        };

        Self {
            clock: snapshot.clock,
            total: snapshot.processes.len(),
            new: snapshot.count_in(ProcessState::New),
            ready: snapshot.count_in(ProcessState::Ready),
            running: snapshot.count_in(ProcessState::Running),
            blocked: snapshot.count_in(ProcessState::Blocked),
            terminated: finished.len(),
            active_cores: snapshot.active_cores(),
            num_cores: snapshot.running.len(),
            average_wait,
            average_turnaround,
            average_response,
            throughput,
        }
    }

    /// Fraction of cores holding a process
    pub fn utilization(&self) -> f64 {
        if self.num_cores == 0 {
            return 0.0;
        }
        self.active_cores as f64 / self.num_cores as f64
    }
}

fn mean(values: impl Iterator<Item = u64>) -> Option<f64> {
    let (sum, count) = values.fold((0u64, 0u64), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}
