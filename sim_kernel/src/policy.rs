//! Dispatch policies
//!
//! A [`SchedulingAlgorithm`] decides which ready process a free core takes.
//! It is selected by name once, then shared with every worker through an
//! [`AlgorithmHandle`] so the control layer can switch policy live.

use crate::config::PriorityOrder;
use crate::registry::RegistryState;
use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Multi-core dispatch policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchedulingAlgorithm {
    /// First come, first served: ready queue head
    #[default]
    Fcfs,
    /// Ready queue head, preempted after the configured time slice
    RoundRobin,
    /// Most favorable priority value, first in queue order on ties
    Priority,
    /// Least remaining time, first in queue order on ties
    ShortestJobFirst,
}

impl SchedulingAlgorithm {
    pub const ALL: [SchedulingAlgorithm; 4] = [
        SchedulingAlgorithm::Fcfs,
        SchedulingAlgorithm::RoundRobin,
        SchedulingAlgorithm::Priority,
        SchedulingAlgorithm::ShortestJobFirst,
    ];

    /// Parses a policy name
    ///
    /// Accepts the usual short names case-insensitively. Returns `None` for
    /// anything else.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "FCFS" | "FIFO" => Some(Self::Fcfs),
            "RR" | "ROUNDROBIN" | "ROUND_ROBIN" | "ROUND-ROBIN" => Some(Self::RoundRobin),
            "PRIORITY" | "PRIO" => Some(Self::Priority),
            "SJF" | "SHORTESTJOBFIRST" | "SHORTEST_JOB_FIRST" => Some(Self::ShortestJobFirst),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fcfs => "FCFS",
            Self::RoundRobin => "RR",
            Self::Priority => "Priority",
            Self::ShortestJobFirst => "SJF",
        }
    }

    /// Whether running processes are preempted when their slice expires
    pub fn is_time_sliced(&self) -> bool {
        matches!(self, Self::RoundRobin)
    }

    /// Picks the next process from the ready queue without removing it
    pub fn select(&self, state: &RegistryState, order: PriorityOrder) -> Option<Pid> {
        let ready = state.ready_queue();
        match self {
            Self::Fcfs | Self::RoundRobin => ready.front().copied(),
            Self::Priority => first_best(state, ready.iter().copied(), |p| p.priority, |c, b| {
                order.prefers(c, b)
            }),
            Self::ShortestJobFirst => {
                first_best(state, ready.iter().copied(), |p| p.remaining_time, |c, b| c < b)
            }
        }
    }

    fn to_tag(self) -> u8 {
        match self {
            Self::Fcfs => 0,
            Self::RoundRobin => 1,
            Self::Priority => 2,
            Self::ShortestJobFirst => 3,
        }
    }

    fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::RoundRobin,
            2 => Self::Priority,
            3 => Self::ShortestJobFirst,
            _ => Self::Fcfs,
        }
    }
}

impl fmt::Display for SchedulingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scans `pids` in order and keeps the first strictly better candidate
fn first_best<K: Copy>(
    state: &RegistryState,
    pids: impl Iterator<Item = Pid>,
    key: impl Fn(&crate::process::Process) -> K,
    better: impl Fn(K, K) -> bool,
) -> Option<Pid> {
    let mut best: Option<(Pid, K)> = None;
    for pid in pids {
        let Some(process) = state.process(pid) else {
            continue;
        };
        let k = key(process);
        match best {
            Some((_, best_key)) if !better(k, best_key) => {}
            _ => best = Some((pid, k)),
        }
    }
    best.map(|(pid, _)| pid)
}

/// Live, shared algorithm selection
///
/// Cloning yields another handle to the same cell.
#[derive(Debug, Clone)]
pub struct AlgorithmHandle {
    tag: Arc<AtomicU8>,
}

impl AlgorithmHandle {
    pub fn new(algorithm: SchedulingAlgorithm) -> Self {
        Self {
            tag: Arc::new(AtomicU8::new(algorithm.to_tag())),
        }
    }

    pub fn get(&self) -> SchedulingAlgorithm {
        SchedulingAlgorithm::from_tag(self.tag.load(Ordering::Acquire))
    }

    pub fn set(&self, algorithm: SchedulingAlgorithm) {
        self.tag.store(algorithm.to_tag(), Ordering::Release);
    }
}

impl Default for AlgorithmHandle {
    fn default() -> Self {
        Self::new(SchedulingAlgorithm::Fcfs)
    }
}
