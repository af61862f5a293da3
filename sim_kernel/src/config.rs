//! Simulation configuration
//!
//! Every knob is fixed for the lifetime of a simulator instance. The
//! probabilistic rates only affect pacing, never correctness, so tests are
//! free to set them to 0.0 or 1.0.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which end of the numeric priority scale wins under the Priority algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriorityOrder {
    /// Larger priority values are dispatched first
    #[default]
    HigherValueFirst,
    /// Smaller priority values are dispatched first
    LowerValueFirst,
}

impl PriorityOrder {
    /// Returns true if `candidate` is strictly more favorable than `best`
    pub fn prefers(&self, candidate: u32, best: u32) -> bool {
        match self {
            PriorityOrder::HigherValueFirst => candidate > best,
            PriorityOrder::LowerValueFirst => candidate < best,
        }
    }
}

/// Multi-core simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of virtual CPUs
    pub num_cores: usize,
    /// Round-robin time slice, in ticks
    pub time_slice: u64,
    /// Ticks consumed by one core step
    pub quantum: u64,
    /// Wall-clock pacing of one core step
    pub tick_interval_ms: u64,
    /// Wall-clock pacing of one I/O manager cycle
    pub io_poll_interval_ms: u64,
    /// Chance that a NEW process is admitted on a boot-core scan
    pub admission_probability: f64,
    /// Chance that a running process issues an I/O request on a step
    pub io_block_probability: f64,
    /// Chance that the I/O manager completes the head request on a cycle
    pub io_complete_probability: f64,
    /// Priority direction for the Priority algorithm
    pub priority_order: PriorityOrder,
    /// Processes seeded on start when the table is empty
    pub initial_process_count: usize,
    /// Upper bound on the process table size
    pub max_process_count: usize,
    /// Bounded wait when joining workers on stop
    pub join_timeout_ms: u64,
    /// Seed for all probabilistic decisions; entropy when unset
    pub seed: Option<u64>,
    /// Real-time mode settings
    pub rtos: RtosConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_cores: 4,
            time_slice: 2,
            quantum: 1,
            tick_interval_ms: 50,
            io_poll_interval_ms: 250,
            admission_probability: 0.5,
            io_block_probability: 0.01,
            io_complete_probability: 0.5,
            priority_order: PriorityOrder::HigherValueFirst,
            initial_process_count: 5,
            max_process_count: 20,
            join_timeout_ms: 1000,
            seed: None,
            rtos: RtosConfig::default(),
        }
    }
}

/// Real-time engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtosConfig {
    /// Simulated time advanced per scheduling cycle
    pub tick: u64,
    /// Wall-clock pacing of one cycle
    pub tick_interval_ms: u64,
    /// Tasks generated when the engine starts on an empty table
    pub task_count: u32,
    /// Inclusive priority range for ordinary tasks (lower value wins)
    pub priority_range: [u32; 2],
    /// Priority given to interrupt service routines
    pub isr_priority: u32,
    /// Execution budget of an interrupt service routine
    pub isr_budget: u64,
    /// Inclusive burst range for generated tasks
    pub task_burst_range: [u64; 2],
    /// Chance that the running ordinary task blocks on a cycle
    pub block_probability: f64,
    /// Chance that a blocked task wakes on a cycle
    pub wake_probability: f64,
    /// Maximum number of events retained in the timeline
    pub timeline_capacity: usize,
}

impl Default for RtosConfig {
    fn default() -> Self {
        Self {
            tick: 20,
            tick_interval_ms: 350,
            task_count: 5,
            priority_range: [1, 10],
            isr_priority: 0,
            isr_budget: 300,
            task_burst_range: [50, 200],
            block_probability: 0.05,
            wake_probability: 0.1,
            timeline_capacity: 2000,
        }
    }
}

impl SimConfig {
    /// Parses and validates a JSON configuration
    ///
    /// Missing keys take their default values.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cores == 0 {
            return Err(ConfigError::Invalid("num_cores must be at least 1".into()));
        }
        if self.time_slice == 0 {
            return Err(ConfigError::Invalid("time_slice must be at least 1".into()));
        }
        if self.quantum == 0 {
            return Err(ConfigError::Invalid("quantum must be at least 1".into()));
        }
        for (name, p) in [
            ("admission_probability", self.admission_probability),
            ("io_block_probability", self.io_block_probability),
            ("io_complete_probability", self.io_complete_probability),
            ("rtos.block_probability", self.rtos.block_probability),
            ("rtos.wake_probability", self.rtos.wake_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        self.rtos.validate()
    }
}

impl RtosConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let [low, high] = self.priority_range;
        if low > high {
            return Err(ConfigError::Invalid(format!(
                "rtos.priority_range is empty: [{}, {}]",
                low, high
            )));
        }
        if self.isr_priority >= low {
            return Err(ConfigError::Invalid(format!(
                "rtos.isr_priority {} must be more urgent than every task priority (< {})",
                self.isr_priority, low
            )));
        }
        let [burst_low, burst_high] = self.task_burst_range;
        if burst_low == 0 || burst_low > burst_high {
            return Err(ConfigError::Invalid(format!(
                "rtos.task_burst_range is invalid: [{}, {}]",
                burst_low, burst_high
            )));
        }
        if self.tick == 0 || self.isr_budget == 0 {
            return Err(ConfigError::Invalid(
                "rtos.tick and rtos.isr_budget must be positive".into(),
            ));
        }
        if self.timeline_capacity == 0 {
            return Err(ConfigError::Invalid(
                "rtos.timeline_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}
