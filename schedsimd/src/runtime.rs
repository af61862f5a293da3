//! # Host Runtime
//!
//! Drives one [`Simulator`] from a control script or a fixed plan and
//! collects everything it wants to show. The runtime never prints; the
//! binary decides what to do with [`HostRuntime::output`].

use crate::commands::{ControlCommand, RtosAction};
use crate::script::{ControlScript, ScriptError};
use core_types::Pid;
use sim_kernel::{
    ConfigError, ControlError, RegistrySnapshot, SchedulingAlgorithm, SimConfig, Simulator,
};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostRuntimeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Which engine the fixed plan runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Multi-core scheduler with I/O manager
    MultiCore,
    /// Priority-preemptive real-time engine
    Rtos,
}

/// Host runtime configuration
#[derive(Debug, Clone)]
pub struct HostRuntimeConfig {
    /// Mode used when no script is given
    pub mode: HostMode,
    /// Algorithm used when no script is given
    pub algorithm: SchedulingAlgorithm,
    /// Engine configuration
    pub sim: SimConfig,
    /// Optional control script; replaces the fixed plan
    pub script: Option<String>,
    /// Wall-clock length of the fixed plan
    pub duration_ms: u64,
    /// Raise one interrupt this far into an RTOS run
    pub interrupt_after_ms: Option<u64>,
    /// PID given to that interrupt's ISR
    pub interrupt_id: u32,
}

impl Default for HostRuntimeConfig {
    fn default() -> Self {
        Self {
            mode: HostMode::MultiCore,
            algorithm: SchedulingAlgorithm::Fcfs,
            sim: SimConfig::default(),
            script: None,
            duration_ms: 2000,
            interrupt_after_ms: None,
            interrupt_id: 99,
        }
    }
}

/// Host runtime
pub struct HostRuntime {
    config: HostRuntimeConfig,
    simulator: Simulator,
    script: Option<ControlScript>,
    output: Vec<String>,
    last_snapshot: Option<RegistrySnapshot>,
    quit: bool,
}

impl HostRuntime {
    /// Creates a new host runtime
    pub fn new(config: HostRuntimeConfig) -> Result<Self, HostRuntimeError> {
        let script = config
            .script
            .as_deref()
            .map(ControlScript::from_text)
            .transpose()?;
        let simulator = Simulator::new(config.sim.clone())?;

        Ok(Self {
            config,
            simulator,
            script,
            output: Vec::new(),
            last_snapshot: None,
            quit: false,
        })
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Lines produced so far
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Last state captured before the simulation was stopped
    pub fn final_snapshot(&self) -> Option<&RegistrySnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Runs the script, or the fixed plan when there is none
    ///
    /// Whatever is still running afterwards is captured and stopped.
    pub fn run(&mut self) -> Result<(), HostRuntimeError> {
        match self.script.take() {
            Some(mut script) => {
                while let Some(command) = script.next_command() {
                    self.execute(command)?;
                    if self.quit {
                        break;
                    }
                }
            }
            None => self.run_plan()?,
        }

        if self.simulator.active_mode().is_some() {
            self.capture();
            self.simulator.shutdown();
        }
        Ok(())
    }

    fn run_plan(&mut self) -> Result<(), HostRuntimeError> {
        match self.config.mode {
            HostMode::MultiCore => {
                self.simulator.start_multicore(self.config.algorithm)?;
                wait(self.config.duration_ms);
            }
            HostMode::Rtos => {
                self.simulator.start_rtos()?;
                let mut remaining = self.config.duration_ms;
                if let Some(after) = self.config.interrupt_after_ms {
                    let after = after.min(remaining);
                    wait(after);
                    remaining -= after;
                    self.simulator.trigger_interrupt(self.config.interrupt_id)?;
                }
                wait(remaining);
            }
        }
        Ok(())
    }

    /// Executes one control command
    ///
    /// Rejected commands become an `error:` line; the run goes on.
    pub fn execute(&mut self, command: ControlCommand) -> Result<(), HostRuntimeError> {
        let result = match command {
            ControlCommand::Start { algorithm } => {
                let algorithm = match algorithm {
                    Some(name) => SchedulingAlgorithm::parse(&name).unwrap_or_else(|| {
                        self.output
                            .push(format!("warning: unknown algorithm {}, using FCFS", name));
                        SchedulingAlgorithm::Fcfs
                    }),
                    None => self.config.algorithm,
                };
                self.simulator.start_multicore(algorithm)
            }
            ControlCommand::Stop => {
                if self.simulator.scheduler().is_running() {
                    self.capture();
                }
                self.simulator.stop_multicore();
                Ok(())
            }
            ControlCommand::Algorithm { name } => {
                let algorithm = self.simulator.scheduler().set_algorithm_by_name(&name);
                self.output.push(format!("algorithm: {}", algorithm));
                Ok(())
            }
            ControlCommand::Spawn { count } => {
                let spawned = self.simulator.scheduler().spawn_processes(count);
                self.output.push(format!("spawned: {}", spawned.len()));
                Ok(())
            }
            ControlCommand::Block { pid } => Pid::new(pid)
                .ok_or(ControlError::InvalidPid(pid))
                .and_then(|pid| self.simulator.scheduler().block_process(pid))
                .map(|_| ()),
            ControlCommand::Rtos(RtosAction::Start) => self.simulator.start_rtos(),
            ControlCommand::Rtos(RtosAction::Stop) => {
                self.simulator.stop_rtos();
                Ok(())
            }
            ControlCommand::Rtos(RtosAction::Reset) => self.simulator.reset_rtos(),
            ControlCommand::Interrupt { id } => self
                .simulator
                .trigger_interrupt(id)
                .map(|event| self.output.push(format!("interrupt: {} {}", id, event))),
            ControlCommand::Wait { millis } => {
                wait(millis);
                Ok(())
            }
            ControlCommand::Snapshot => {
                let json = self.simulator.snapshot().to_json()?;
                self.output.push(json);
                Ok(())
            }
            ControlCommand::Stats => {
                let json = serde_json::to_string(&self.simulator.stats())?;
                self.output.push(json);
                Ok(())
            }
            ControlCommand::Quit => {
                self.quit = true;
                Ok(())
            }
        };

        if let Err(err) = result {
            self.output.push(format!("error: {}", err));
        }
        Ok(())
    }

    fn capture(&mut self) {
        self.last_snapshot = Some(self.simulator.snapshot());
    }
}

fn wait(millis: u64) {
    if millis > 0 {
        thread::sleep(Duration::from_millis(millis));
    }
}
