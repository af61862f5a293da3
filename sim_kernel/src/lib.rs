//! # Simulated Scheduling Kernel
//!
//! This crate simulates how an operating system schedules processes, both
//! on a multi-core machine and under a priority-preemptive real-time
//! kernel.
//!
//! ## Architecture
//!
//! All mutable scheduling state lives in one [`Registry`] behind a single
//! lock. Every actor runs on its own thread and talks to the others only
//! through that registry:
//!
//! - one [`CoreWorker`] per virtual CPU (the boot core also admits new
//!   processes and advances the clock)
//! - one [`IoManager`] returning blocked processes to the ready queue
//! - in real-time mode, one [`RtosEngine`] instead of all of the above
//!
//! The control layer ([`SchedulerController`], [`RtosController`], and the
//! [`Simulator`] facade) starts and stops those threads.
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! Simulated time is an integer tick counter, wall-clock pacing sits behind
//! [`Pacer`] and every coin flip goes through [`Chance`]. Tests drive
//! single steps with scripted outcomes and get exact schedules; the same
//! code runs on real threads in production.

pub mod chance;
pub mod config;
pub mod controller;
pub mod error;
pub mod io_manager;
pub mod policy;
pub mod process;
pub mod registry;
pub mod rtos;
pub mod smp;
pub mod snapshot;
pub mod stats;
pub mod timer;
pub mod transition;

pub use chance::{Chance, ScriptedChance, SeededChance};
pub use config::{ConfigError, PriorityOrder, RtosConfig, SimConfig};
pub use controller::{RtosController, SchedulerController, Simulator};
pub use error::{ControlError, SimMode};
pub use io_manager::IoManager;
pub use policy::{AlgorithmHandle, SchedulingAlgorithm};
pub use process::{Process, ProcessKind};
pub use registry::{
    CoreEvent, HistoryEntry, RegisterFile, Registry, RegistryGuard, RegistryState, RtosEvent,
    RtosEventKind,
};
pub use rtos::{RtosEngine, RTOS_CORE};
pub use smp::{CoreSettings, CoreWorker, StepOutcome};
pub use snapshot::RegistrySnapshot;
pub use stats::SchedulingStats;
pub use timer::{NoPacer, Pacer, SimClock, SleepPacer};
