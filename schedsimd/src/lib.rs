//! # Scheduling Simulator Host
//!
//! This crate provides the headless host for the scheduling simulator.
//!
//! ## Responsibilities
//!
//! The host:
//! - Loads the engine configuration
//! - Starts, steers and stops a [`sim_kernel::Simulator`]
//! - Replays control scripts for unattended runs
//! - Hands back snapshots and statistics as JSON
//!
//! ## Non-Responsibilities
//!
//! The host does NOT:
//! - Render charts or tables
//! - Keep state of its own between runs
//! - Touch the registry except through the control layer

pub mod commands;
pub mod runtime;
pub mod script;

pub use commands::{CommandError, CommandParser, ControlCommand, RtosAction};
pub use runtime::{HostMode, HostRuntime, HostRuntimeConfig, HostRuntimeError};
pub use script::{ControlScript, ScriptError};
