//! # Core Types
//!
//! This crate defines the fundamental types shared by the scheduling engine
//! and anything that consumes its snapshots.
//!
//! ## Key Types
//!
//! - [`Pid`]: Process identifier, positive and monotonically assigned
//! - [`CoreId`]: Virtual CPU index
//! - [`EventId`]: Strictly increasing event sequence number
//! - [`RunId`]: Identity of one simulation run
//! - [`ProcessState`]: The five-state process lifecycle

pub mod ids;
pub mod state;

pub use ids::{CoreId, EventId, Pid, RunId};
pub use state::ProcessState;
