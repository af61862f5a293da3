//! # Simulated Clock and Pacing
//!
//! Simulated time and wall-clock time are kept apart:
//!
//! - [`SimClock`] is the logical clock stored in the registry. It only moves
//!   forward, and only when an authorized actor advances it.
//! - [`Pacer`] decides how long a worker waits between steps. Production
//!   workers sleep; tests use [`NoPacer`] so they run as fast as the
//!   scheduler allows, without changing a single simulated tick.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Monotonic logical clock
///
/// # Examples
///
/// ```
/// use sim_kernel::timer::SimClock;
///
/// let mut clock = SimClock::new();
/// assert_eq!(clock.now(), 0);
///
/// clock.advance(20);
/// clock.advance(20);
/// assert_eq!(clock.now(), 40);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimClock {
    ticks: u64,
}

impl SimClock {
    /// Creates a clock starting at tick 0
    pub fn new() -> Self {
        Self { ticks: 0 }
    }

    /// Creates a clock starting at a specific tick count
    pub fn with_initial_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Advances the clock, saturating at `u64::MAX`
    pub fn advance(&mut self, delta: u64) -> u64 {
        self.ticks = self.ticks.saturating_add(delta);
        self.ticks
    }

    /// Returns the current tick count
    pub fn now(&self) -> u64 {
        self.ticks
    }
}

/// Wall-clock pacing between simulation steps
pub trait Pacer: Send + Sync {
    /// Waits roughly `millis` milliseconds
    fn pause(&self, millis: u64);
}

/// Pacer that really sleeps
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepPacer;

impl Pacer for SleepPacer {
    fn pause(&self, millis: u64) {
        std::thread::sleep(Duration::from_millis(millis));
    }
}

/// Pacer that only yields the thread
///
/// Simulated time still advances exactly as with [`SleepPacer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacer;

impl Pacer for NoPacer {
    fn pause(&self, _millis: u64) {
        std::thread::yield_now();
    }
}
