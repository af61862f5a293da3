//! Probabilistic decisions
//!
//! Admission, spontaneous I/O, I/O completion and RTOS wake/block are all
//! coin flips. They go through the [`Chance`] trait so that:
//!
//! - production runs use a seeded or entropy-backed RNG
//! - tests replay a scripted sequence of outcomes, with no randomness at all
//!
//! ## Example
//!
//! ```
//! use sim_kernel::chance::{Chance, ScriptedChance};
//!
//! let mut chance = ScriptedChance::new().with_rolls([true, false]);
//! assert!(chance.roll(0.5));
//! assert!(!chance.roll(0.5));
//! assert!(!chance.roll(0.5)); // exhausted: falls back to `false`
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Source of probabilistic outcomes
pub trait Chance: Send {
    /// Returns true with probability `p`
    fn roll(&mut self, p: f64) -> bool;

    /// Picks a value from the inclusive range `[low, high]`
    fn pick(&mut self, low: u64, high: u64) -> u64;

    /// Returns an arbitrary 32-bit word
    fn word(&mut self) -> u32;
}

/// RNG-backed chance source
#[derive(Debug, Clone)]
pub struct SeededChance {
    rng: StdRng,
}

impl SeededChance {
    /// Creates a reproducible source
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a source seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Derives an independent source for one actor
    ///
    /// With a configured seed every actor still gets its own stream, so
    /// the outcome of a run does not depend on which thread rolls first
    /// within a stream.
    pub fn for_actor(seed: Option<u64>, actor: u64) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed ^ actor.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            None => Self::from_entropy(),
        }
    }
}

impl Chance for SeededChance {
    fn roll(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    fn pick(&mut self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    fn word(&mut self) -> u32 {
        self.rng.gen()
    }
}

/// Scripted chance source for deterministic tests
///
/// Rolls and picks are served from queues in order. Once a queue runs dry
/// the fallback is used: `fallback_roll` for rolls, the low end of the
/// range for picks.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChance {
    rolls: VecDeque<bool>,
    picks: VecDeque<u64>,
    fallback_roll: bool,
    rolls_served: usize,
}

impl ScriptedChance {
    /// A source that never fires
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every roll succeeds
    pub fn always() -> Self {
        Self {
            fallback_roll: true,
            ..Self::default()
        }
    }

    /// Queues roll outcomes
    pub fn with_rolls(mut self, rolls: impl IntoIterator<Item = bool>) -> Self {
        self.rolls.extend(rolls);
        self
    }

    /// Queues pick outcomes; each is clamped into the requested range
    pub fn with_picks(mut self, picks: impl IntoIterator<Item = u64>) -> Self {
        self.picks.extend(picks);
        self
    }

    /// Number of rolls answered so far
    pub fn rolls_served(&self) -> usize {
        self.rolls_served
    }
}

impl Chance for ScriptedChance {
    fn roll(&mut self, p: f64) -> bool {
        self.rolls_served += 1;
        if p <= 0.0 {
            // keep the script aligned with the caller's sequence of questions
            self.rolls.pop_front();
            return false;
        }
        self.rolls.pop_front().unwrap_or(self.fallback_roll)
    }

    fn pick(&mut self, low: u64, high: u64) -> u64 {
        self.picks
            .pop_front()
            .map(|v| v.clamp(low, high.max(low)))
            .unwrap_or(low)
    }

    fn word(&mut self) -> u32 {
        0xDEAD_BEEF
    }
}
