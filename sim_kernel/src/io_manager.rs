//! I/O completion manager
//!
//! A single background actor that returns blocked processes to the ready
//! queue. It polls more slowly than the cores tick and only ever looks at
//! the head of the blocked queue, so completion latency is unpredictable
//! but FIFO among blocked processes.

use crate::chance::Chance;
use crate::registry::Registry;
use crate::timer::Pacer;
use core_types::{Pid, ProcessState};
use services_logger::{LogSource, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Background I/O completion actor
pub struct IoManager {
    registry: Arc<Registry>,
    chance: Box<dyn Chance>,
    pacer: Arc<dyn Pacer>,
    logger: Logger,
    poll_interval_ms: u64,
    complete_probability: f64,
    running: Arc<AtomicBool>,
}

impl IoManager {
    pub fn new(
        registry: Arc<Registry>,
        chance: Box<dyn Chance>,
        pacer: Arc<dyn Pacer>,
        logger: Logger,
        poll_interval_ms: u64,
        complete_probability: f64,
    ) -> Self {
        Self {
            registry,
            chance,
            pacer,
            logger,
            poll_interval_ms,
            complete_probability,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Waits one poll interval, then maybe completes the head request
    ///
    /// Returns the PID moved back to READY, if any.
    pub fn cycle(&mut self) -> Option<Pid> {
        self.pacer.pause(self.poll_interval_ms);

        let (head, now) = {
            let mut state = self.registry.lock();
            let head = state.blocked_queue().front().copied()?;
            if !self.chance.roll(self.complete_probability)
                || !state.transition(head, ProcessState::Ready, None)
            {
                return None;
            }
            (head, state.now())
        };
        self.logger
            .debug(LogSource::IoManager, "I/O completed")
            .field("pid", head)
            .field("time", now)
            .emit();
        Some(head)
    }

    /// Cycles until the running flag is cleared
    pub fn run(mut self) {
        self.logger
            .info(LogSource::IoManager, "I/O manager started")
            .emit();
        while self.running.load(Ordering::Acquire) {
            self.cycle();
        }
        self.logger
            .info(LogSource::IoManager, "I/O manager stopped")
            .emit();
    }
}
