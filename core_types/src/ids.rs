//! Unique identifiers for simulation entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Process identifier
///
/// PIDs are positive integers handed out in increasing order by the
/// registry. A PID is never reused while any queue or running slot still
/// refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(u32);

impl Pid {
    /// Creates a PID from a raw value
    ///
    /// Returns `None` for zero, which is never a valid PID.
    pub const fn new(raw: u32) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Returns the raw value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the PID that follows this one
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The first PID handed out on a fresh registry
    pub const FIRST: Pid = Pid(1);
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Identifier for a virtual CPU core
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoreId(pub usize);

impl CoreId {
    /// The core that admits new processes and advances the global clock
    pub const BOOT: CoreId = CoreId(0);

    /// Returns true for the designated clock-owning core
    pub fn is_boot(&self) -> bool {
        *self == Self::BOOT
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Core{}", self.0)
    }
}

/// Identifier for a recorded scheduling event
///
/// Event ids are strictly increasing in recording order and are never
/// reused, even when two events share a simulated timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Creates an event id from a raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier for one simulation run
///
/// A fresh id is minted every time a simulation is started, so snapshot
/// consumers can tell a reset apart from a clock that went backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a run ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Run({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_rejects_zero() {
        assert!(Pid::new(0).is_none());
        assert_eq!(Pid::new(7).map(|p| p.as_u32()), Some(7));
    }

    #[test]
    fn test_pid_next_is_monotonic() {
        let pid = Pid::FIRST;
        assert!(pid.next() > pid);
        assert_eq!(pid.next().as_u32(), 2);
    }

    #[test]
    fn test_pid_display() {
        let pid = Pid::new(42).unwrap();
        assert_eq!(format!("{}", pid), "P42");
    }

    #[test]
    fn test_core_id_boot() {
        assert!(CoreId(0).is_boot());
        assert!(!CoreId(3).is_boot());
        assert_eq!(format!("{}", CoreId(3)), "Core3");
    }

    #[test]
    fn test_event_id_ordering() {
        assert!(EventId::from_raw(1) < EventId::from_raw(2));
        assert_eq!(format!("{}", EventId::from_raw(9)), "#9");
    }

    #[test]
    fn test_run_id_creation() {
        let id1 = RunId::new();
        let id2 = RunId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_run_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = RunId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
        assert!(format!("{}", id).starts_with("Run("));
    }

    #[test]
    fn test_pid_serializes_as_number() {
        let pid = Pid::new(5).unwrap();
        assert_eq!(serde_json::to_string(&pid).unwrap(), "5");
    }
}
