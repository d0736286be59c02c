//! Shared vocabulary for tangle: lock identities and modes, the observer hooks
//! a lock calls on every state transition, and the reports a lock-order
//! tracker produces.
//!
//! Nothing in here knows what a lock *is*. The tracker and the lock both
//! depend on this crate and never on each other.

use facet::Facet;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

mod observer;
mod report;

pub use observer::{LockObserver, NoopObserver};
pub use report::{CycleReport, LockLabel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    ZeroId(&'static str),
    CounterExhausted(&'static str),
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroId(field) => write!(f, "{field} must be non-zero"),
            Self::CounterExhausted(field) => write!(f, "{field} counter exhausted"),
        }
    }
}

impl Error for InvariantError {}

/// Process-unique identity of one lock instance.
///
/// Ids are never reused, so a tracker may keep referring to a lock after it
/// has been dropped without confusing it with a newer one.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct LockId(u64);

impl LockId {
    pub fn from_raw(value: u64) -> Result<Self, InvariantError> {
        if value == 0 {
            return Err(InvariantError::ZeroId("lock_id"));
        }
        Ok(Self(value))
    }

    pub fn next_process_local() -> Result<Self, InvariantError> {
        static NEXT_COUNTER: AtomicU64 = AtomicU64::new(1);
        let counter = NEXT_COUNTER.fetch_add(1, Ordering::Relaxed);
        if counter == u64::MAX {
            return Err(InvariantError::CounterExhausted("lock_id"));
        }
        Self::from_raw(counter)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock#{}", self.0)
    }
}

/// Whether the holding thread may take a lock again while it already holds it.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LockMode {
    /// Nested acquisition by the holding thread is allowed and counted; every
    /// acquisition needs a matching release.
    #[default]
    Recursive,
    /// At most one hold at a time. Re-acquisition by the holder is a usage
    /// error.
    ExclusiveOnce,
}

impl LockMode {
    pub fn is_recursive(self) -> bool {
        matches!(self, Self::Recursive)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::ExclusiveOnce => "exclusive-once",
        }
    }
}

/// What an observer is told about a lock: its identity and its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockRef {
    pub id: LockId,
    pub name: &'static str,
}

impl LockRef {
    pub fn new(id: LockId, name: &'static str) -> Self {
        Self { id, name }
    }

    pub fn label(self) -> LockLabel {
        LockLabel::instance(self.id, self.name)
    }
}

impl fmt::Display for LockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
