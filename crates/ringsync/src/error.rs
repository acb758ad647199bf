//! Error types for ring operations.

use crate::Role;
use thiserror::Error;

/// Errors returned by ring creation, lookup and the data path.
///
/// `Full` and `Empty` are the ring's normal backpressure signals. Everything
/// else is a creation- or lookup-time failure that retrying will not fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// Capacity is zero, not a power of two (outside exact-size mode), or too large.
    #[error("invalid ring capacity {requested} (must be a power of two in 1..={max})")]
    InvalidCapacity {
        /// The capacity that was asked for.
        requested: u32,
        /// The largest capacity a ring supports.
        max: u32,
    },

    /// Name is empty or does not fit the registry's name limit.
    #[error("invalid ring name {name:?} (must be 1..{max_len} bytes)")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Names must be strictly shorter than this.
        max_len: usize,
    },

    /// A ring with this name is already registered in the process.
    #[error("ring {name:?} already exists")]
    AlreadyExists {
        /// The duplicate name.
        name: String,
    },

    /// No ring with this name is registered.
    #[error("ring {name:?} not found")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// A ring with this name exists but carries a different element type.
    #[error("ring {name:?} holds a different element type")]
    TypeMismatch {
        /// The name that was looked up.
        name: String,
    },

    /// The slot array could not be allocated.
    #[error("failed to allocate {bytes} bytes of slot storage")]
    OutOfMemory {
        /// Requested allocation size.
        bytes: usize,
    },

    /// Two-phase operations need a single-thread or HTS side.
    #[error("{side} side of this ring does not support two-phase operations")]
    PeekUnsupported {
        /// The side whose sync type rules out peek/commit.
        side: Role,
    },

    /// Not enough free slots.
    #[error("ring is full")]
    Full,

    /// Not enough elements.
    #[error("ring is empty")]
    Empty,
}

impl RingError {
    /// Returns `true` for the steady-state conditions a caller may retry.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Full | Self::Empty)
    }
}

/// Error returned when trying to accept more elements than were peeked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot accept {attempted} elements, only {available} peeked")]
pub struct CommitError {
    /// Number of elements the caller tried to accept.
    pub attempted: u32,
    /// Number of elements actually held by the peek.
    pub available: u32,
}

/// Errors from launching or joining a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn {role} worker {id}")]
    Spawn {
        role: Role,
        id: usize,
        #[source]
        source: std::io::Error,
    },

    /// A worker panicked before returning.
    #[error("{role} worker {id} panicked")]
    Panicked { role: Role, id: usize },
}
