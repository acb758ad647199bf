//! RingSync - Fixed-Capacity Lock-Free Ring Buffer
//!
//! A bounded FIFO of `Copy` element handles (indices, ids, wrapped pointers)
//! shared between threads without locks. Each side of the ring picks its own
//! synchronization discipline at creation:
//!
//! - **Single**: one thread on that side, plain stores, no CAS
//! - **Multi**: any number of threads, CAS reservation and in-order tail publication
//! - **HTS** (head-tail sync): any number of threads, one operation in flight
//!   at a time, which enables peek/commit
//!
//! # Key Features
//!
//! - Bulk (all-or-nothing) and burst (best-effort) batching with one
//!   reservation per batch
//! - Two-phase dequeue ([`Peek`]) and enqueue ([`Reservation`]) on Single/HTS sides
//! - Exact-size mode for non-power-of-two capacities
//! - Process-wide registry: create by name, look up from any thread
//! - 128-byte aligned cursors and slot storage, optional NUMA placement
//!
//! # Example
//!
//! ```
//! use ringsync_rs::{Ring, RingConfig, RingError, RingMode};
//!
//! let ring = Ring::<u32>::new(RingConfig::new(4, RingMode::SPSC)).unwrap();
//!
//! // Single element API
//! ring.enqueue(1).unwrap();
//!
//! // Burst: takes what fits
//! assert_eq!(ring.enqueue_burst(&[2, 3, 4, 5]), 3);
//! assert_eq!(ring.enqueue(6), Err(RingError::Full));
//!
//! // Bulk: all or nothing
//! let mut out = [0u32; 4];
//! assert_eq!(ring.dequeue_bulk(&mut out), 4);
//! assert_eq!(out, [1, 2, 3, 4]);
//! assert!(ring.is_empty());
//! ```

mod config;
mod cursor;
mod error;
mod invariants;
mod metrics;
mod numa;
pub mod registry;
mod reservation;
mod ring;
mod slots;
mod workers;

pub use config::{
    RingConfig, RingMode, Role, SyncType, HTS_CONFIG, MAX_CAPACITY, MPMC_CONFIG, SPSC_CONFIG,
};
pub use error::{CommitError, RingError, WorkerError};
pub use metrics::MetricsSnapshot;
pub use registry::NAME_MAX_LEN;
pub use reservation::{Peek, Reservation};
pub use ring::Ring;
pub use workers::{WorkerContext, WorkerPool, WorkerReport};

/// Spin-then-yield helper for caller retry loops on `Full`/`Empty`.
pub use crossbeam_utils::Backoff;
