use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters kept by a ring when `enable_metrics` is set.
///
/// All updates are `Relaxed`; the counters are statistics, never used to
/// synchronize slot access.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    enqueue_calls: AtomicU64,
    dequeue_calls: AtomicU64,
    full: AtomicU64,
    empty: AtomicU64,
    cas_retries: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_enqueued(&self, n: u32) {
        self.enqueued.fetch_add(u64::from(n), Ordering::Relaxed);
        self.enqueue_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_dequeued(&self, n: u32) {
        self.dequeued.fetch_add(u64::from(n), Ordering::Relaxed);
        self.dequeue_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_full(&self) {
        self.full.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_empty(&self) {
        self.empty.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_cas_retries(&self, n: u64) {
        if n > 0 {
            self.cas_retries.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            enqueue_calls: self.enqueue_calls.load(Ordering::Relaxed),
            dequeue_calls: self.dequeue_calls.load(Ordering::Relaxed),
            full: self.full.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a ring's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Elements published by producers.
    pub enqueued: u64,
    /// Elements removed by consumers (accepted peeks included).
    pub dequeued: u64,
    /// Producer operations that published at least one element.
    pub enqueue_calls: u64,
    /// Consumer operations that removed at least one element.
    pub dequeue_calls: u64,
    /// Producer operations that found no room.
    pub full: u64,
    /// Consumer operations that found nothing.
    pub empty: u64,
    /// Lost CAS races plus waits on other threads' in-flight operations.
    pub cas_retries: u64,
}
