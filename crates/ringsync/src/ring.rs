use crate::cursor::{Behavior, Claim, Cursor};
use crate::metrics::Metrics;
use crate::slots::SlotArray;
use crate::{
    registry, MetricsSnapshot, Peek, Reservation, RingConfig, RingError, RingMode, Role, SyncType,
};
use crossbeam_utils::CachePadded;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// =============================================================================
// RING LAYOUT & DATA PATH
// =============================================================================
//
// A ring is two cursors plus a power-of-two slot array:
//
//   prod (cache-padded)  : producer head/tail (or packed HTS word)
//   cons (cache-padded)  : consumer head/tail (or packed HTS word)
//   slots                : `size` elements, addressed by `sequence & mask`
//
// Every data-path call is: claim on our cursor -> copy -> finish on our
// cursor (see cursor.rs for the per-sync-type protocol). The copy happens
// strictly between claim and finish, so:
//
//   - a producer writes only slots in [prod.old_head, prod.new_head), which
//     the consumer cannot reach until prod.tail is published (Release);
//   - a consumer reads only slots in [cons.old_head, cons.new_head), which
//     producers cannot reuse until cons.tail is published (Release).
//
// Elements are `Copy` handles (indices, pointers wrapped in a Send type,
// packet ids...). The ring never looks inside them and never drops them.
//
// Full/empty: no sentinel slot. With monotonically increasing cursors,
// prod.tail == cons.tail means empty and prod.tail - cons.tail == capacity
// means full, so a ring of capacity 4 holds 4 elements.
//
// Two-phase guards: a Peek or Reservation keeps its claim open across calls.
// On a Single side the open claim leaves head != tail and the cursor refuses
// new claims. An HTS side would instead wait for the claim to finish, which
// never happens if the waiter is the thread holding the guard, so the ring
// records the holder thread per side and fails that thread's claims fast.
// =============================================================================

/// Fixed-capacity lock-free ring of `Copy` element handles.
///
/// The sync discipline of each side is fixed at creation by
/// [`RingMode`]. Using a `Single` side from more than one thread at a time
/// is a contract violation and loses or duplicates elements.
///
/// # Ordering
///
/// Elements from one producer thread are dequeued in the order that thread
/// enqueued them. How the elements of several concurrent producers
/// interleave depends on which reservation wins first and is unspecified.
///
/// # Progress
///
/// No operation takes a lock or waits in the kernel. Multi and HTS sides
/// may spin while another thread on the same side is mid-operation, so a
/// thread descheduled inside its operation can stall its peers.
pub struct Ring<T> {
    prod: CachePadded<Cursor>,
    cons: CachePadded<Cursor>,
    capacity: u32,
    config: RingConfig,
    name: Option<Box<str>>,
    metrics: Metrics,
    /// Thread token of the pending guard holder per side, 0 when none.
    guard_holder: [AtomicUsize; 2],
    slots: SlotArray<T>,
}

// Safety: slot access is coordinated by the cursor protocol; elements only
// move between threads, they are never shared.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T: Copy> Ring<T> {
    /// Creates an anonymous ring that is not visible to [`lookup`](Self::lookup).
    pub fn new(config: RingConfig) -> Result<Self, RingError> {
        Self::build(None, config, 0)
    }

    pub(crate) fn build(
        name: Option<&str>,
        config: RingConfig,
        start: u32,
    ) -> Result<Self, RingError> {
        let geometry = config.geometry()?;
        let slots = SlotArray::allocate(geometry.size, config.socket)?;

        Ok(Self {
            prod: CachePadded::new(Cursor::new(config.mode.producer, start)),
            cons: CachePadded::new(Cursor::new(config.mode.consumer, start)),
            capacity: geometry.capacity,
            config,
            name: name.map(Box::from),
            metrics: Metrics::new(),
            guard_holder: [AtomicUsize::new(0), AtomicUsize::new(0)],
            slots,
        })
    }

    /// Test hook: start both cursors at `start` to exercise counter wrap.
    #[cfg(test)]
    pub(crate) fn with_start(config: RingConfig, start: u32) -> Result<Self, RingError> {
        Self::build(None, config, start)
    }

    // ---------------------------------------------------------------------
    // PROPERTIES
    // ---------------------------------------------------------------------

    /// Registered name, `None` for anonymous rings.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Maximum number of elements the ring holds.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of physical slots (power of two, `>= capacity`).
    #[inline]
    pub fn size(&self) -> u32 {
        self.slots.size()
    }

    #[inline]
    pub fn mode(&self) -> RingMode {
        self.config.mode
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // OCCUPANCY (racy snapshots)
    // ---------------------------------------------------------------------

    /// Number of elements in the ring, as of some moment during the call.
    ///
    /// Concurrent operations make this approximate. Elements held by an
    /// unfinished [`Peek`] still count.
    #[inline]
    pub fn count(&self) -> u32 {
        // Consumer tail first: the producer tail read after it can only be
        // newer, so the difference never underflows.
        let cons_tail = self.cons.tail();
        let prod_tail = self.prod.tail();
        prod_tail.wrapping_sub(cons_tail).min(self.capacity)
    }

    /// Number of free slots, as of some moment during the call.
    #[inline]
    pub fn free_count(&self) -> u32 {
        self.capacity - self.count()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count() == self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    // ---------------------------------------------------------------------
    // SINGLE ELEMENT
    // ---------------------------------------------------------------------

    /// Enqueue one element, or `Err(RingError::Full)`.
    #[inline]
    pub fn enqueue(&self, item: T) -> Result<(), RingError> {
        let claim = self.claim(Role::Producer, 1, Behavior::Fixed).ok_or(RingError::Full)?;
        // SAFETY: the claim gives this thread exclusive ownership of the slot.
        unsafe { self.slots.write_one(claim.old_head, item) };
        self.finish(Role::Producer, claim, 1);
        Ok(())
    }

    /// Dequeue one element, or `Err(RingError::Empty)`.
    #[inline]
    pub fn dequeue(&self) -> Result<T, RingError> {
        let claim = self.claim(Role::Consumer, 1, Behavior::Fixed).ok_or(RingError::Empty)?;
        // SAFETY: the slot was published by a producer and is claimed by us.
        let item = unsafe { self.slots.read_one(claim.old_head) };
        self.finish(Role::Consumer, claim, 1);
        Ok(item)
    }

    // ---------------------------------------------------------------------
    // BULK / BURST
    // ---------------------------------------------------------------------
    //
    // One claim and one finish per call, whatever the batch size.
    // Bulk is all-or-nothing (returns 0 or items.len()); burst takes what
    // fits and returns how many, always a prefix of the input in order.

    /// Enqueue all of `items` or none. Returns `items.len()` or 0.
    pub fn enqueue_bulk(&self, items: &[T]) -> usize {
        self.enqueue_batch(items, Behavior::Fixed)
    }

    /// Enqueue as many leading elements of `items` as fit. Returns the count.
    pub fn enqueue_burst(&self, items: &[T]) -> usize {
        self.enqueue_batch(items, Behavior::Variable)
    }

    /// Fill all of `out` or nothing. Returns `out.len()` or 0.
    pub fn dequeue_bulk(&self, out: &mut [T]) -> usize {
        self.dequeue_batch(out, Behavior::Fixed)
    }

    /// Fill as much of the front of `out` as is available. Returns the count.
    pub fn dequeue_burst(&self, out: &mut [T]) -> usize {
        self.dequeue_batch(out, Behavior::Variable)
    }

    fn enqueue_batch(&self, items: &[T], behavior: Behavior) -> usize {
        if items.is_empty() {
            return 0;
        }
        let Some(claim) = self.claim(Role::Producer, batch_len(items.len()), behavior) else {
            return 0;
        };
        let n = claim.len as usize;
        // SAFETY: [old_head, old_head + n) is exclusively ours until finish.
        unsafe { self.slots.write(claim.old_head, &items[..n]) };
        self.finish(Role::Producer, claim, claim.len);
        n
    }

    fn dequeue_batch(&self, out: &mut [T], behavior: Behavior) -> usize {
        if out.is_empty() {
            return 0;
        }
        let Some(claim) = self.claim(Role::Consumer, batch_len(out.len()), behavior) else {
            return 0;
        };
        let n = claim.len as usize;
        // SAFETY: published by producers, exclusively ours until finish.
        unsafe { self.slots.read(claim.old_head, &mut out[..n]) };
        self.finish(Role::Consumer, claim, claim.len);
        n
    }

    // ---------------------------------------------------------------------
    // TWO-PHASE (Single and HTS sides)
    // ---------------------------------------------------------------------

    /// Reserve exactly `n` slots for writing; publish with
    /// [`Reservation::commit`].
    ///
    /// Fails with `PeekUnsupported` on a `Multi` producer side and with
    /// `Full` when `n` slots are not free (or `n == 0`).
    ///
    /// Until the reservation is finished, further enqueues on this ring fail
    /// with `Full` on a `Single` side and, from the holding thread, on an
    /// `Hts` side. Other threads on an `Hts` side wait for the commit.
    pub fn enqueue_start(&self, n: usize) -> Result<Reservation<'_, T>, RingError> {
        self.start_enqueue(n, Behavior::Fixed)
    }

    /// Like [`enqueue_start`](Self::enqueue_start) but reserves as many
    /// slots as are free, up to `n`.
    pub fn enqueue_burst_start(&self, n: usize) -> Result<Reservation<'_, T>, RingError> {
        self.start_enqueue(n, Behavior::Variable)
    }

    /// Peek at exactly `n` elements without removing them.
    ///
    /// The returned [`Peek`] decides their fate: accept removes them, reject
    /// (or drop) leaves them for the next dequeue. Fails with
    /// `PeekUnsupported` on a `Multi` consumer side and with `Empty` when
    /// fewer than `n` elements are available (or `n == 0`).
    ///
    /// Until the peek is finished, further dequeues on this ring fail with
    /// `Empty` on a `Single` side and, from the holding thread, on an `Hts`
    /// side. Other threads on an `Hts` side wait for the accept or reject.
    pub fn dequeue_start(&self, n: usize) -> Result<Peek<'_, T>, RingError> {
        self.start_dequeue(n, Behavior::Fixed)
    }

    /// Like [`dequeue_start`](Self::dequeue_start) but peeks at as many
    /// elements as are available, up to `n`.
    pub fn dequeue_burst_start(&self, n: usize) -> Result<Peek<'_, T>, RingError> {
        self.start_dequeue(n, Behavior::Variable)
    }

    fn start_enqueue(&self, n: usize, behavior: Behavior) -> Result<Reservation<'_, T>, RingError> {
        self.check_two_phase(Role::Producer)?;
        if n == 0 {
            return Err(RingError::Full);
        }
        let claim = self
            .claim(Role::Producer, batch_len(n), behavior)
            .ok_or(RingError::Full)?;
        self.hold(Role::Producer);
        Ok(Reservation::new(self, claim))
    }

    fn start_dequeue(&self, n: usize, behavior: Behavior) -> Result<Peek<'_, T>, RingError> {
        self.check_two_phase(Role::Consumer)?;
        if n == 0 {
            return Err(RingError::Empty);
        }
        let claim = self
            .claim(Role::Consumer, batch_len(n), behavior)
            .ok_or(RingError::Empty)?;
        self.hold(Role::Consumer);
        Ok(Peek::new(self, claim))
    }

    fn check_two_phase(&self, role: Role) -> Result<(), RingError> {
        let cursor = match role {
            Role::Producer => &*self.prod,
            Role::Consumer => &*self.cons,
        };
        if cursor.sync().supports_peek() {
            Ok(())
        } else {
            Err(RingError::PeekUnsupported { side: role })
        }
    }

    // ---------------------------------------------------------------------
    // INTERNAL: claim / finish / slot access
    // ---------------------------------------------------------------------

    #[inline]
    fn metrics_enabled(&self) -> Option<&Metrics> {
        self.config.enable_metrics.then_some(&self.metrics)
    }

    #[inline]
    fn claim(&self, role: Role, n: u32, behavior: Behavior) -> Option<Claim> {
        let metrics = self.metrics_enabled();
        let (ours, theirs) = match role {
            Role::Producer => (&*self.prod, &*self.cons),
            Role::Consumer => (&*self.cons, &*self.prod),
        };
        let claim = if ours.sync() == SyncType::Hts && self.held_by_caller(role) {
            None
        } else {
            ours.move_head(theirs, role, self.capacity, n, behavior, metrics)
        };
        if claim.is_none() {
            if let Some(m) = metrics {
                match role {
                    Role::Producer => m.add_full(),
                    Role::Consumer => m.add_empty(),
                }
            }
        }
        claim
    }

    /// Publish the first `n` slots of `claim`; the rest are handed back.
    #[inline]
    fn finish(&self, role: Role, claim: Claim, n: u32) {
        let metrics = self.metrics_enabled();
        let ours = match role {
            Role::Producer => &*self.prod,
            Role::Consumer => &*self.cons,
        };
        ours.finish(claim, n, metrics);

        if let (Some(m), true) = (metrics, n > 0) {
            match role {
                Role::Producer => m.add_enqueued(n),
                Role::Consumer => m.add_dequeued(n),
            }
        }
    }

    /// Finish the claim of a [`Peek`] or [`Reservation`] and clear its holder.
    pub(crate) fn finish_guard(&self, role: Role, claim: Claim, n: u32) {
        self.guard_holder(role).store(0, Ordering::Relaxed);
        self.finish(role, claim, n);
    }

    #[inline]
    fn guard_holder(&self, role: Role) -> &AtomicUsize {
        match role {
            Role::Producer => &self.guard_holder[0],
            Role::Consumer => &self.guard_holder[1],
        }
    }

    fn hold(&self, role: Role) {
        self.guard_holder(role).store(thread_token(), Ordering::Relaxed);
    }

    // Only the holder ever stores its own token, so Relaxed sees it.
    #[inline]
    fn held_by_caller(&self, role: Role) -> bool {
        let holder = self.guard_holder(role).load(Ordering::Relaxed);
        holder != 0 && holder == thread_token()
    }

    /// # Safety
    ///
    /// `pos` must lie in a producer claim held by the caller.
    #[inline]
    pub(crate) unsafe fn write_slot(&self, pos: u32, item: T) {
        self.slots.write_one(pos, item);
    }

    /// # Safety
    ///
    /// `pos` must lie in a consumer claim held by the caller.
    #[inline]
    pub(crate) unsafe fn read_slot(&self, pos: u32) -> T {
        self.slots.read_one(pos)
    }

    /// # Safety
    ///
    /// `[pos, pos + out.len())` must lie in a consumer claim held by the caller.
    #[inline]
    pub(crate) unsafe fn read_slots(&self, pos: u32, out: &mut [T]) {
        self.slots.read(pos, out);
    }

    // ---------------------------------------------------------------------
    // METRICS
    // ---------------------------------------------------------------------

    /// Snapshot of the ring's counters; all zero unless metrics are enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl<T: Copy + Send + 'static> Ring<T> {
    /// Creates a ring and registers it under `name` for [`lookup`](Self::lookup).
    ///
    /// Fails with `AlreadyExists` if the name is taken; an existing ring is
    /// never returned in its place.
    pub fn create(name: &str, config: RingConfig) -> Result<Arc<Self>, RingError> {
        registry::register(name, || Self::build(Some(name), config, 0))
    }

    /// Finds a ring created elsewhere in the process by name.
    pub fn lookup(name: &str) -> Result<Arc<Self>, RingError> {
        registry::lookup(name)
    }

    /// Unregisters the ring and drops this handle.
    ///
    /// The slot storage is released when the last handle is dropped; other
    /// threads still holding one keep a working ring.
    pub fn destroy(self: Arc<Self>) {
        if let Some(name) = self.name() {
            registry::unregister(name, Arc::as_ptr(&self).cast());
        }
    }
}

impl<T> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cons_tail = self.cons.tail();
        let prod_tail = self.prod.tail();
        f.debug_struct("Ring")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("size", &self.slots.size())
            .field("mode", &self.config.mode)
            .field("prod_head", &self.prod.head())
            .field("prod_tail", &prod_tail)
            .field("cons_head", &self.cons.head())
            .field("cons_tail", &cons_tail)
            .finish()
    }
}

/// Nonzero value unique to the calling thread while it runs.
fn thread_token() -> usize {
    thread_local!(static TOKEN: u8 = const { 0 });
    TOKEN.with(|t| std::ptr::addr_of!(*t) as usize)
}

/// Batch lengths beyond `u32::MAX` can never be satisfied; saturate.
#[inline]
fn batch_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [RingMode; 3] = [RingMode::SPSC, RingMode::MPMC, RingMode::HTS];

    fn ring(capacity: u32, mode: RingMode) -> Ring<u64> {
        Ring::new(RingConfig::new(capacity, mode)).unwrap()
    }

    #[test]
    fn test_spsc_capacity_four_scenario() {
        let ring = Ring::<char>::new(RingConfig::new(4, RingMode::SPSC)).unwrap();

        for c in ['A', 'B', 'C', 'D'] {
            ring.enqueue(c).unwrap();
        }
        assert_eq!(ring.count(), 4);
        assert!(ring.is_full());
        assert_eq!(ring.enqueue('X'), Err(RingError::Full));

        assert_eq!(ring.dequeue(), Ok('A'));
        assert_eq!(ring.count(), 3);

        ring.enqueue('E').unwrap();
        assert_eq!(ring.count(), 4);

        let drained: Vec<char> = std::iter::from_fn(|| ring.dequeue().ok()).collect();
        assert_eq!(drained, vec!['B', 'C', 'D', 'E']);
        assert!(ring.is_empty());
        assert_eq!(ring.dequeue(), Err(RingError::Empty));
    }

    #[test]
    fn test_bulk_all_or_nothing() {
        for mode in MODES {
            let ring = ring(8, mode);
            assert_eq!(ring.enqueue_bulk(&[1, 2, 3, 4, 5]), 5);
            assert_eq!(ring.free_count(), 3);

            // 4 > 3 free: nothing changes
            assert_eq!(ring.enqueue_bulk(&[6, 7, 8, 9]), 0);
            assert_eq!(ring.count(), 5);

            assert_eq!(ring.enqueue_bulk(&[6, 7, 8]), 3);
            assert!(ring.is_full());

            let mut out = [0u64; 9];
            assert_eq!(ring.dequeue_bulk(&mut out), 0);
            assert_eq!(ring.count(), 8);

            let mut out = [0u64; 8];
            assert_eq!(ring.dequeue_bulk(&mut out), 8);
            assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
        }
    }

    #[test]
    fn test_burst_takes_what_fits() {
        for mode in MODES {
            let ring = ring(4, mode);
            assert_eq!(ring.enqueue_burst(&[1, 2, 3]), 3);
            assert_eq!(ring.enqueue_burst(&[4, 5, 6]), 1);
            assert_eq!(ring.enqueue_burst(&[7]), 0);

            let mut out = [0u64; 3];
            assert_eq!(ring.dequeue_burst(&mut out), 3);
            assert_eq!(out, [1, 2, 3]);

            let mut out = [0u64; 3];
            assert_eq!(ring.dequeue_burst(&mut out), 1);
            assert_eq!(out[0], 4);
            assert_eq!(ring.dequeue_burst(&mut out), 0);
        }
    }

    #[test]
    fn test_empty_batches_are_noops() {
        let ring = ring(4, RingMode::MPMC);
        assert_eq!(ring.enqueue_bulk(&[]), 0);
        assert_eq!(ring.enqueue_burst(&[]), 0);
        assert_eq!(ring.dequeue_bulk(&mut []), 0);
        assert_eq!(ring.dequeue_burst(&mut []), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_oversized_bulk_fails_cleanly() {
        let ring = ring(4, RingMode::HTS);
        let big = vec![1u64; 5];
        assert_eq!(ring.enqueue_bulk(&big), 0);
        assert_eq!(ring.enqueue_burst(&big), 4);
    }

    #[test]
    fn test_wraparound_three_laps() {
        for mode in MODES {
            let ring = ring(8, mode);
            let mut next_in = 0u64;
            let mut next_out = 0u64;
            for _ in 0..(8 * 3) {
                // Keep the ring partially full so head and tail wrap at different times
                while ring.enqueue(next_in).is_ok() {
                    next_in += 1;
                }
                assert_eq!(ring.count(), 8);
                for _ in 0..3 {
                    assert_eq!(ring.dequeue(), Ok(next_out));
                    next_out += 1;
                }
                assert_eq!(ring.count(), 5);
            }
            while let Ok(v) = ring.dequeue() {
                assert_eq!(v, next_out);
                next_out += 1;
            }
            assert_eq!(next_in, next_out);
        }
    }

    #[test]
    fn test_counter_wrap_across_u32_max() {
        for mode in MODES {
            let ring =
                Ring::<u32>::with_start(RingConfig::new(4, mode), u32::MAX - 5).unwrap();
            for lap in 0..5u32 {
                assert_eq!(ring.enqueue_bulk(&[lap, lap + 1, lap + 2]), 3);
                assert_eq!(ring.count(), 3);
                assert_eq!(ring.free_count(), 1);
                let mut out = [0u32; 3];
                assert_eq!(ring.dequeue_burst(&mut out), 3);
                assert_eq!(out, [lap, lap + 1, lap + 2]);
                assert!(ring.is_empty());
            }
        }
    }

    #[test]
    fn test_peek_reject_then_accept() {
        for mode in [RingMode::SPSC, RingMode::HTS] {
            let ring = ring(8, mode);
            ring.enqueue_bulk(&[10, 20, 30]);

            let peek = ring.dequeue_start(1).unwrap();
            assert_eq!(peek.get(0), Some(10));
            peek.finish(false);
            assert_eq!(ring.count(), 3);

            let peek = ring.dequeue_start(1).unwrap();
            assert_eq!(peek.get(0), Some(10));
            assert_eq!(peek.finish(true), 1);
            assert_eq!(ring.count(), 2);

            assert_eq!(ring.dequeue(), Ok(20));
        }
    }

    #[test]
    fn test_peek_partial_accept() {
        let ring = ring(8, RingMode::HTS);
        ring.enqueue_bulk(&[1, 2, 3, 4]);

        let peek = ring.dequeue_burst_start(10).unwrap();
        assert_eq!(peek.len(), 4);
        assert_eq!(peek.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        peek.accept_n(2).unwrap();

        let mut out = [0u64; 4];
        assert_eq!(ring.dequeue_burst(&mut out), 2);
        assert_eq!(&out[..2], &[3, 4]);
    }

    #[test]
    fn test_peek_drop_rejects() {
        let ring = ring(4, RingMode::SPSC);
        ring.enqueue(7).unwrap();
        {
            let _peek = ring.dequeue_start(1).unwrap();
        }
        assert_eq!(ring.dequeue(), Ok(7));
    }

    #[test]
    fn test_dequeue_while_peek_pending() {
        for mode in [RingMode::SPSC, RingMode::HTS] {
            let ring = ring(4, mode);
            ring.enqueue_bulk(&[1, 2]);

            let peek = ring.dequeue_start(1).unwrap();
            assert_eq!(peek.get(0), Some(1));
            assert_eq!(ring.dequeue(), Err(RingError::Empty));
            let mut out = [0u64; 2];
            assert_eq!(ring.dequeue_burst(&mut out), 0);
            assert_eq!(ring.dequeue_start(1).unwrap_err(), RingError::Empty);

            // Producer side is unaffected and cannot overwrite the peeked slot
            assert_eq!(ring.enqueue_burst(&[3, 4, 5]), 2);
            assert_eq!(peek.get(0), Some(1));
            peek.reject();

            let drained: Vec<u64> = std::iter::from_fn(|| ring.dequeue().ok()).collect();
            assert_eq!(drained, vec![1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_enqueue_while_reservation_pending() {
        for mode in [RingMode::SPSC, RingMode::HTS] {
            let ring = ring(4, mode);
            let mut res = ring.enqueue_start(2).unwrap();
            res.push(1).unwrap();
            assert_eq!(ring.enqueue(9), Err(RingError::Full));
            assert_eq!(ring.enqueue_burst(&[9, 9]), 0);
            assert_eq!(ring.enqueue_start(1).unwrap_err(), RingError::Full);
            assert_eq!(res.commit(), 1);

            ring.enqueue(2).unwrap();
            let drained: Vec<u64> = std::iter::from_fn(|| ring.dequeue().ok()).collect();
            assert_eq!(drained, vec![1, 2]);
        }
    }

    #[test]
    fn test_pending_peek_blocks_only_its_side() {
        let ring = ring(4, RingMode::HTS);
        ring.enqueue(1).unwrap();
        let peek = ring.dequeue_start(1).unwrap();
        let mut res = ring.enqueue_start(2).unwrap();
        assert_eq!(res.extend_from_slice(&[2, 3]), 2);
        assert_eq!(res.commit(), 2);
        assert_eq!(peek.accept(), 1);

        // Both guards are finished, so every side claims normally again
        assert_eq!(ring.dequeue(), Ok(2));
        ring.enqueue(4).unwrap();
        assert_eq!(ring.count(), 2);
    }

    #[test]
    fn test_peek_needs_enough_elements() {
        let ring = ring(4, RingMode::HTS);
        assert_eq!(ring.dequeue_start(1).unwrap_err(), RingError::Empty);
        ring.enqueue(1).unwrap();
        assert_eq!(ring.dequeue_start(2).unwrap_err(), RingError::Empty);
        assert_eq!(ring.dequeue_start(0).unwrap_err(), RingError::Empty);
        assert_eq!(ring.dequeue_burst_start(2).unwrap().len(), 1);
    }

    #[test]
    fn test_two_phase_rejected_on_multi_sides() {
        let ring = ring(4, RingMode::MPMC);
        ring.enqueue(1).unwrap();
        assert_eq!(
            ring.dequeue_start(1).unwrap_err(),
            RingError::PeekUnsupported {
                side: Role::Consumer
            }
        );
        assert_eq!(
            ring.enqueue_start(1).unwrap_err(),
            RingError::PeekUnsupported {
                side: Role::Producer
            }
        );

        // Mixed mode: single producer may reserve, multi consumer may not peek
        let mixed = Ring::<u64>::new(RingConfig::new(
            4,
            RingMode::new(SyncType::Single, SyncType::Multi),
        ))
        .unwrap();
        assert!(mixed.enqueue_start(1).is_ok());
        assert!(mixed.dequeue_start(1).is_err());
    }

    #[test]
    fn test_reservation_commits_pushed_only() {
        for mode in [RingMode::SPSC, RingMode::HTS] {
            let ring = ring(4, mode);
            let mut res = ring.enqueue_start(3).unwrap();
            assert_eq!(res.len(), 3);
            res.push(1).unwrap();
            res.push(2).unwrap();
            assert_eq!(res.commit(), 2);
            assert_eq!(ring.count(), 2);

            // Dropped reservation publishes nothing
            {
                let mut res = ring.enqueue_burst_start(8).unwrap();
                assert_eq!(res.len(), 2);
                res.push(99).unwrap();
            }
            assert_eq!(ring.count(), 2);

            let mut out = [0u64; 4];
            assert_eq!(ring.dequeue_burst(&mut out), 2);
            assert_eq!(&out[..2], &[1, 2]);
        }
    }

    #[test]
    fn test_exact_size_capacity() {
        let ring =
            Ring::<u64>::new(RingConfig::new(5, RingMode::MPMC).with_exact_size(true)).unwrap();
        assert_eq!(ring.capacity(), 5);
        assert_eq!(ring.size(), 8);
        assert_eq!(ring.enqueue_burst(&[0; 8]), 5);
        assert!(ring.is_full());
        assert_eq!(ring.enqueue(1), Err(RingError::Full));
    }

    #[test]
    fn test_invalid_capacity() {
        let err = Ring::<u64>::new(RingConfig::new(6, RingMode::SPSC)).unwrap_err();
        assert!(matches!(err, RingError::InvalidCapacity { requested: 6, .. }));
        assert!(Ring::<u64>::new(RingConfig::new(0, RingMode::SPSC)).is_err());
    }

    #[test]
    fn test_metrics_counts() {
        let ring =
            Ring::<u64>::new(RingConfig::new(2, RingMode::MPMC).with_metrics(true)).unwrap();
        ring.enqueue_bulk(&[1, 2]);
        assert_eq!(ring.enqueue(3), Err(RingError::Full));
        let mut out = [0u64; 2];
        ring.dequeue_burst(&mut out);
        assert_eq!(ring.dequeue(), Err(RingError::Empty));

        let m = ring.metrics();
        assert_eq!(m.enqueued, 2);
        assert_eq!(m.dequeued, 2);
        assert_eq!(m.enqueue_calls, 1);
        assert_eq!(m.dequeue_calls, 1);
        assert_eq!(m.full, 1);
        assert_eq!(m.empty, 1);

        // Disabled metrics stay zero
        let quiet = ring_with_default_metrics();
        quiet.enqueue(1).unwrap();
        assert_eq!(quiet.metrics(), MetricsSnapshot::default());
    }

    fn ring_with_default_metrics() -> Ring<u64> {
        ring(4, RingMode::SPSC)
    }

    #[test]
    fn test_debug_output() {
        let ring = ring(4, RingMode::HTS);
        ring.enqueue(1).unwrap();
        let s = format!("{ring:?}");
        assert!(s.contains("capacity: 4"));
        assert!(s.contains("prod_tail: 1"));
    }
}
