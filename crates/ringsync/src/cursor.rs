use crate::invariants::{
    debug_assert_bounded_count, debug_assert_claim_within, debug_assert_finish_within,
    debug_assert_hts_tail,
};
use crate::metrics::Metrics;
use crate::{Role, SyncType};
use crossbeam_utils::Backoff;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

// =============================================================================
// RESERVATION PROTOCOL
// =============================================================================
//
// Each side (producer, consumer) owns a cursor with a `head` and a `tail`:
//
//   head: next sequence this side will claim
//   tail: sequence up to which this side's claims are finished and visible
//         to the other side
//
// Every operation is the same three steps, whatever the sync type:
//
//   1. move_head: compute what is available from our head and the OTHER
//      side's tail, then claim a range [old_head, old_head + n)
//   2. copy elements into / out of the claimed slots
//   3. finish:    advance our tail to old_head + n (Release), handing the
//      slots to the other side
//
// Availability:
//   producer: free    = capacity + consumer.tail - producer.head
//   consumer: entries =            producer.tail - consumer.head
// so both sides use `base + other.tail - head` with base = capacity or 0.
//
// Sync types differ only in how steps 1 and 3 deal with other threads on
// the SAME side:
//
//   Single: one thread per side. head is a plain store, tail a Release store.
//           head != tail only while a two-phase claim is pending, and then
//           every further claim on the side fails.
//
//   Multi:  head is claimed with a CAS loop. Several claims can be in flight,
//           so finish waits until tail reaches its own old_head (all earlier
//           claims finished) before publishing. The wait load is Acquire so
//           that earlier finishers' slot accesses happen-before our Release.
//
//   Hts:    head and tail share one u64. A claim first waits for
//           head == tail (nothing in flight), then CASes the whole word, so
//           at most one claim per side exists and finish is a plain store of
//           head == tail == old_head + n. Because nothing else can move the
//           word meanwhile, finish may publish fewer than n and roll the
//           rest back, which is what makes peek/commit possible.
//
// Ordering of the availability loads: our head is loaded (or returned by a
// failed CAS) with Acquire BEFORE the other side's tail is loaded, so the
// tail is never older than the head it is compared against. A stale head can
// still over-estimate availability, but then the CAS fails and we retry; the
// estimate is only trusted after a successful claim.
//
// All arithmetic is wrapping u32. Capacity is at most 2^31, so distances
// between live cursors are always unambiguous.
// =============================================================================

/// All-or-nothing vs best-effort claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Claim exactly `n` or nothing (bulk).
    Fixed,
    /// Claim as many as available, up to `n` (burst).
    Variable,
}

/// A claimed sequence range `[old_head, old_head + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Claim {
    pub old_head: u32,
    pub len: u32,
}

impl Claim {
    #[inline]
    pub(crate) fn new_head(&self) -> u32 {
        self.old_head.wrapping_add(self.len)
    }
}

/// Head and tail of a classic (Single or Multi) side.
#[derive(Debug)]
pub(crate) struct HeadTail {
    head: AtomicU32,
    tail: AtomicU32,
}

impl HeadTail {
    fn new(start: u32) -> Self {
        Self {
            head: AtomicU32::new(start),
            tail: AtomicU32::new(start),
        }
    }
}

/// Unpacked HTS word. `head` lives in the low half, `tail` in the high half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HtsPos {
    pub head: u32,
    pub tail: u32,
}

impl HtsPos {
    #[inline]
    pub(crate) const fn pack(self) -> u64 {
        ((self.tail as u64) << 32) | self.head as u64
    }

    #[inline]
    pub(crate) const fn unpack(raw: u64) -> Self {
        Self {
            head: raw as u32,
            tail: (raw >> 32) as u32,
        }
    }
}

/// One side's cursor state.
#[derive(Debug)]
pub(crate) enum Cursor {
    Single(HeadTail),
    Multi(HeadTail),
    Hts(AtomicU64),
}

impl Cursor {
    pub(crate) fn new(sync: SyncType, start: u32) -> Self {
        match sync {
            SyncType::Single => Self::Single(HeadTail::new(start)),
            SyncType::Multi => Self::Multi(HeadTail::new(start)),
            SyncType::Hts => Self::Hts(AtomicU64::new(
                HtsPos {
                    head: start,
                    tail: start,
                }
                .pack(),
            )),
        }
    }

    pub(crate) fn sync(&self) -> SyncType {
        match self {
            Self::Single(_) => SyncType::Single,
            Self::Multi(_) => SyncType::Multi,
            Self::Hts(_) => SyncType::Hts,
        }
    }

    /// The published tail, loaded with Acquire.
    #[inline]
    pub(crate) fn tail(&self) -> u32 {
        match self {
            Self::Single(ht) | Self::Multi(ht) => ht.tail.load(Ordering::Acquire),
            Self::Hts(pos) => HtsPos::unpack(pos.load(Ordering::Acquire)).tail,
        }
    }

    /// The current head (diagnostics only).
    #[inline]
    pub(crate) fn head(&self) -> u32 {
        match self {
            Self::Single(ht) | Self::Multi(ht) => ht.head.load(Ordering::Relaxed),
            Self::Hts(pos) => HtsPos::unpack(pos.load(Ordering::Relaxed)).head,
        }
    }

    /// Claim up to `n` slots for `role`. Returns `None` when nothing could be
    /// claimed. `other` is the opposite side's cursor.
    pub(crate) fn move_head(
        &self,
        other: &Cursor,
        role: Role,
        capacity: u32,
        n: u32,
        behavior: Behavior,
        metrics: Option<&Metrics>,
    ) -> Option<Claim> {
        let base = match role {
            Role::Producer => capacity,
            Role::Consumer => 0,
        };

        match self {
            Self::Single(ht) => {
                // Only this thread writes head and tail.
                let old_head = ht.head.load(Ordering::Relaxed);
                if old_head != ht.tail.load(Ordering::Relaxed) {
                    // A Peek or Reservation on this side is still pending.
                    return None;
                }
                let avail = base.wrapping_add(other.tail()).wrapping_sub(old_head);
                debug_assert_bounded_count!(avail, capacity);
                let n = clamp(n, avail, behavior);
                if n == 0 {
                    return None;
                }
                ht.head.store(old_head.wrapping_add(n), Ordering::Relaxed);
                Some(Claim { old_head, len: n })
            }
            Self::Multi(ht) => {
                let backoff = Backoff::new();
                let mut retries = 0u64;
                let mut old_head = ht.head.load(Ordering::Acquire);
                let claim = loop {
                    let avail = base.wrapping_add(other.tail()).wrapping_sub(old_head);
                    let n = clamp(n, avail, behavior);
                    if n == 0 {
                        break None;
                    }
                    match ht.head.compare_exchange_weak(
                        old_head,
                        old_head.wrapping_add(n),
                        Ordering::Acquire,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            debug_assert_bounded_count!(avail, capacity);
                            debug_assert_claim_within!(n, avail);
                            break Some(Claim { old_head, len: n });
                        }
                        Err(current) => {
                            old_head = current;
                            retries += 1;
                            backoff.spin();
                        }
                    }
                };
                record_retries(metrics, retries);
                claim
            }
            Self::Hts(pos) => {
                let backoff = Backoff::new();
                let mut retries = 0u64;
                let mut op = HtsPos::unpack(pos.load(Ordering::Acquire));
                let claim = loop {
                    // Another claim on this side is still in flight.
                    while op.head != op.tail {
                        retries += 1;
                        backoff.snooze();
                        op = HtsPos::unpack(pos.load(Ordering::Acquire));
                    }

                    let avail = base.wrapping_add(other.tail()).wrapping_sub(op.head);
                    let n = clamp(n, avail, behavior);
                    if n == 0 {
                        break None;
                    }
                    let next = HtsPos {
                        head: op.head.wrapping_add(n),
                        tail: op.tail,
                    };
                    match pos.compare_exchange_weak(
                        op.pack(),
                        next.pack(),
                        Ordering::Acquire,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            debug_assert_bounded_count!(avail, capacity);
                            debug_assert_claim_within!(n, avail);
                            break Some(Claim {
                                old_head: op.head,
                                len: n,
                            });
                        }
                        Err(raw) => {
                            op = HtsPos::unpack(raw);
                            retries += 1;
                            backoff.spin();
                        }
                    }
                };
                record_retries(metrics, retries);
                claim
            }
        }
    }

    /// Publish the first `n` slots of `claim` to the other side.
    ///
    /// `n < claim.len` rolls the rest of the claim back; only Single and Hts
    /// sides can do that.
    pub(crate) fn finish(&self, claim: Claim, n: u32, metrics: Option<&Metrics>) {
        debug_assert_finish_within!(n, claim.len);
        let new_pos = claim.old_head.wrapping_add(n);

        match self {
            Self::Single(ht) => {
                if n != claim.len {
                    ht.head.store(new_pos, Ordering::Relaxed);
                }
                ht.tail.store(new_pos, Ordering::Release);
            }
            Self::Multi(ht) => {
                debug_assert_eq!(n, claim.len, "partial finish on a multi-thread side");
                // Wait for earlier claims on this side to publish first.
                let backoff = Backoff::new();
                let mut retries = 0u64;
                while ht.tail.load(Ordering::Acquire) != claim.old_head {
                    retries += 1;
                    backoff.snooze();
                }
                record_retries(metrics, retries);
                ht.tail.store(claim.new_head(), Ordering::Release);
            }
            Self::Hts(pos) => {
                debug_assert_hts_tail!(
                    HtsPos::unpack(pos.load(Ordering::Relaxed)).tail,
                    claim.old_head
                );
                pos.store(
                    HtsPos {
                        head: new_pos,
                        tail: new_pos,
                    }
                    .pack(),
                    Ordering::Release,
                );
            }
        }
    }
}

/// Bound a request by availability according to `behavior`.
#[inline]
fn clamp(n: u32, avail: u32, behavior: Behavior) -> u32 {
    if n <= avail {
        n
    } else {
        match behavior {
            Behavior::Fixed => 0,
            Behavior::Variable => avail,
        }
    }
}

#[inline]
fn record_retries(metrics: Option<&Metrics>, retries: u64) {
    if let Some(m) = metrics {
        m.add_cas_retries(retries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: u32 = 4;

    fn pair(producer: SyncType, consumer: SyncType, start: u32) -> (Cursor, Cursor) {
        (Cursor::new(producer, start), Cursor::new(consumer, start))
    }

    fn produce(prod: &Cursor, cons: &Cursor, n: u32, behavior: Behavior) -> Option<Claim> {
        prod.move_head(cons, Role::Producer, CAP, n, behavior, None)
    }

    fn consume(cons: &Cursor, prod: &Cursor, n: u32, behavior: Behavior) -> Option<Claim> {
        cons.move_head(prod, Role::Consumer, CAP, n, behavior, None)
    }

    #[test]
    fn test_hts_pos_packing() {
        let pos = HtsPos {
            head: 0xDEAD_BEEF,
            tail: 0x0102_0304,
        };
        assert_eq!(pos.pack(), 0x0102_0304_DEAD_BEEF);
        assert_eq!(HtsPos::unpack(pos.pack()), pos);

        let wrapped = HtsPos {
            head: u32::MAX,
            tail: u32::MAX,
        };
        assert_eq!(HtsPos::unpack(wrapped.pack()), wrapped);
    }

    #[test]
    fn test_clamp_behaviors() {
        assert_eq!(clamp(3, 5, Behavior::Fixed), 3);
        assert_eq!(clamp(6, 5, Behavior::Fixed), 0);
        assert_eq!(clamp(6, 5, Behavior::Variable), 5);
        assert_eq!(clamp(0, 5, Behavior::Variable), 0);
    }

    #[test]
    fn test_producer_claims_until_full() {
        for sync in [SyncType::Single, SyncType::Multi, SyncType::Hts] {
            let (prod, cons) = pair(sync, sync, 0);

            let claim = produce(&prod, &cons, 3, Behavior::Fixed).unwrap();
            assert_eq!(
                claim,
                Claim {
                    old_head: 0,
                    len: 3
                }
            );
            prod.finish(claim, 3, None);
            assert_eq!(prod.tail(), 3);

            // Only one slot left
            assert!(produce(&prod, &cons, 2, Behavior::Fixed).is_none());
            let claim = produce(&prod, &cons, 2, Behavior::Variable).unwrap();
            assert_eq!(claim.len, 1);
            prod.finish(claim, 1, None);

            assert!(produce(&prod, &cons, 1, Behavior::Variable).is_none());

            // Consumer sees everything the producer published
            let claim = consume(&cons, &prod, 8, Behavior::Variable).unwrap();
            assert_eq!(
                claim,
                Claim {
                    old_head: 0,
                    len: 4
                }
            );
            cons.finish(claim, 4, None);
            assert!(consume(&cons, &prod, 1, Behavior::Variable).is_none());
        }
    }

    #[test]
    fn test_consumer_does_not_see_unpublished_claim() {
        for sync in [SyncType::Single, SyncType::Multi, SyncType::Hts] {
            let (prod, cons) = pair(sync, sync, 0);
            let claim = produce(&prod, &cons, 2, Behavior::Fixed).unwrap();
            assert_eq!(prod.head(), 2);
            assert!(consume(&cons, &prod, 1, Behavior::Variable).is_none());
            prod.finish(claim, 2, None);
            assert!(consume(&cons, &prod, 1, Behavior::Variable).is_some());
        }
    }

    #[test]
    fn test_partial_finish_rolls_back() {
        for sync in [SyncType::Single, SyncType::Hts] {
            let (prod, cons) = pair(SyncType::Single, sync, 0);
            let claim = produce(&prod, &cons, 4, Behavior::Fixed).unwrap();
            prod.finish(claim, 4, None);

            let claim = consume(&cons, &prod, 3, Behavior::Fixed).unwrap();
            cons.finish(claim, 1, None);
            assert_eq!(cons.head(), 1);
            assert_eq!(cons.tail(), 1);

            // The two rolled-back slots are claimable again
            let claim = consume(&cons, &prod, 8, Behavior::Variable).unwrap();
            assert_eq!(
                claim,
                Claim {
                    old_head: 1,
                    len: 3
                }
            );
            cons.finish(claim, 0, None);
            assert_eq!(cons.head(), 1);
        }
    }

    #[test]
    fn test_single_side_refuses_claim_while_pending() {
        let (prod, cons) = pair(SyncType::Single, SyncType::Single, 0);
        let claim = produce(&prod, &cons, 2, Behavior::Fixed).unwrap();
        prod.finish(claim, 2, None);

        let pending = consume(&cons, &prod, 1, Behavior::Fixed).unwrap();
        assert!(consume(&cons, &prod, 1, Behavior::Variable).is_none());
        assert_eq!(cons.tail(), 0);

        let held = produce(&prod, &cons, 1, Behavior::Fixed).unwrap();
        assert!(produce(&prod, &cons, 1, Behavior::Variable).is_none());
        prod.finish(held, 0, None);

        cons.finish(pending, 0, None);
        let claim = consume(&cons, &prod, 8, Behavior::Variable).unwrap();
        assert_eq!(
            claim,
            Claim {
                old_head: 0,
                len: 2
            }
        );
    }

    #[test]
    fn test_cursors_wrap_u32() {
        for sync in [SyncType::Single, SyncType::Multi, SyncType::Hts] {
            let start = u32::MAX - 1;
            let (prod, cons) = pair(sync, sync, start);
            for _ in 0..3 {
                let claim = produce(&prod, &cons, 4, Behavior::Fixed).unwrap();
                prod.finish(claim, 4, None);
                assert!(produce(&prod, &cons, 1, Behavior::Fixed).is_none());

                let claim = consume(&cons, &prod, 4, Behavior::Fixed).unwrap();
                cons.finish(claim, 4, None);
                assert!(consume(&cons, &prod, 1, Behavior::Fixed).is_none());
            }
            assert_eq!(prod.tail(), start.wrapping_add(12));
            assert_eq!(cons.tail(), start.wrapping_add(12));
        }
    }

    #[test]
    fn test_retries_recorded_for_hts_wait() {
        // A single thread cannot create contention, so retries stay at zero.
        let metrics = Metrics::new();
        let (prod, cons) = pair(SyncType::Hts, SyncType::Hts, 0);
        let claim = prod
            .move_head(&cons, Role::Producer, CAP, 1, Behavior::Fixed, Some(&metrics))
            .unwrap();
        prod.finish(claim, 1, Some(&metrics));
        assert_eq!(metrics.snapshot().cas_retries, 0);
        assert_eq!(prod.sync(), SyncType::Hts);
    }
}
