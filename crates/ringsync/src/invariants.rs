//! Debug assertion macros for ring invariants.
//!
//! Only active in debug builds (`debug_assert!`), so release builds pay
//! nothing. All cursor arithmetic is modulo 2^32, so "ordering" checks are
//! phrased as wrapping distances rather than `<=` on raw values.

// =============================================================================
// Bounded occupancy
// =============================================================================

/// Assert that a side never sees more available slots than the ring holds.
///
/// **Invariant**: `0 ≤ producer.tail - consumer.head ≤ capacity`, so the free
/// (or filled) count computed from one cursor and the opposite tail can never
/// exceed capacity.
///
/// Used in: `Cursor::move_head()` after computing availability
macro_rules! debug_assert_bounded_count {
    ($avail:expr, $capacity:expr) => {
        debug_assert!(
            $avail <= $capacity,
            "bounded count violated: {} slots available with capacity {}",
            $avail,
            $capacity
        )
    };
}

// =============================================================================
// Reservation bounds
// =============================================================================

/// Assert that a reservation stays inside what was available when it was made.
///
/// Used in: `Cursor::move_head()` before publishing the new head
macro_rules! debug_assert_claim_within {
    ($n:expr, $avail:expr) => {
        debug_assert!(
            $n <= $avail,
            "reservation of {} slots exceeds {} available",
            $n,
            $avail
        )
    };
}

/// Assert that a two-phase finish does not publish more than was reserved.
///
/// Used in: `Cursor::finish()`
macro_rules! debug_assert_finish_within {
    ($n:expr, $len:expr) => {
        debug_assert!(
            $n <= $len,
            "finishing {} slots of a {}-slot reservation",
            $n,
            $len
        )
    };
}

// =============================================================================
// Head-tail-sync: one operation in flight
// =============================================================================

/// Assert that an HTS side being finished has exactly the expected operation
/// in flight.
///
/// **Invariant**: between reservation and publication on an HTS side,
/// `tail == claim.old_head` (nobody else moved it).
///
/// Used in: `Cursor::finish()` for HTS sides
macro_rules! debug_assert_hts_tail {
    ($tail:expr, $old_head:expr) => {
        debug_assert!(
            $tail == $old_head,
            "HTS tail {} moved while reservation from {} was in flight",
            $tail,
            $old_head
        )
    };
}

// =============================================================================
// Slot range
// =============================================================================

/// Assert that a slot copy stays inside the slot array.
///
/// Used in: `SlotArray::write()` / `SlotArray::read()`
macro_rules! debug_assert_slot_range {
    ($len:expr, $size:expr) => {
        debug_assert!(
            $len <= $size as usize,
            "copying {} slots through a {}-slot array",
            $len,
            $size
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_claim_within;
pub(crate) use debug_assert_finish_within;
pub(crate) use debug_assert_hts_tail;
pub(crate) use debug_assert_slot_range;
