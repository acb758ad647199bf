use crate::cursor::Claim;
use crate::{CommitError, Ring, Role};
use std::fmt;

/// Producer-side two-phase enqueue.
///
/// Obtained from [`Ring::enqueue_start`] or [`Ring::enqueue_burst_start`].
/// Slots are filled in order with [`push`](Self::push) or
/// [`extend_from_slice`](Self::extend_from_slice) and become visible to
/// consumers only on [`commit`](Self::commit), which publishes exactly the
/// filled prefix. Unfilled slots are handed back.
///
/// Dropping an uncommitted reservation aborts it; nothing is published.
///
/// While a reservation is alive other enqueues cannot make progress: on the
/// holding thread they fail with `Full`, and other threads on an HTS side
/// wait. Keep it short.
///
/// # Example
///
/// ```
/// use ringsync_rs::{Ring, RingConfig, RingMode};
///
/// let ring = Ring::<u32>::new(RingConfig::new(8, RingMode::HTS)).unwrap();
/// let mut res = ring.enqueue_start(4).unwrap();
/// res.push(1).unwrap();
/// res.push(2).unwrap();
/// assert_eq!(res.commit(), 2); // only the filled prefix is published
/// assert_eq!(ring.count(), 2);
/// ```
#[must_use = "a reservation publishes nothing unless committed"]
pub struct Reservation<'a, T: Copy> {
    ring: &'a Ring<T>,
    claim: Option<Claim>,
    len: u32,
    filled: u32,
}

impl<'a, T: Copy> Reservation<'a, T> {
    pub(crate) fn new(ring: &'a Ring<T>, claim: Claim) -> Self {
        Self {
            ring,
            claim: Some(claim),
            len: claim.len,
            filled: 0,
        }
    }

    /// Number of reserved slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots written so far.
    #[inline]
    pub fn filled(&self) -> usize {
        self.filled as usize
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        (self.len - self.filled) as usize
    }

    /// Write the next slot. Hands the item back if every slot is filled.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        let Some(claim) = self.claim else {
            return Err(item);
        };
        if self.filled == self.len {
            return Err(item);
        }
        // SAFETY: the slot lies inside our producer claim.
        unsafe {
            self.ring
                .write_slot(claim.old_head.wrapping_add(self.filled), item)
        };
        self.filled += 1;
        Ok(())
    }

    /// Write as many leading elements of `items` as still fit. Returns the count.
    pub fn extend_from_slice(&mut self, items: &[T]) -> usize {
        let n = items.len().min(self.remaining());
        for &item in &items[..n] {
            // Cannot fail: n <= remaining
            let _ = self.push(item);
        }
        n
    }

    /// Publish the filled slots. Returns how many were published.
    pub fn commit(mut self) -> usize {
        let filled = self.filled;
        self.release(filled);
        filled as usize
    }

    /// Publish nothing and hand every reserved slot back.
    pub fn abort(mut self) {
        self.release(0);
    }

    fn release(&mut self, n: u32) {
        if let Some(claim) = self.claim.take() {
            self.ring.finish_guard(Role::Producer, claim, n);
        }
    }
}

impl<T: Copy> fmt::Debug for Reservation<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("len", &self.len)
            .field("filled", &self.filled)
            .field("finished", &self.claim.is_none())
            .finish()
    }
}

impl<T: Copy> Drop for Reservation<'_, T> {
    fn drop(&mut self) {
        self.release(0);
    }
}

/// Consumer-side two-phase dequeue.
///
/// Obtained from [`Ring::dequeue_start`] or [`Ring::dequeue_burst_start`].
/// The peeked elements stay in the ring (and in [`Ring::count`]) until the
/// peek is finished: [`accept`](Self::accept) removes them,
/// [`reject`](Self::reject) leaves them for the next dequeue in the same
/// order. Dropping an unfinished peek rejects it.
///
/// While a peek is alive other dequeues cannot make progress: on the holding
/// thread they fail with `Empty`, and other threads on an HTS side wait.
///
/// # Example
///
/// ```
/// use ringsync_rs::{Ring, RingConfig, RingMode};
///
/// let ring = Ring::<u32>::new(RingConfig::new(8, RingMode::SPSC)).unwrap();
/// ring.enqueue(7).unwrap();
///
/// let peek = ring.dequeue_start(1).unwrap();
/// assert_eq!(peek.get(0), Some(7));
/// peek.reject();
/// assert_eq!(ring.dequeue(), Ok(7));
/// ```
#[must_use = "a peek removes nothing unless accepted"]
pub struct Peek<'a, T: Copy> {
    ring: &'a Ring<T>,
    claim: Option<Claim>,
    len: u32,
    start: u32,
}

impl<'a, T: Copy> Peek<'a, T> {
    pub(crate) fn new(ring: &'a Ring<T>, claim: Claim) -> Self {
        Self {
            ring,
            claim: Some(claim),
            len: claim.len,
            start: claim.old_head,
        }
    }

    /// Number of peeked elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The `i`-th peeked element, oldest first.
    #[inline]
    pub fn get(&self, i: usize) -> Option<T> {
        let i = u32::try_from(i).ok().filter(|&i| i < self.len)?;
        // SAFETY: the slot lies inside our consumer claim.
        Some(unsafe { self.ring.read_slot(self.start.wrapping_add(i)) })
    }

    /// Iterate the peeked elements, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |i| {
            // SAFETY: i < len, inside our consumer claim.
            unsafe { self.ring.read_slot(self.start.wrapping_add(i)) }
        })
    }

    /// Copy the leading peeked elements into `out`. Returns the count copied.
    pub fn copy_to_slice(&self, out: &mut [T]) -> usize {
        let n = out.len().min(self.len());
        // SAFETY: [start, start + n) lies inside our consumer claim.
        unsafe { self.ring.read_slots(self.start, &mut out[..n]) };
        n
    }

    /// Remove every peeked element. Returns how many.
    pub fn accept(mut self) -> usize {
        let len = self.len;
        self.release(len);
        len as usize
    }

    /// Remove the first `n` peeked elements and return the rest to the ring.
    pub fn accept_n(mut self, n: usize) -> Result<(), CommitError> {
        match u32::try_from(n).ok().filter(|&n| n <= self.len) {
            Some(n) => {
                self.release(n);
                Ok(())
            }
            None => Err(CommitError {
                attempted: u32::try_from(n).unwrap_or(u32::MAX),
                available: self.len,
            }),
        }
    }

    /// Like [`accept_n`](Self::accept_n) but saturates at `len()`. Returns
    /// the number removed.
    pub fn accept_up_to(self, n: usize) -> usize {
        let n = n.min(self.len());
        // Cannot fail: n <= len
        let _ = self.accept_n(n);
        n
    }

    /// Leave every peeked element in the ring.
    pub fn reject(mut self) {
        self.release(0);
    }

    /// Accept (`true`) or reject (`false`) everything. Returns how many were
    /// removed.
    pub fn finish(self, accept: bool) -> usize {
        if accept {
            self.accept()
        } else {
            self.reject();
            0
        }
    }

    fn release(&mut self, n: u32) {
        if let Some(claim) = self.claim.take() {
            self.ring.finish_guard(Role::Consumer, claim, n);
        }
    }
}

impl<T: Copy> fmt::Debug for Peek<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peek")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("finished", &self.claim.is_none())
            .finish()
    }
}

impl<T: Copy> Drop for Peek<'_, T> {
    fn drop(&mut self) {
        self.release(0);
    }
}
