use crate::invariants::debug_assert_slot_range;
use crate::RingError;
use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

/// Alignment of the slot array; keeps slot 0 off the cursors' cache lines.
const SLOT_ALIGN: usize = 128;

/// Fixed-size storage for `size` elements, `size` a power of two.
///
/// The array never tracks which slots are initialized; the cursors do. A slot
/// is written only by the side that claimed it and read only after the
/// writer's Release publication was observed with Acquire.
pub(crate) struct SlotArray<T> {
    ptr: NonNull<T>,
    size: u32,
    mask: u32,
    layout: Layout,
}

impl<T: Copy> SlotArray<T> {
    /// Allocates `size` uninitialized slots, preferring NUMA node `socket`.
    pub(crate) fn allocate(size: u32, socket: Option<u32>) -> Result<Self, RingError> {
        debug_assert!(size.is_power_of_two());

        let oom = || RingError::OutOfMemory {
            bytes: (size as usize).saturating_mul(std::mem::size_of::<T>()),
        };
        let layout = Layout::array::<T>(size as usize)
            .and_then(|l| l.align_to(SLOT_ALIGN.max(crate::numa::page_align())))
            .map(|l| l.pad_to_align())
            .map_err(|_| oom())?;

        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            // SAFETY: layout has non-zero size.
            let raw = unsafe { alloc::alloc(layout) };
            NonNull::new(raw.cast::<T>()).ok_or_else(oom)?
        };

        if let Some(socket) = socket {
            if layout.size() > 0 {
                crate::numa::bind(ptr.as_ptr().cast(), layout.size(), socket);
            }
        }

        Ok(Self {
            ptr,
            size,
            mask: size - 1,
            layout,
        })
    }

    /// Write `items` into the slots starting at sequence `pos`, wrapping at the end.
    ///
    /// # Safety
    ///
    /// The caller must own the claimed range `[pos, pos + items.len())`.
    #[inline]
    pub(crate) unsafe fn write(&self, pos: u32, items: &[T]) {
        debug_assert_slot_range!(items.len(), self.size);
        let idx = (pos & self.mask) as usize;
        let first = items.len().min(self.size as usize - idx);
        let base = self.ptr.as_ptr();
        ptr::copy_nonoverlapping(items.as_ptr(), base.add(idx), first);
        ptr::copy_nonoverlapping(items.as_ptr().add(first), base, items.len() - first);
    }

    /// Copy the slots starting at sequence `pos` into `out`, wrapping at the end.
    ///
    /// # Safety
    ///
    /// The caller must own the claimed range `[pos, pos + out.len())` and
    /// every slot in it must have been written and published.
    #[inline]
    pub(crate) unsafe fn read(&self, pos: u32, out: &mut [T]) {
        debug_assert_slot_range!(out.len(), self.size);
        let idx = (pos & self.mask) as usize;
        let first = out.len().min(self.size as usize - idx);
        let base = self.ptr.as_ptr();
        ptr::copy_nonoverlapping(base.add(idx), out.as_mut_ptr(), first);
        ptr::copy_nonoverlapping(base, out.as_mut_ptr().add(first), out.len() - first);
    }

    /// Write one element at sequence `pos`.
    ///
    /// # Safety
    ///
    /// Same contract as [`write`](Self::write).
    #[inline]
    pub(crate) unsafe fn write_one(&self, pos: u32, item: T) {
        ptr::write(self.ptr.as_ptr().add((pos & self.mask) as usize), item);
    }

    /// Read one element at sequence `pos`.
    ///
    /// # Safety
    ///
    /// Same contract as [`read`](Self::read).
    #[inline]
    pub(crate) unsafe fn read_one(&self, pos: u32) -> T {
        ptr::read(self.ptr.as_ptr().add((pos & self.mask) as usize))
    }
}

impl<T> SlotArray<T> {
    #[inline]
    pub(crate) fn size(&self) -> u32 {
        self.size
    }
}

impl<T> Drop for SlotArray<T> {
    fn drop(&mut self) {
        // Elements are `Copy`, nothing to drop in place.
        if self.layout.size() > 0 {
            // SAFETY: allocated in `allocate` with this exact layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), self.layout) };
        }
    }
}
