//! Monotonic bump allocator over a fixed region.
//!
//! Allocation just moves an offset forward; nothing is ever handed back
//! individually. The whole region is reclaimed at once with [`reset`], and
//! only the most recent allocation can be resized in place.
//!
//! ```text
//!              previous_offset     offset
//!                    |                |
//!  +-----------------v----------------v--------------------+
//!  |  earlier allocations  |  last   |      free space     |
//!  +-----------------------+---------+---------------------+
//!  base                                            base + capacity
//! ```
//!
//! [`reset`]: LinearAllocator::reset

use std::{alloc::Layout, mem, ptr::NonNull};

use crate::{
    align::{align_forward, align_forward_checked, is_valid_alignment},
    region::{BorrowedRegion, InlineRegion, OwnedRegion, Region},
};

/// Bump allocator handing out pieces of a fixed [`Region`].
///
/// `offset` is the next free byte; `previous_offset` is the aligned start of
/// the most recent allocation. Both only ever move forward between resets.
///
/// Not thread-safe; share it behind external synchronization or not at all.
pub struct LinearAllocator<R: Region> {
    region: R,
    offset: usize,
    previous_offset: usize,
}

impl LinearAllocator<OwnedRegion> {
    /// Allocator over a fresh OS mapping of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new_in(OwnedRegion::new(capacity))
    }
}

impl<const N: usize> LinearAllocator<InlineRegion<N>> {
    /// Allocator whose `N`-byte region lives inside the returned value.
    ///
    /// Moving the allocator moves the region, which invalidates any pointers
    /// already handed out.
    pub fn new_inline() -> Self {
        Self::new_in(InlineRegion::new())
    }
}

impl<'a> LinearAllocator<BorrowedRegion<'a>> {
    /// Allocator over a caller-provided buffer. The buffer is borrowed for
    /// the allocator's lifetime and never released by it.
    pub fn with_buffer(buf: &'a mut [u8]) -> Self {
        Self::new_in(BorrowedRegion::new(buf))
    }
}

impl<R: Region> LinearAllocator<R> {
    /// Allocator over an arbitrary region.
    pub fn new_in(region: R) -> Self {
        Self {
            region,
            offset: 0,
            previous_offset: 0,
        }
    }

    /// Total size of the backing region in bytes.
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Bytes consumed so far, alignment gaps included.
    pub fn used(&self) -> usize {
        self.offset
    }

    /// Bytes still available at the end of the region.
    pub fn available(&self) -> usize {
        self.region.capacity() - self.offset
    }

    /// Hands out `size` bytes whose address is a multiple of `alignment`.
    ///
    /// Returns `None` when `alignment` is not a power of two or the region
    /// cannot fit the request; the allocator is left untouched in that case.
    /// The returned memory is uninitialized and stays valid until the next
    /// [`reset`](Self::reset) or until the allocator is dropped (or moved,
    /// for inline regions).
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if !is_valid_alignment(alignment) {
            return None;
        }

        let aligned = align_forward_checked(self.offset, alignment)?;
        let new_offset = aligned.checked_add(size)?;
        if new_offset > self.region.capacity() {
            return None;
        }

        self.previous_offset = aligned;
        self.offset = new_offset;

        // SAFETY: aligned <= capacity, and the region contract guarantees
        // that many valid bytes after base.
        let ptr = unsafe { self.region.base().add(aligned) };
        NonNull::new(ptr)
    }

    /// Throws every allocation away at once by rewinding to the start.
    ///
    /// Memory is not zeroed; callers must treat anything they still point at
    /// as gone.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.previous_offset = 0;
    }

    /// Grows or shrinks the most recent allocation in place.
    ///
    /// `ptr` must be the pointer returned by the latest successful
    /// [`allocate`](Self::allocate); anything else fails with `None` and no
    /// state change, as does an invalid alignment or a size that no longer
    /// fits. On success the same pointer comes back. After a grow, bytes at
    /// or past the old size are uninitialized.
    pub fn resize_last(
        &mut self,
        ptr: *mut u8,
        new_size: usize,
        alignment: usize,
    ) -> Option<NonNull<u8>> {
        if !is_valid_alignment(alignment) {
            return None;
        }

        let previous_aligned = align_forward_checked(self.previous_offset, alignment)?;
        let expected = (self.region.base() as usize).checked_add(previous_aligned)?;
        if expected != ptr as usize {
            return None;
        }

        let new_offset = previous_aligned.checked_add(new_size)?;
        if new_offset > self.region.capacity() {
            return None;
        }

        self.offset = new_offset;
        NonNull::new(ptr)
    }

    /// Typed allocation of `count` values of `T`.
    ///
    /// Computes the layout with overflow checking, so absurd counts fail
    /// with `None` instead of wrapping.
    pub fn allocate_array<T>(&mut self, count: usize) -> Option<NonNull<T>> {
        let layout = Layout::array::<T>(count).ok()?;
        self.allocate(layout.size(), layout.align())
            .map(NonNull::cast)
    }

    /// Allocates room for one `T` and moves `value` into it.
    pub fn emplace<T>(&mut self, value: T) -> Option<NonNull<T>> {
        let ptr = self
            .allocate(mem::size_of::<T>(), mem::align_of::<T>())?
            .cast::<T>();

        unsafe { ptr.as_ptr().write(value) };
        Some(ptr)
    }

    /// Drops the value at `ptr` in place. When `ptr` is the most recent
    /// allocation its space is rewound as well; otherwise the bytes stay
    /// occupied until [`reset`](Self::reset).
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`emplace`](Self::emplace) on this allocator, the
    /// value must not have been dropped already, and no reset may have
    /// happened in between.
    pub unsafe fn destroy<T>(&mut self, ptr: *mut T) {
        if ptr.is_null() {
            return;
        }

        unsafe { ptr.drop_in_place() };

        let previous_aligned = align_forward(self.previous_offset, mem::align_of::<T>());
        if self.region.base() as usize + previous_aligned == ptr as usize {
            self.offset = self.previous_offset;
        }
    }
}
