//! Free-list allocator: out-of-order allocate and release over a fixed
//! region.
//!
//! Free blocks carry their bookkeeping in-band: each one starts with a
//! [`FreeNode`] giving its usable size and the offset of the next free block.
//! The list is kept sorted by address so releasing a block can merge it with
//! both neighbours and fragmentation never accumulates across a
//! free/allocate cycle of adjacent blocks.
//!
//! ```text
//!  head
//!   |
//!   v
//! +------+-----------+   +-------+--------------+   +------+----------+
//! | node | free ...  |   | used  |  used ...    |   | node | free ... |
//! | size,next -------+---+-------+--------------+-->| size, NIL       |
//! +------+-----------+   +-------+--------------+   +------+----------+
//! base                                                    base + capacity
//! ```
//!
//! Allocating splits the chosen block when the tail end is big enough to
//! host another node, and absorbs it otherwise. An [`AllocHeader`] written
//! just before the returned pointer records the block's full span and the
//! alignment padding, which is everything `deallocate` needs to rebuild the
//! block from the bare pointer.

use std::{alloc::Layout, mem, ptr::NonNull};

use crate::{
    align::{align_forward_checked, is_valid_alignment},
    block::{AllocHeader, FreeNode, HEADER_SIZE, NIL, NODE_ALIGN, NODE_SIZE},
    region::{BorrowedRegion, InlineRegion, OwnedRegion, Region},
};

/// Placement policy, fixed when the allocator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitPolicy {
    /// Take the first block that fits, in address order. Cheapest walk.
    #[default]
    FirstFit,
    /// Walk the whole list and take the block with the least slack; an exact
    /// fit wins immediately. Ties keep the lowest address.
    BestFit,
}

/// Chosen placement for a request: the node to carve and how to carve it.
struct Fit {
    /// Offset of the node preceding `current` in the list, `NIL` at head.
    previous: usize,
    /// Offset of the node to allocate from.
    current: usize,
    /// Absolute address the caller will receive.
    aligned: usize,
    /// Gap between the byte after the node record and `aligned`.
    padding: usize,
    /// Usable bytes consumed inside the node: request size plus padding.
    required: usize,
}

/// General-purpose allocator over a fixed [`Region`].
///
/// Supports arbitrary allocate/deallocate orderings; adjacent free blocks
/// are always coalesced on release. `used()`/`free()` are O(1), allocate and
/// deallocate are O(n) in the number of free blocks.
///
/// Not thread-safe; share it behind external synchronization or not at all.
pub struct FreeListAllocator<R: Region> {
    region: R,
    used: usize,
    /// Offset of the first free node, [`NIL`] when the region is exhausted.
    head: usize,
    policy: FitPolicy,
}

impl FreeListAllocator<OwnedRegion> {
    /// First-fit allocator over a fresh OS mapping of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new_in(OwnedRegion::new(capacity))
    }

    /// Same as [`with_capacity`](Self::with_capacity) with an explicit
    /// placement policy.
    pub fn with_capacity_and_policy(capacity: usize, policy: FitPolicy) -> Self {
        Self::new_in_with_policy(OwnedRegion::new(capacity), policy)
    }
}

impl<const N: usize> FreeListAllocator<InlineRegion<N>> {
    /// First-fit allocator whose `N`-byte region lives inside the returned
    /// value.
    ///
    /// Moving the allocator moves the region, which invalidates any pointers
    /// already handed out; the free list itself survives the move.
    pub fn new_inline() -> Self {
        Self::new_in(InlineRegion::new())
    }

    /// Same as [`new_inline`](Self::new_inline) with an explicit placement
    /// policy.
    pub fn new_inline_with_policy(policy: FitPolicy) -> Self {
        Self::new_in_with_policy(InlineRegion::new(), policy)
    }
}

impl<'a> FreeListAllocator<BorrowedRegion<'a>> {
    /// First-fit allocator over a caller-provided buffer. The buffer is
    /// borrowed for the allocator's lifetime and never released by it.
    pub fn with_buffer(buf: &'a mut [u8]) -> Self {
        Self::new_in(BorrowedRegion::new(buf))
    }

    /// Same as [`with_buffer`](Self::with_buffer) with an explicit placement
    /// policy.
    pub fn with_buffer_and_policy(buf: &'a mut [u8], policy: FitPolicy) -> Self {
        Self::new_in_with_policy(BorrowedRegion::new(buf), policy)
    }
}

impl<R: Region> FreeListAllocator<R> {
    /// First-fit allocator over an arbitrary region.
    pub fn new_in(region: R) -> Self {
        Self::new_in_with_policy(region, FitPolicy::default())
    }

    /// Allocator over an arbitrary region with an explicit placement policy.
    ///
    /// # Panics
    ///
    /// Panics when the region cannot hold a single free node, or when its
    /// base is not aligned for the in-place bookkeeping records.
    pub fn new_in_with_policy(region: R, policy: FitPolicy) -> Self {
        assert!(
            region.capacity() >= NODE_SIZE,
            "region too small for free-list bookkeeping"
        );
        assert_eq!(
            region.base() as usize % NODE_ALIGN,
            0,
            "region base must be word-pair aligned"
        );

        let mut allocator = Self {
            region,
            used: 0,
            head: NIL,
            policy,
        };
        allocator.reset();
        allocator
    }

    /// Total size of the backing region in bytes.
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Bytes currently consumed by outstanding allocations, bookkeeping and
    /// padding included.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes not consumed by any outstanding allocation.
    pub fn free(&self) -> usize {
        self.region.capacity() - self.used
    }

    /// Placement policy this allocator was built with.
    pub fn policy(&self) -> FitPolicy {
        self.policy
    }

    /// Hands out `size` bytes whose address is a multiple of `alignment`.
    ///
    /// Returns `None` when `alignment` is not a power of two or no free
    /// block can fit the request; the allocator is left untouched in that
    /// case. The returned memory is uninitialized and stays valid until it
    /// is deallocated, the allocator is reset, or the allocator is dropped
    /// (or moved, for inline regions).
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if !is_valid_alignment(alignment) {
            return None;
        }

        // Blocks keep node-aligned boundaries, so split remainders can
        // always host a node record of their own.
        let size = align_forward_checked(size, NODE_ALIGN)?;

        let fit = match self.policy {
            FitPolicy::FirstFit => self.find_first_fit(size, alignment)?,
            FitPolicy::BestFit => self.find_best_fit(size, alignment)?,
        };

        let node = unsafe { self.node(fit.current) };
        let remaining = node.size - fit.required;

        let (next, block_size) = if remaining > NODE_SIZE {
            let split = fit.current + NODE_SIZE + fit.required;
            let split_node = FreeNode {
                size: remaining - NODE_SIZE,
                next: node.next,
            };
            unsafe { self.write_node(split, split_node) };

            (split, NODE_SIZE + fit.required)
        } else {
            // The tail end cannot host a node record; the allocation absorbs
            // the whole block and the header remembers the true span.
            (node.next, NODE_SIZE + node.size)
        };

        self.link(fit.previous, next);

        let base = self.region.base() as usize;
        // SAFETY: `aligned` lies inside the region past `current + NODE_SIZE`
        // with at least HEADER_SIZE bytes of padding before it.
        let ptr = unsafe { self.region.base().add(fit.aligned - base) };
        let header = AllocHeader {
            block_size,
            padding: fit.padding,
        };
        unsafe { ptr.sub(HEADER_SIZE).cast::<AllocHeader>().write(header) };

        self.used += block_size;

        NonNull::new(ptr)
    }

    /// Gives the block behind `ptr` back to the free list, merging it with
    /// either neighbour when they touch. A null `ptr` is a no-op.
    ///
    /// # Panics
    ///
    /// Panics when `ptr` lies outside the backing region; that is a caller
    /// bug the allocator refuses to paper over.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from [`allocate`](Self::allocate) on this
    /// allocator and must not have been deallocated (or invalidated by
    /// [`reset`](Self::reset)) since. In-bounds pointers that violate this
    /// are not detected and corrupt the free list.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        let base = self.region.base() as usize;
        let addr = ptr as usize;
        if addr < base || addr > base + self.region.capacity() {
            panic!("pointer is out of bounds");
        }

        let header = unsafe { ptr.sub(HEADER_SIZE).cast::<AllocHeader>().read() };
        let block_start = addr - header.padding - NODE_SIZE - base;
        let block_end = block_start + header.block_size;

        // Insertion point in the address-sorted list: `previous` is the last
        // node below the block, `current` the first above it.
        let mut previous = NIL;
        let mut current = self.head;
        while current != NIL && current < block_start {
            previous = current;
            current = unsafe { self.node(current) }.next;
        }

        let touches_previous = previous != NIL && {
            let node = unsafe { self.node(previous) };
            previous + NODE_SIZE + node.size == block_start
        };
        let touches_current = current != NIL && current == block_end;

        match (touches_previous, touches_current) {
            (true, true) => {
                // The freed block bridges both neighbours into one.
                let current_node = unsafe { self.node(current) };
                let mut node = unsafe { self.node(previous) };
                node.size += header.block_size + NODE_SIZE + current_node.size;
                node.next = current_node.next;
                unsafe { self.write_node(previous, node) };
            }
            (true, false) => {
                let mut node = unsafe { self.node(previous) };
                node.size += header.block_size;
                unsafe { self.write_node(previous, node) };
            }
            (false, true) => {
                // Swallow the right neighbour, reclaiming its node record.
                let current_node = unsafe { self.node(current) };
                let merged = FreeNode {
                    size: header.block_size + current_node.size,
                    next: current_node.next,
                };
                unsafe { self.write_node(block_start, merged) };
                self.link(previous, block_start);
            }
            (false, false) => {
                let node = FreeNode {
                    size: header.block_size - NODE_SIZE,
                    next: current,
                };
                unsafe { self.write_node(block_start, node) };
                self.link(previous, block_start);
            }
        }

        self.used -= header.block_size;
    }

    /// Restores the pristine single-node state, abandoning every outstanding
    /// allocation. An escape hatch: pointers handed out earlier silently
    /// become invalid.
    pub fn reset(&mut self) {
        let node = FreeNode {
            size: self.region.capacity() - NODE_SIZE,
            next: NIL,
        };
        unsafe { self.write_node(0, node) };

        self.head = 0;
        self.used = 0;
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

    /// Drops the value at `ptr` in place and releases its block.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`emplace`](Self::emplace) on this allocator,
    /// the value must not have been dropped already, and no reset may have
    /// happened in between.
    pub unsafe fn destroy<T>(&mut self, ptr: *mut T) {
        if ptr.is_null() {
            return;
        }

        unsafe {
            ptr.drop_in_place();
            self.deallocate(ptr.cast());
        }
    }

    fn find_first_fit(&self, size: usize, alignment: usize) -> Option<Fit> {
        let mut previous = NIL;
        let mut current = self.head;

        while current != NIL {
            let node = unsafe { self.node(current) };
            let (aligned, padding) = self.placement(current, alignment)?;
            let required = size.checked_add(padding)?;

            if node.size >= required {
                return Some(Fit {
                    previous,
                    current,
                    aligned,
                    padding,
                    required,
                });
            }

            previous = current;
            current = node.next;
        }

        None
    }

    fn find_best_fit(&self, size: usize, alignment: usize) -> Option<Fit> {
        let mut best: Option<Fit> = None;
        let mut min_slack = usize::MAX;

        let mut previous = NIL;
        let mut current = self.head;

        while current != NIL {
            let node = unsafe { self.node(current) };
            let (aligned, padding) = self.placement(current, alignment)?;
            let required = size.checked_add(padding)?;

            if node.size >= required {
                let slack = node.size - required;
                let fit = Fit {
                    previous,
                    current,
                    aligned,
                    padding,
                    required,
                };

                if slack == 0 {
                    return Some(fit);
                }

                // Strict comparison keeps the lowest-address node on ties.
                if slack < min_slack {
                    min_slack = slack;
                    best = Some(fit);
                }
            }

            previous = current;
            current = node.next;
        }

        best
    }

    /// Where inside the node at `node_offset` a request with this alignment
    /// would land: the absolute user address and the padding before it.
    ///
    /// Alignment is computed on absolute addresses. The padding is grown
    /// until the allocation header fits in the gap, bumping by the effective
    /// alignment so the user address stays aligned.
    fn placement(&self, node_offset: usize, alignment: usize) -> Option<(usize, usize)> {
        let raw = self.region.base() as usize + node_offset + NODE_SIZE;
        let effective = alignment.max(NODE_ALIGN);

        let mut aligned = align_forward_checked(raw, effective)?;
        let mut padding = aligned - raw;
        while padding < HEADER_SIZE {
            aligned = aligned.checked_add(effective)?;
            padding += effective;
        }

        Some((aligned, padding))
    }

    /// Points `previous` (or the head, when `previous` is `NIL`) at `next`.
    fn link(&mut self, previous: usize, next: usize) {
        if previous == NIL {
            self.head = next;
        } else {
            let mut node = unsafe { self.node(previous) };
            node.next = next;
            unsafe { self.write_node(previous, node) };
        }
    }

    /// Reads the node record at `offset`.
    ///
    /// # Safety
    ///
    /// `offset` must be the offset of a live free node (or a node being
    /// created), node-aligned and at least `NODE_SIZE` below the capacity.
    unsafe fn node(&self, offset: usize) -> FreeNode {
        unsafe { self.region.base().add(offset).cast::<FreeNode>().read() }
    }

    /// Writes the node record at `offset`; same contract as [`node`](Self::node).
    unsafe fn write_node(&mut self, offset: usize, node: FreeNode) {
        unsafe { self.region.base().add(offset).cast::<FreeNode>().write(node) }
    }

    /// Free blocks as `(offset, usable size)` pairs in list order.
    #[cfg(test)]
    pub(crate) fn free_spans(&self) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();

        let mut current = self.head;
        while current != NIL {
            let node = unsafe { self.node(current) };
            spans.push((current, node.size));
            current = node.next;
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::block::NODE_SIZE;

    #[repr(align(16))]
    struct AlignedBuf<const N: usize>([u8; N]);

    impl<const N: usize> AlignedBuf<N> {
        fn new() -> Self {
            Self([0; N])
        }
    }

    fn basic_allocation<R: Region>(alloc: &mut FreeListAllocator<R>) {
        let ptr1 = alloc.allocate(100, 8).expect("first allocation fits");
        let ptr2 = alloc.allocate(100, 8).expect("second allocation fits");

        assert_ne!(ptr1, ptr2);
    }

    fn aligns_correctly<R: Region>(alloc: &mut FreeListAllocator<R>) {
        let ptr1 = alloc.allocate(13, 1).unwrap();
        let ptr2 = alloc.allocate(50, 8).unwrap();
        let ptr3 = alloc.allocate(100, 16).unwrap();

        assert!(!ptr1.as_ptr().is_null());
        assert_eq!(ptr2.as_ptr() as usize % 8, 0);
        assert_eq!(ptr3.as_ptr() as usize % 16, 0);
    }

    fn out_of_order_reuse<R: Region>(alloc: &mut FreeListAllocator<R>) {
        let ptr1 = alloc.allocate(100, 8).unwrap();
        let ptr2 = alloc.allocate(100, 8).unwrap();
        let ptr3 = alloc.allocate(100, 8).unwrap();

        unsafe {
            alloc.deallocate(ptr2.as_ptr());
            alloc.deallocate(ptr1.as_ptr());
        }

        let ptr4 = alloc.allocate(100, 8).unwrap();
        let ptr5 = alloc.allocate(100, 8).unwrap();

        assert_ne!(ptr4, ptr5);
        assert!(ptr1 == ptr4 || ptr1 == ptr5);
        assert!(ptr2 == ptr4 || ptr2 == ptr5);
        let _ = ptr3;
    }

    fn coalesces_into_large_block<R: Region>(alloc: &mut FreeListAllocator<R>) {
        let ptr1 = alloc.allocate(300, 8).unwrap();
        let ptr2 = alloc.allocate(300, 8).unwrap();
        let ptr3 = alloc.allocate(300, 8).unwrap();

        unsafe {
            alloc.deallocate(ptr1.as_ptr());
            alloc.deallocate(ptr2.as_ptr());
            alloc.deallocate(ptr3.as_ptr());
        }

        // Only possible if all three blocks merged back with the tail.
        assert!(alloc.allocate(850, 8).is_some());
    }

    #[test]
    fn basic_allocation_all_regions() {
        basic_allocation(&mut FreeListAllocator::with_capacity(1024));
        basic_allocation(&mut FreeListAllocator::<InlineRegion<1024>>::new_inline());

        let mut buf = AlignedBuf::<1024>::new();
        basic_allocation(&mut FreeListAllocator::with_buffer(&mut buf.0));
    }

    #[test]
    fn alignment_all_regions() {
        aligns_correctly(&mut FreeListAllocator::with_capacity(1024));
        aligns_correctly(&mut FreeListAllocator::<InlineRegion<1024>>::new_inline());

        let mut buf = AlignedBuf::<1024>::new();
        aligns_correctly(&mut FreeListAllocator::with_buffer(&mut buf.0));
    }

    #[test]
    fn out_of_order_reuse_all_regions() {
        out_of_order_reuse(&mut FreeListAllocator::with_capacity(1024));
        out_of_order_reuse(&mut FreeListAllocator::<InlineRegion<1024>>::new_inline());

        let mut buf = AlignedBuf::<1024>::new();
        out_of_order_reuse(&mut FreeListAllocator::with_buffer(&mut buf.0));
    }

    #[test]
    fn coalescing_all_regions() {
        coalesces_into_large_block(&mut FreeListAllocator::with_capacity(1024));
        coalesces_into_large_block(&mut FreeListAllocator::<InlineRegion<1024>>::new_inline());

        let mut buf = AlignedBuf::<1024>::new();
        coalesces_into_large_block(&mut FreeListAllocator::with_buffer(&mut buf.0));
    }

    #[test]
    fn coalescing_survives_any_release_order() {
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for order in orders {
            let mut alloc = FreeListAllocator::with_capacity(1024);
            let ptrs = [
                alloc.allocate(300, 8).unwrap(),
                alloc.allocate(300, 8).unwrap(),
                alloc.allocate(300, 8).unwrap(),
            ];

            for index in order {
                unsafe { alloc.deallocate(ptrs[index].as_ptr()) };
            }

            assert_eq!(alloc.used(), 0, "order {order:?} leaked");
            assert_eq!(
                alloc.free_spans(),
                vec![(0, 1024 - NODE_SIZE)],
                "order {order:?} left fragments"
            );
        }
    }

    #[test]
    fn deallocate_and_reallocate_reuses_the_block() {
        let mut alloc = FreeListAllocator::with_capacity(1024);

        let ptr1 = alloc.allocate(100, 8).unwrap();
        unsafe { alloc.deallocate(ptr1.as_ptr()) };

        let ptr2 = alloc.allocate(100, 8).unwrap();
        assert_eq!(ptr1, ptr2);
    }

    #[test]
    fn failed_allocation_changes_nothing() {
        let mut alloc = FreeListAllocator::with_capacity(1024);

        assert!(alloc.allocate(2000, 8).is_none());
        assert_eq!(alloc.used(), 0);

        assert!(alloc.allocate(100, 8).is_some());
    }

    #[test]
    fn used_and_free_always_cover_the_region() {
        let mut alloc = FreeListAllocator::with_capacity(1024);
        assert_eq!(alloc.used() + alloc.free(), 1024);

        let ptr = alloc.allocate(100, 8).unwrap();
        assert_eq!(alloc.used() + alloc.free(), 1024);
        assert!(alloc.used() > 100);

        unsafe { alloc.deallocate(ptr.as_ptr()) };
        assert_eq!(alloc.used(), 0);
        assert_eq!(alloc.free(), 1024);
    }

    #[test]
    fn deallocate_null_is_a_noop() {
        let mut alloc = FreeListAllocator::with_capacity(1024);
        let ptr1 = alloc.allocate(100, 8).unwrap();

        let used_before = alloc.used();
        let free_before = alloc.free();

        unsafe { alloc.deallocate(ptr::null_mut()) };

        assert_eq!(alloc.used(), used_before);
        assert_eq!(alloc.free(), free_before);

        // ptr1 is still a live allocation.
        let ptr2 = alloc.allocate(200, 8).unwrap();
        assert_ne!(ptr1, ptr2);
    }

    #[test]
    #[should_panic(expected = "pointer is out of bounds")]
    fn deallocate_out_of_bounds_aborts() {
        let mut alloc = FreeListAllocator::with_capacity(1024);
        let valid = alloc.allocate(100, 8).unwrap();

        let invalid = unsafe { valid.as_ptr().add(10_000) };
        unsafe { alloc.deallocate(invalid) };
    }

    #[test]
    fn reset_reuses_the_head_of_the_region() {
        let mut alloc = FreeListAllocator::with_capacity(1024);

        let ptr1 = alloc.allocate(500, 8).unwrap();
        alloc.reset();
        let ptr2 = alloc.allocate(500, 8).unwrap();

        assert_eq!(ptr1, ptr2);
    }

    #[test]
    fn rejects_invalid_alignments() {
        let mut alloc = FreeListAllocator::with_capacity(1024);

        for alignment in [0, 3, 6] {
            assert!(alloc.allocate(100, alignment).is_none());
        }
    }

    #[test]
    fn first_fit_takes_the_earliest_hole_best_fit_the_tightest() {
        fn carve_two_holes<R: Region>(
            alloc: &mut FreeListAllocator<R>,
        ) -> (NonNull<u8>, NonNull<u8>) {
            let big = alloc.allocate(300, 8).unwrap();
            let _guard1 = alloc.allocate(8, 8).unwrap();
            let small = alloc.allocate(104, 8).unwrap();
            let _guard2 = alloc.allocate(8, 8).unwrap();

            unsafe {
                alloc.deallocate(big.as_ptr());
                alloc.deallocate(small.as_ptr());
            }

            (big, small)
        }

        let mut first_fit = FreeListAllocator::with_capacity(1024);
        let (big_hole, _) = carve_two_holes(&mut first_fit);
        assert_eq!(first_fit.allocate(100, 8).unwrap(), big_hole);

        let mut best_fit =
            FreeListAllocator::with_capacity_and_policy(1024, FitPolicy::BestFit);
        let (_, tight_hole) = carve_two_holes(&mut best_fit);
        assert_eq!(best_fit.allocate(100, 8).unwrap(), tight_hole);
    }

    #[test]
    fn default_policy_is_first_fit() {
        let alloc = FreeListAllocator::with_capacity(1024);
        assert_eq!(alloc.policy(), FitPolicy::FirstFit);

        let alloc = FreeListAllocator::with_capacity_and_policy(1024, FitPolicy::BestFit);
        assert_eq!(alloc.policy(), FitPolicy::BestFit);
    }

    #[test]
    fn typed_allocation_is_aligned_and_writable() {
        let mut alloc = FreeListAllocator::with_capacity(1024);
        let ptr = alloc.allocate_array::<u32>(10).unwrap();

        assert_eq!(ptr.as_ptr() as usize % mem::align_of::<u32>(), 0);

        unsafe {
            for i in 0..10 {
                ptr.as_ptr().add(i).write(i as u32);
            }
            for i in 0..10 {
                assert_eq!(ptr.as_ptr().add(i).read(), i as u32);
            }
        }
    }

    #[test]
    fn typed_allocation_rejects_overflowing_counts() {
        let mut alloc = FreeListAllocator::with_capacity(1024);
        assert!(alloc.allocate_array::<u64>(usize::MAX / 4).is_none());
    }

    #[test]
    fn typed_deallocate_returns_the_same_block() {
        let mut alloc = FreeListAllocator::with_capacity(1024);

        let ptr1 = alloc.allocate_array::<u32>(10).unwrap();
        unsafe { alloc.deallocate(ptr1.as_ptr().cast()) };

        let ptr2 = alloc.allocate_array::<u32>(10).unwrap();
        assert_eq!(ptr1, ptr2);
    }

    #[test]
    fn emplace_constructs_in_place() {
        let mut alloc = FreeListAllocator::with_capacity(1024);
        let obj = alloc.emplace((15, 3.14f64)).unwrap();

        unsafe {
            assert_eq!(obj.as_ref().0, 15);
            assert_eq!(obj.as_ref().1, 3.14);
            alloc.destroy(obj.as_ptr());
        }

        assert_eq!(alloc.used(), 0);
    }

    #[test]
    fn destroy_runs_drop_for_every_value() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked(#[allow(dead_code)] u32);

        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        DROPS.store(0, Ordering::Relaxed);
        let mut alloc = FreeListAllocator::with_capacity(1024);

        let obj1 = alloc.emplace(Tracked(10)).unwrap();
        let obj2 = alloc.emplace(Tracked(10)).unwrap();
        let obj3 = alloc.emplace(Tracked(10)).unwrap();

        unsafe {
            alloc.destroy(obj1.as_ptr());
            alloc.destroy(obj2.as_ptr());
            alloc.destroy(obj3.as_ptr());
        }

        assert_eq!(DROPS.load(Ordering::Relaxed), 3);
        assert_eq!(alloc.used(), 0);
    }

    #[test]
    #[should_panic(expected = "region too small")]
    fn refuses_regions_below_the_node_record() {
        let _ = FreeListAllocator::<InlineRegion<8>>::new_inline();
    }
}
