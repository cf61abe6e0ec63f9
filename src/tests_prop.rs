//! Property-based tests driving both engines through random operation
//! sequences and checking the structural invariants after every step.

use std::ptr::NonNull;

use proptest::prelude::*;

use crate::block::NODE_SIZE;
use crate::{BorrowedRegion, FitPolicy, FreeListAllocator, LinearAllocator};

const CAPACITY: usize = 4096;

#[repr(align(16))]
struct AlignedBuf([u8; CAPACITY]);

#[derive(Debug, Clone)]
enum Op {
    Allocate { size: usize, alignment: usize },
    Release { slot: usize },
}

fn arb_alignment() -> impl Strategy<Value = usize> {
    prop_oneof![
        Just(1usize),
        Just(2),
        Just(4),
        Just(8),
        Just(16),
        Just(32),
        Just(64),
    ]
}

fn arb_policy() -> impl Strategy<Value = FitPolicy> {
    prop_oneof![Just(FitPolicy::FirstFit), Just(FitPolicy::BestFit)]
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (1usize..512, arb_alignment())
                .prop_map(|(size, alignment)| Op::Allocate { size, alignment }),
            (0usize..64).prop_map(|slot| Op::Release { slot }),
        ],
        1..64,
    )
}

/// The free list must stay address-sorted, in-bounds, free of adjacent
/// blocks, and must account for every byte of the region together with
/// `used`.
fn check_free_list(alloc: &FreeListAllocator<BorrowedRegion<'_>>) {
    let mut accounted = alloc.used();
    let mut previous_end = None;

    for (offset, size) in alloc.free_spans() {
        let end = offset + NODE_SIZE + size;
        assert!(end <= CAPACITY, "free block runs past the region");

        if let Some(previous) = previous_end {
            assert!(
                offset > previous,
                "free list unsorted, overlapping, or uncoalesced at offset {offset}"
            );
        }
        previous_end = Some(end);

        accounted += NODE_SIZE + size;
    }

    assert_eq!(accounted, CAPACITY, "bytes leaked or double counted");
    assert_eq!(alloc.used() + alloc.free(), CAPACITY);
}

/// Replays `ops` against a fresh allocator, returning the pointers still
/// outstanding afterwards. Invariants are checked after every operation.
fn run_ops(
    alloc: &mut FreeListAllocator<BorrowedRegion<'_>>,
    base: usize,
    ops: &[Op],
) -> Vec<(NonNull<u8>, usize)> {
    let mut live: Vec<(NonNull<u8>, usize)> = Vec::new();

    for op in ops {
        match *op {
            Op::Allocate { size, alignment } => {
                if let Some(ptr) = alloc.allocate(size, alignment) {
                    let addr = ptr.as_ptr() as usize;
                    assert_eq!(addr % alignment, 0, "misaligned pointer");
                    assert!(addr >= base && addr + size <= base + CAPACITY);
                    live.push((ptr, size));
                }
            }
            Op::Release { slot } => {
                if !live.is_empty() {
                    let (ptr, _) = live.swap_remove(slot % live.len());
                    unsafe { alloc.deallocate(ptr.as_ptr()) };
                }
            }
        }

        check_free_list(alloc);
    }

    live
}

proptest! {
    #[test]
    fn free_list_invariants_hold_across_random_ops(
        policy in arb_policy(),
        ops in arb_ops(),
    ) {
        let mut buf = AlignedBuf([0; CAPACITY]);
        let base = buf.0.as_ptr() as usize;
        let mut alloc = FreeListAllocator::with_buffer_and_policy(&mut buf.0, policy);

        let live = run_ops(&mut alloc, base, &ops);

        // Draining the survivors must collapse the region back into the
        // single pristine block.
        for (ptr, _) in live {
            unsafe { alloc.deallocate(ptr.as_ptr()) };
            check_free_list(&alloc);
        }

        prop_assert_eq!(alloc.used(), 0);
        prop_assert_eq!(alloc.free_spans(), vec![(0, CAPACITY - NODE_SIZE)]);
    }

    #[test]
    fn allocate_then_deallocate_restores_the_allocator(
        policy in arb_policy(),
        ops in arb_ops(),
        size in 1usize..512,
        alignment in arb_alignment(),
    ) {
        let mut buf = AlignedBuf([0; CAPACITY]);
        let base = buf.0.as_ptr() as usize;
        let mut alloc = FreeListAllocator::with_buffer_and_policy(&mut buf.0, policy);

        let _live = run_ops(&mut alloc, base, &ops);

        let before = (alloc.used(), alloc.free_spans());

        if let Some(ptr) = alloc.allocate(size, alignment) {
            unsafe { alloc.deallocate(ptr.as_ptr()) };
        }

        let after = (alloc.used(), alloc.free_spans());
        prop_assert_eq!(before, after);
    }

    #[test]
    fn linear_pointers_are_sound_and_reset_replays_them(
        requests in prop::collection::vec((1usize..512, arb_alignment()), 1..64),
    ) {
        // The owned region is page-aligned, so pointer alignment holds for
        // every alignment the strategy can produce.
        let mut alloc = LinearAllocator::with_capacity(CAPACITY);

        let mut first_run = Vec::new();
        for &(size, alignment) in &requests {
            if let Some(ptr) = alloc.allocate(size, alignment) {
                let addr = ptr.as_ptr() as usize;
                prop_assert_eq!(addr % alignment, 0);
                first_run.push(ptr);
            }
            prop_assert!(alloc.used() <= alloc.capacity());
            prop_assert_eq!(alloc.used() + alloc.available(), alloc.capacity());
        }

        // Successive allocations never overlap and never leave the region.
        let first_base = first_run.first().map(|p| p.as_ptr() as usize);
        for pair in first_run.windows(2) {
            prop_assert!((pair[0].as_ptr() as usize) < pair[1].as_ptr() as usize);
        }
        if let Some(base) = first_base {
            for ptr in &first_run {
                prop_assert!((ptr.as_ptr() as usize) < base + CAPACITY);
            }
        }

        // After a reset the same request sequence replays the same
        // addresses.
        alloc.reset();
        let mut second_run = Vec::new();
        for &(size, alignment) in &requests {
            if let Some(ptr) = alloc.allocate(size, alignment) {
                second_run.push(ptr);
            }
        }

        prop_assert_eq!(first_run, second_run);
    }
}
