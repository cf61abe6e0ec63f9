//! Walkthrough of the free-list allocator: out-of-order release, reuse of a
//! freed block, and coalescing back into one region.

use fixedalloc::{FitPolicy, FreeListAllocator};

fn main() {
    let mut allocator = FreeListAllocator::with_capacity_and_policy(1024, FitPolicy::FirstFit);

    let a = allocator.allocate(100, 8).expect("plenty of room");
    let b = allocator.allocate(100, 8).expect("plenty of room");
    let c = allocator.allocate(100, 8).expect("plenty of room");
    println!(
        "three blocks at {a:?}, {b:?}, {c:?}; used {} free {}",
        allocator.used(),
        allocator.free()
    );

    unsafe { allocator.deallocate(b.as_ptr()) };
    println!("freed the middle block; used {}", allocator.used());

    let reused = allocator.allocate(100, 8).expect("the hole fits");
    println!("same-size request reuses it: {reused:?} == {b:?}");

    unsafe {
        allocator.deallocate(a.as_ptr());
        allocator.deallocate(reused.as_ptr());
        allocator.deallocate(c.as_ptr());
    }
    println!("freed everything; used {}", allocator.used());

    let big = allocator
        .allocate(900, 8)
        .expect("only possible if the blocks coalesced");
    println!("one 900-byte block after coalescing: {big:?}");
}
