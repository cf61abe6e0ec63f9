//! Walkthrough of the bump allocator: monotonic allocation, an in-place
//! resize of the most recent allocation, and a bulk reset.

use fixedalloc::LinearAllocator;

fn main() {
    let mut allocator = LinearAllocator::with_capacity(1024);

    let a = allocator.allocate(100, 8).expect("plenty of room");
    println!("100 bytes at {a:?}, used {}", allocator.used());

    let b = allocator.allocate(13, 1).expect("plenty of room");
    let c = allocator.allocate(50, 8).expect("plenty of room");
    println!(
        "13 then 50 bytes at {b:?} / {c:?} (note the alignment gap), used {}",
        allocator.used()
    );

    let grown = allocator
        .resize_last(c.as_ptr(), 200, 8)
        .expect("tail space is free");
    println!("grew the last allocation in place at {grown:?}, used {}", allocator.used());

    allocator.reset();
    let again = allocator.allocate(100, 8).expect("everything is free again");
    println!("after reset the first address comes back: {again:?} == {a:?}");
}
