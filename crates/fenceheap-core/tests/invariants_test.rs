//! Bounded random alloc/free sequences, checked against the invariants
//! from the specification's "Testable Properties" section:
//!
//! - P1: every live user pointer is 8-byte aligned.
//! - P2: no two live user regions overlap.
//! - P3: walking one arena head-to-foot is internally consistent: each
//!   block's `left_size` matches the previous block's `size`, and the
//!   walk terminates exactly at the foot fence post.
//! - P4: the free list holds exactly the blocks the arena walk reports
//!   as `allocated == false` (fence posts excluded).
//! - P5: no two physically adjacent blocks are both free (coalescing
//!   would have merged them).
//! - P6: a byte pattern written into a freshly allocated region reads back
//!   unchanged up until that region is freed (nothing else — a split, a
//!   merge, a neighbor's header write — clobbers live payload bytes).
//!
//! P7 (`callocate` returns an all-zero region) is covered separately in
//! `callocate_returns_zeroed_region` below, since it needs no sequence.
//!
//! The driver is a small xorshift PRNG, not `proptest`/`quickcheck`:
//! neither appears in any dependency of this workspace's lineage.

use std::ptr::NonNull;

use fenceheap_core::Allocator;

struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed | 1 }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_below(&mut self, bound: usize) -> usize {
        (self.next_u64() as usize) % bound
    }
}

fn check_arena_walk(alloc: &Allocator, index: usize) {
    let blocks = alloc.walk_arena(index);
    assert!(blocks.len() >= 2, "arena must contain at least both fence posts");

    let (head_size, head_left, head_allocated) = blocks[0];
    assert_eq!(head_size, 0, "head fence post must carry size 0");
    assert_eq!(head_left, 0, "head fence post has no left neighbor");
    assert!(head_allocated, "head fence post must read as allocated");

    let (foot_size, _foot_left, foot_allocated) = *blocks.last().unwrap();
    assert_eq!(foot_size, 0, "foot fence post must carry size 0");
    assert!(foot_allocated, "foot fence post must read as allocated");

    // P3: left_size chains back to the previous block's size.
    for pair in blocks.windows(2) {
        let (prev_size, _, prev_allocated) = pair[0];
        let (_, next_left, next_allocated) = pair[1];
        assert_eq!(
            next_left, prev_size,
            "a block's left_size must equal its physical left neighbor's size"
        );

        // P5: no two adjacent free interior blocks (fence posts are
        // always allocated, so this only bites between interior blocks).
        if !prev_allocated && !next_allocated {
            panic!("two physically adjacent blocks are both free: coalescing should have merged them");
        }
    }
}

fn free_block_count(alloc: &Allocator) -> usize {
    (0..alloc.arena_count())
        .map(|i| {
            alloc
                .walk_arena(i)
                .iter()
                .filter(|(size, _, allocated)| *size != 0 && !*allocated)
                .count()
        })
        .sum()
}

/// Fills `ptr[..size]` with `pattern`.
///
/// # Safety
/// `ptr` must be valid for `size` writable bytes.
unsafe fn stamp_pattern(ptr: NonNull<u8>, size: usize, pattern: u8) {
    unsafe { std::ptr::write_bytes(ptr.as_ptr(), pattern, size) };
}

/// Checks that `ptr[..size]` is still entirely `pattern`.
///
/// # Safety
/// `ptr` must be valid for `size` readable bytes.
unsafe fn pattern_intact(ptr: NonNull<u8>, size: usize, pattern: u8) -> bool {
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), size) };
    bytes.iter().all(|&b| b == pattern)
}

fn check_invariants(alloc: &mut Allocator, live: &[(NonNull<u8>, usize, u8)]) {
    // P1: alignment.
    for (ptr, _, _) in live {
        assert_eq!(ptr.as_ptr() as usize % 8, 0, "live pointer must be 8-byte aligned");
    }

    // P2: no overlap between live user regions, checked as half-open
    // `[start, start + requested_size)` intervals.
    let mut spans: Vec<(usize, usize)> = live
        .iter()
        .map(|(ptr, size, _)| {
            let start = ptr.as_ptr() as usize;
            (start, start + size)
        })
        .collect();
    spans.sort_unstable();
    for pair in spans.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "live allocations must not overlap: {:?} vs {:?}",
            pair[0],
            pair[1]
        );
    }

    // P3 / P5 across every arena obtained so far.
    for i in 0..alloc.arena_count() {
        check_arena_walk(alloc, i);
    }

    // P4: free-list membership matches the arena walk's free blocks.
    assert_eq!(alloc.free_list_sizes().len(), free_block_count(alloc));

    // P6: every live region's stamped pattern is still intact.
    for (ptr, size, pattern) in live {
        // SAFETY: `ptr` is still live (not yet freed) and was stamped with
        // `pattern` for exactly `size` bytes when it was allocated.
        assert!(
            unsafe { pattern_intact(*ptr, *size, *pattern) },
            "live region's payload was clobbered by a later allocator operation"
        );
    }
}

#[test]
fn random_alloc_free_sequence_preserves_invariants() {
    let mut alloc = Allocator::new();
    let mut rng = XorShift64::new(0xC0FFEE_u64);
    let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

    for _ in 0..2_000 {
        let should_allocate = live.is_empty() || rng.next_below(3) != 0;

        if should_allocate {
            let size = 1 + rng.next_below(512);
            match alloc.allocate(size) {
                Ok(ptr) => {
                    // Non-zero so a stray zero-fill bug (e.g. from a
                    // neighboring `callocate`) would also be caught.
                    let pattern = (rng.next_u64() as u8) | 1;
                    // SAFETY: `ptr` was just allocated for `size` bytes.
                    unsafe { stamp_pattern(ptr, size, pattern) };
                    live.push((ptr, size, pattern));
                }
                Err(_) => {
                    // Oversized or OS-exhausted: state must be untouched.
                }
            }
        } else {
            let index = rng.next_below(live.len());
            let (ptr, _, _) = live.swap_remove(index);
            // SAFETY: `ptr` came from `allocate` above and is removed from
            // `live` here, so it is freed exactly once.
            unsafe { alloc.deallocate(Some(ptr)) };
        }

        check_invariants(&mut alloc, &live);
    }

    for (ptr, _, _) in live.drain(..) {
        // SAFETY: every remaining pointer is still live and freed once.
        unsafe { alloc.deallocate(Some(ptr)) };
    }
    check_invariants(&mut alloc, &[]);
    assert_eq!(free_block_count(&alloc), alloc.arena_count());
}

#[test]
fn deterministic_seed_reaches_multi_arena_growth() {
    let mut alloc = Allocator::new();
    let mut rng = XorShift64::new(42);
    let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

    for _ in 0..500 {
        let size = 1 + rng.next_below(4096);
        match alloc.allocate(size) {
            Ok(ptr) => {
                let pattern = (rng.next_u64() as u8) | 1;
                // SAFETY: `ptr` was just allocated for `size` bytes.
                unsafe { stamp_pattern(ptr, size, pattern) };
                live.push((ptr, size, pattern));
            }
            Err(_) => {}
        }
        check_invariants(&mut alloc, &live);
    }

    assert!(alloc.arena_count() >= 1);

    for (ptr, _, _) in live.drain(..) {
        unsafe { alloc.deallocate(Some(ptr)) };
    }
    check_invariants(&mut alloc, &[]);
}

#[test]
fn callocate_returns_zeroed_region() {
    let mut alloc = Allocator::new();

    let count = 37;
    let elem_size = 5;
    let ptr = alloc
        .callocate(count, elem_size)
        .expect("small calloc request must succeed");

    // SAFETY: `callocate` guarantees `count * elem_size` readable bytes.
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), count * elem_size) };
    assert!(bytes.iter().all(|&b| b == 0), "callocate must zero-fill its region");

    // SAFETY: `ptr` was just returned by `callocate` and is freed once.
    unsafe { alloc.deallocate(Some(ptr)) };
}
