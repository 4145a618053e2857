//! Core allocator state: first-fit search, high-end splitting, immediate
//! boundary-tag coalescing, and arena growth on exhaustion.

use std::ptr::NonNull;

use crate::arena::{self, ARENA_SIZE, ArenaHandle};
use crate::config;
use crate::error::AllocError;
use crate::header::{BlockHeader, HEADER_SIZE};
use crate::stats::{AllocatorLogLevel, Counters, EventLog};

/// Rounds `value` up to the next multiple of 8, or `None` if doing so would
/// overflow `usize` (only reachable when `value` is within 7 of `usize::MAX`).
fn round_up_8(value: usize) -> Option<usize> {
    value.checked_add(7).map(|rounded| rounded & !7)
}

/// Central allocator state: the free list, the set of arenas obtained from
/// the OS, call counters, and the structured event log.
///
/// A single process-wide instance lives behind one mutex (see
/// [`crate::global`]); every method here assumes the caller already holds
/// that lock, so nothing in this type does its own locking.
pub struct Allocator {
    initialized: bool,
    verbose: bool,
    free_list: crate::freelist::FreeList,
    arenas: Vec<ArenaHandle>,
    heap_size: usize,
    counters: Counters,
    events: EventLog,
}

// SAFETY: every field is only ever touched through the single process-wide
// mutex in `crate::global`; there is no concurrent access to the raw
// pointers held by the free list or arena handles.
unsafe impl Send for Allocator {}

impl Allocator {
    pub fn new() -> Self {
        Self {
            initialized: false,
            verbose: true,
            free_list: crate::freelist::FreeList::new(),
            arenas: Vec::new(),
            heap_size: 0,
            counters: Counters::default(),
            events: EventLog::new(),
        }
    }

    /// Performs one-time setup: reads `MALLOCVERBOSE`, wires the free-list
    /// sentinel to itself now that `self` has reached its final address,
    /// and obtains the first arena. Idempotent; safe to call from every
    /// entry point.
    fn ensure_initialized(&mut self) -> Result<(), AllocError> {
        if self.initialized {
            return Ok(());
        }
        self.verbose = config::verbose_enabled();
        self.free_list.init();
        self.grow_heap()?;
        self.initialized = true;
        Ok(())
    }

    /// Requests one more arena from the OS, lays it out, and prepends its
    /// free interior block to the free list.
    fn grow_heap(&mut self) -> Result<(), AllocError> {
        // SAFETY: requests exactly one fixed-size arena.
        let base =
            unsafe { fenceheap_sys::request_arena(ARENA_SIZE) }.ok_or(AllocError::OsExhausted)?;
        // SAFETY: `base` is a fresh, otherwise-unused ARENA_SIZE region.
        let (handle, interior) = unsafe { arena::establish_arena(base) };
        // SAFETY: `interior` was just created and is linked into no list.
        unsafe { self.free_list.push_front(interior) };
        self.arenas.push(handle);
        self.heap_size += ARENA_SIZE;
        Ok(())
    }

    /// Walks the free list for the first block `size >= req`.
    fn find_fit(&mut self, req: usize) -> Option<NonNull<BlockHeader>> {
        self.free_list
            .iter()
            .find(|candidate| unsafe { candidate.as_ref().size } >= req)
    }

    /// Splits `candidate` from its high-address end if the remainder can
    /// hold a header plus 8 usable bytes; otherwise hands over the whole
    /// block. Returns the user pointer for the allocated portion.
    ///
    /// # Safety
    /// `candidate` must be a free block currently on the free list with
    /// `size >= req`.
    unsafe fn carve(&mut self, candidate: NonNull<BlockHeader>, req: usize) -> NonNull<u8> {
        let candidate_size = unsafe { candidate.as_ref().size };
        let remainder = candidate_size - req;

        if remainder > HEADER_SIZE + 7 {
            unsafe { (*candidate.as_ptr()).size = remainder };

            let new_addr = candidate.as_ptr() as usize + remainder;
            // SAFETY: `new_addr` lies within `candidate`'s former span.
            let carved = unsafe { NonNull::new_unchecked(new_addr as *mut BlockHeader) };
            unsafe {
                (*carved.as_ptr()).size = req;
                (*carved.as_ptr()).left_size = remainder;
                (*carved.as_ptr()).allocated = 1;
                (*carved.as_ptr()).next = std::ptr::null_mut();
                (*carved.as_ptr()).prev = std::ptr::null_mut();
            }

            // SAFETY: `carved.size` spans up to a valid neighbor header.
            let right = unsafe { BlockHeader::right_neighbor(carved) };
            unsafe { (*right.as_ptr()).left_size = req };

            BlockHeader::user_ptr(carved)
        } else {
            // SAFETY: `candidate` is currently linked into the free list.
            unsafe { self.free_list.remove(candidate) };
            unsafe { (*candidate.as_ptr()).allocated = 1 };
            BlockHeader::user_ptr(candidate)
        }
    }

    /// Core allocation: round, search, split-or-take, growing the heap at
    /// most once if nothing fits. No counters are touched here; callers
    /// own their own counter.
    fn allocate_raw(&mut self, n: usize) -> Result<NonNull<u8>, AllocError> {
        self.ensure_initialized()?;

        let Some(req) = n.checked_add(HEADER_SIZE).and_then(round_up_8) else {
            self.events.record(
                AllocatorLogLevel::Warn,
                "allocate",
                "request",
                Some(n),
                "oversized",
            );
            return Err(AllocError::OversizedRequest(n));
        };
        if req.saturating_add(4 * HEADER_SIZE).saturating_add(8) > ARENA_SIZE {
            self.events.record(
                AllocatorLogLevel::Warn,
                "allocate",
                "request",
                Some(n),
                "oversized",
            );
            return Err(AllocError::OversizedRequest(n));
        }

        if let Some(candidate) = self.find_fit(req) {
            // SAFETY: `candidate` came from `find_fit`, which only yields
            // live free-list members with sufficient size.
            let ptr = unsafe { self.carve(candidate, req) };
            self.events
                .record(AllocatorLogLevel::Info, "allocate", "request", Some(n), "ok");
            return Ok(ptr);
        }

        self.grow_heap()?;
        let candidate = self
            .find_fit(req)
            .expect("a freshly grown arena must satisfy any request that passed the size check");
        // SAFETY: as above.
        let ptr = unsafe { self.carve(candidate, req) };
        self.events.record(
            AllocatorLogLevel::Info,
            "allocate",
            "request",
            Some(n),
            "grew_heap",
        );
        Ok(ptr)
    }

    /// Core deallocation: classify both physical neighbors and merge
    /// immediately wherever they're free. No counters are touched here.
    ///
    /// # Safety
    /// `ptr` must have been returned by a still-live call to
    /// [`Allocator::allocate`]/[`Allocator::callocate`]/[`Allocator::reallocate`]
    /// and not yet freed.
    unsafe fn free_raw(&mut self, ptr: NonNull<u8>) {
        // SAFETY: contract of this function.
        let block = unsafe { BlockHeader::header_of(ptr) };
        // SAFETY: `block.left_size` is maintained by construction.
        let left = unsafe { BlockHeader::left_neighbor(block) };
        // SAFETY: `block.size` is maintained by construction.
        let right = unsafe { BlockHeader::right_neighbor(block) };

        // Read both neighbors' allocation state before mutating anything —
        // for the leftmost interior block `left` aliases `block` itself
        // (see `BlockHeader::left_neighbor`), and `block` is still marked
        // allocated at this point, so the read below correctly reports
        // "no left neighbor to merge with".
        let left_free = unsafe { !left.as_ref().is_allocated() };
        let right_free = unsafe { !right.as_ref().is_allocated() };

        match (left_free, right_free) {
            (true, true) => unsafe { self.merge_both(left, block, right) },
            (true, false) => unsafe { self.merge_left(left, block) },
            (false, true) => unsafe { self.merge_right(block, right) },
            (false, false) => unsafe { self.no_merge(block) },
        }

        self.events
            .record(AllocatorLogLevel::Info, "free", "release", None, "ok");
    }

    /// # Safety
    /// `left` and `right` must be free blocks physically adjacent to `block`.
    unsafe fn merge_both(
        &mut self,
        left: NonNull<BlockHeader>,
        block: NonNull<BlockHeader>,
        right: NonNull<BlockHeader>,
    ) {
        let block_size = unsafe { block.as_ref().size };
        let right_size = unsafe { right.as_ref().size };
        unsafe { (*left.as_ptr()).size += block_size + right_size };
        // SAFETY: `right` is currently linked into the free list.
        unsafe { self.free_list.remove(right) };
        let new_size = unsafe { left.as_ref().size };
        // SAFETY: `left.size` now spans up to a valid neighbor header.
        let beyond = unsafe { BlockHeader::right_neighbor(left) };
        unsafe { (*beyond.as_ptr()).left_size = new_size };
    }

    /// # Safety
    /// `left` must be a free block physically adjacent to `block`.
    unsafe fn merge_left(&mut self, left: NonNull<BlockHeader>, block: NonNull<BlockHeader>) {
        let block_size = unsafe { block.as_ref().size };
        unsafe { (*left.as_ptr()).size += block_size };
        let new_size = unsafe { left.as_ref().size };
        let beyond = unsafe { BlockHeader::right_neighbor(left) };
        unsafe { (*beyond.as_ptr()).left_size = new_size };
    }

    /// # Safety
    /// `right` must be a free block physically adjacent to `block`.
    unsafe fn merge_right(&mut self, block: NonNull<BlockHeader>, right: NonNull<BlockHeader>) {
        let right_size = unsafe { right.as_ref().size };
        unsafe { (*block.as_ptr()).size += right_size };
        // SAFETY: `right` is currently linked into the free list; `block`
        // is not (it was allocated), so it is safe to splice in.
        unsafe { self.free_list.replace(right, block) };
        unsafe { (*block.as_ptr()).allocated = 0 };
        let new_size = unsafe { block.as_ref().size };
        let beyond = unsafe { BlockHeader::right_neighbor(block) };
        unsafe { (*beyond.as_ptr()).left_size = new_size };
    }

    /// # Safety
    /// `block` must not currently be linked into the free list.
    unsafe fn no_merge(&mut self, block: NonNull<BlockHeader>) {
        unsafe { (*block.as_ptr()).allocated = 0 };
        unsafe { self.free_list.push_front(block) };
    }

    // ---------------------------------------------------------------
    // Public API. Each method owns exactly its own counter increment,
    // matching the original one-counter-per-symbol discipline.
    // ---------------------------------------------------------------

    pub fn allocate(&mut self, n: usize) -> Result<NonNull<u8>, AllocError> {
        self.counters.malloc_calls += 1;
        self.allocate_raw(n)
    }

    /// No-op if `ptr` is `None`, matching `free(NULL)`.
    ///
    /// # Safety
    /// If `Some`, `ptr` must satisfy the contract of [`Allocator::free_raw`].
    pub unsafe fn deallocate(&mut self, ptr: Option<NonNull<u8>>) {
        self.counters.free_calls += 1;
        if let Some(ptr) = ptr {
            // SAFETY: contract forwarded to the caller of this function.
            unsafe { self.free_raw(ptr) };
        }
    }

    pub fn callocate(&mut self, count: usize, elem_size: usize) -> Result<NonNull<u8>, AllocError> {
        self.counters.calloc_calls += 1;
        let total = count
            .checked_mul(elem_size)
            .ok_or(AllocError::OversizedRequest(usize::MAX))?;
        let ptr = self.allocate_raw(total)?;
        // SAFETY: `allocate_raw` guarantees `total` writable bytes at `ptr`.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, total) };
        Ok(ptr)
    }

    /// # Safety
    /// If `Some`, `ptr` must satisfy the contract of [`Allocator::free_raw`].
    pub unsafe fn reallocate(
        &mut self,
        ptr: Option<NonNull<u8>>,
        n: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.counters.realloc_calls += 1;

        let Some(old) = ptr else {
            return self.allocate_raw(n);
        };

        let new_ptr = self.allocate_raw(n)?;

        // SAFETY: `old` satisfies this function's contract, so its header
        // is valid to read.
        let old_size = unsafe { BlockHeader::header_of(old).as_ref().size } - HEADER_SIZE;
        let copy_len = old_size.min(n);
        // SAFETY: `new_ptr` is freshly allocated for at least `n` bytes and
        // `old` is valid for `old_size >= copy_len` bytes; the regions do
        // not overlap since they came from independent allocations.
        unsafe { std::ptr::copy_nonoverlapping(old.as_ptr(), new_ptr.as_ptr(), copy_len) };

        // SAFETY: `old` satisfies this function's contract.
        unsafe { self.free_raw(old) };

        Ok(new_ptr)
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn heap_size(&self) -> usize {
        self.heap_size
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Human-readable heap-size and counter summary, for the at-exit print
    /// and for tests. Triggers initialization if this is the first call.
    pub fn debug_summary(&mut self) -> String {
        let _ = self.ensure_initialized();
        let c = self.counters;
        format!(
            "heap_size={} mallocs={} reallocs={} callocs={} frees={}",
            self.heap_size, c.malloc_calls, c.realloc_calls, c.calloc_calls, c.free_calls
        )
    }

    /// Renders the free list as `[offset:N,size:N]->...`, offsets relative
    /// to the first arena's base. Triggers initialization if needed.
    pub fn debug_free_list(&mut self) -> String {
        let _ = self.ensure_initialized();
        let base = self
            .arenas
            .first()
            .map(|handle| handle.head.as_ptr() as usize)
            .unwrap_or(0);

        let mut rendered = String::from("FreeList: ");
        let entries: Vec<String> = self
            .free_list
            .iter()
            .map(|node| {
                let offset = node.as_ptr() as usize as isize - base as isize;
                let size = unsafe { node.as_ref().size };
                format!("[offset:{offset},size:{size}]")
            })
            .collect();
        rendered.push_str(&entries.join("->"));
        rendered
    }

    /// Sizes of every block currently on the free list, in list order.
    /// Exposed for invariant testing (P4) and debugging.
    pub fn free_list_sizes(&mut self) -> Vec<usize> {
        self.free_list
            .iter()
            .map(|node| unsafe { node.as_ref().size })
            .collect()
    }

    /// Number of arenas obtained from the OS so far. Exposed for testing.
    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    /// Walks one arena head-to-foot, yielding `(size, left_size, allocated)`
    /// for every header including the fence posts. Exposed for invariant
    /// testing (P3).
    pub fn walk_arena(&self, index: usize) -> Vec<(usize, usize, bool)> {
        let handle = self.arenas[index];
        let mut out = Vec::new();
        let mut cursor = handle.head;
        loop {
            let (size, left_size, allocated) = unsafe {
                (
                    cursor.as_ref().size,
                    cursor.as_ref().left_size,
                    cursor.as_ref().is_allocated(),
                )
            };
            out.push((size, left_size, allocated));
            if cursor == handle.foot {
                break;
            }
            let next_addr = if cursor == handle.head {
                cursor.as_ptr() as usize + HEADER_SIZE
            } else {
                cursor.as_ptr() as usize + size
            };
            cursor = unsafe { NonNull::new_unchecked(next_addr as *mut BlockHeader) };
        }
        out
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}
