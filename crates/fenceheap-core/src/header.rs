//! The in-band boundary-tag header carried by every arena block.

use std::ptr::NonNull;

/// Header size in bytes. `#[repr(C)]` with five `usize`/pointer-sized
/// fields guarantees this is a multiple of 8 on every platform we target,
/// satisfying the "`H` is a multiple of 8" requirement without padding
/// tricks.
pub const HEADER_SIZE: usize = std::mem::size_of::<BlockHeader>();

/// A block header: total size (including itself), the size of the
/// physically preceding block, a live/free flag, and free-list linkage.
///
/// `next`/`prev` are meaningful only when `allocated == 0`, or for the
/// free-list sentinel, whose `size`/`left_size`/`allocated` fields are
/// never inspected.
#[repr(C)]
#[derive(Debug)]
pub struct BlockHeader {
    pub size: usize,
    pub left_size: usize,
    pub allocated: usize,
    pub next: *mut BlockHeader,
    pub prev: *mut BlockHeader,
}

impl BlockHeader {
    /// A header with no useful size/linkage, used only for the sentinel
    /// before its self-pointers are wired up by [`crate::freelist::FreeList::init`].
    pub const fn blank() -> Self {
        Self {
            size: 0,
            left_size: 0,
            allocated: 0,
            next: std::ptr::null_mut(),
            prev: std::ptr::null_mut(),
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated != 0
    }

    /// The header of this block's physical right neighbor.
    ///
    /// # Safety
    /// `this` must point to a live header whose `size` field correctly
    /// spans up to a valid neighbor header (fence-post foot at worst).
    pub unsafe fn right_neighbor(this: NonNull<BlockHeader>) -> NonNull<BlockHeader> {
        let size = unsafe { this.as_ref().size };
        let addr = this.as_ptr() as usize + size;
        unsafe { NonNull::new_unchecked(addr as *mut BlockHeader) }
    }

    /// The header of this block's physical left neighbor.
    ///
    /// For the leftmost interior block, `left_size == 0` and this returns
    /// `this` itself rather than the true fence-post head — which is safe
    /// because the only use of the result is to inspect `allocated` before
    /// `this` has been marked free, and `this` is still allocated at that
    /// point.
    ///
    /// # Safety
    /// `this` must point to a live header whose `left_size` correctly
    /// reflects the size of its physical left neighbor.
    pub unsafe fn left_neighbor(this: NonNull<BlockHeader>) -> NonNull<BlockHeader> {
        let left_size = unsafe { this.as_ref().left_size };
        let addr = this.as_ptr() as usize - left_size;
        unsafe { NonNull::new_unchecked(addr as *mut BlockHeader) }
    }

    /// The user-visible pointer for an allocated block: just past the header.
    pub fn user_ptr(this: NonNull<BlockHeader>) -> NonNull<u8> {
        let addr = this.as_ptr() as usize + HEADER_SIZE;
        unsafe { NonNull::new_unchecked(addr as *mut u8) }
    }

    /// The header belonging to a previously returned user pointer.
    ///
    /// # Safety
    /// `user` must have been produced by [`BlockHeader::user_ptr`] on a
    /// header of this layout.
    pub unsafe fn header_of(user: NonNull<u8>) -> NonNull<BlockHeader> {
        let addr = user.as_ptr() as usize - HEADER_SIZE;
        unsafe { NonNull::new_unchecked(addr as *mut BlockHeader) }
    }
}
