//! Arena layout: fence posts plus the single interior free block.

use std::ptr::NonNull;

use crate::header::{BlockHeader, HEADER_SIZE};

/// Total size of one OS-obtained arena.
pub const ARENA_SIZE: usize = 2_097_152;

/// The two fence-post headers bounding one arena, kept around so the
/// allocator can walk and print each arena's contents.
#[derive(Debug, Clone, Copy)]
pub struct ArenaHandle {
    pub head: NonNull<BlockHeader>,
    pub foot: NonNull<BlockHeader>,
}

/// Installs fence posts at both ends of a fresh `ARENA_SIZE`-byte region and
/// writes the single interior free block spanning the rest.
///
/// Returns the arena's handle and the interior block, which the caller must
/// insert into the free list.
///
/// # Safety
/// `base` must point to at least `ARENA_SIZE` bytes of OS-obtained,
/// otherwise-unused, 8-byte-aligned memory.
pub unsafe fn establish_arena(base: NonNull<u8>) -> (ArenaHandle, NonNull<BlockHeader>) {
    let base_addr = base.as_ptr() as usize;

    let head = base.cast::<BlockHeader>();
    unsafe {
        (*head.as_ptr()).size = 0;
        (*head.as_ptr()).left_size = 0;
        (*head.as_ptr()).allocated = 1;
        (*head.as_ptr()).next = std::ptr::null_mut();
        (*head.as_ptr()).prev = std::ptr::null_mut();
    }

    let interior_size = ARENA_SIZE - 2 * HEADER_SIZE;
    let interior_addr = base_addr + HEADER_SIZE;
    let interior = unsafe { NonNull::new_unchecked(interior_addr as *mut BlockHeader) };
    unsafe {
        (*interior.as_ptr()).size = interior_size;
        (*interior.as_ptr()).left_size = 0;
        (*interior.as_ptr()).allocated = 0;
        (*interior.as_ptr()).next = std::ptr::null_mut();
        (*interior.as_ptr()).prev = std::ptr::null_mut();
    }

    let foot_addr = base_addr + ARENA_SIZE - HEADER_SIZE;
    let foot = unsafe { NonNull::new_unchecked(foot_addr as *mut BlockHeader) };
    unsafe {
        (*foot.as_ptr()).size = 0;
        (*foot.as_ptr()).left_size = interior_size;
        (*foot.as_ptr()).allocated = 1;
        (*foot.as_ptr()).next = std::ptr::null_mut();
        (*foot.as_ptr()).prev = std::ptr::null_mut();
    }

    (ArenaHandle { head, foot }, interior)
}
