//! Process-break memory primitive.
//!
//! Wraps the classical `sbrk` contract: extend the process data segment by
//! a fixed amount and hand back the base of the new region. This is the
//! only place in the workspace that talks to the OS for heap growth.

use std::ffi::c_void;
use std::ptr::NonNull;

/// Requests `size` bytes by extending the process break.
///
/// Returns the base address of the newly obtained region, or `None` if the
/// OS declined to extend the break (`sbrk` returns `(void *) -1` on
/// failure, mirroring the classical contract).
///
/// # Safety
///
/// `size` must be nonzero. The returned region is uninitialized and is
/// valid until the process break is moved backward, which this crate never
/// does.
pub unsafe fn request_arena(size: usize) -> Option<NonNull<u8>> {
    debug_assert!(size > 0, "request_arena called with zero size");

    // SAFETY: `sbrk` is a simple process-break adjustment; the kernel
    // guarantees either a valid base pointer or the sentinel `-1`.
    let raw = unsafe { libc::sbrk(size as libc::intptr_t) };

    if raw == usize::MAX as *mut c_void {
        return None;
    }

    NonNull::new(raw.cast::<u8>())
}
