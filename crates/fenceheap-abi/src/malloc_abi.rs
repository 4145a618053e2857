//! `extern "C"` entry points for `malloc`, `free`, `calloc`, `realloc`.
//!
//! Every symbol takes the single process-wide mutex via
//! `fenceheap_core::with_allocator`, drives the allocator core, and
//! converts `Err` into the platform's null-pointer failure convention.
//! Statistics printing is registered once, on the first call into any of
//! these symbols.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Once;

use fenceheap_core::with_allocator;

static ATEXIT_REGISTERED: Once = Once::new();

extern "C" fn print_stats_at_exit() {
    let (verbose, summary) = with_allocator(|a| (a.is_verbose(), a.debug_summary()));
    if verbose {
        println!("\n-------------------");
        println!("{summary}");
        println!("-------------------");
    }
}

fn ensure_atexit_registered() {
    ATEXIT_REGISTERED.call_once(|| {
        // SAFETY: `print_stats_at_exit` has the `extern "C" fn()` signature
        // `atexit` requires and never panics across the FFI boundary.
        unsafe {
            libc::atexit(print_stats_at_exit);
        }
    });
}

/// POSIX `malloc` — allocates `size` bytes of uninitialized, 8-byte-aligned
/// memory, or returns null if `size` is too large for a single arena.
///
/// # Safety
/// Caller must eventually `free` the returned pointer exactly once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    ensure_atexit_registered();
    with_allocator(|a| a.allocate(size))
        .map(|p| p.as_ptr().cast::<c_void>())
        .unwrap_or(std::ptr::null_mut())
}

/// POSIX `free` — deallocates memory previously returned by `malloc`,
/// `calloc`, or `realloc`. A null `ptr` is a no-op.
///
/// # Safety
/// `ptr` must be null or a value previously returned by `malloc`/`calloc`/
/// `realloc` and not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    ensure_atexit_registered();
    let ptr = NonNull::new(ptr.cast::<u8>());
    // SAFETY: forwarded from this function's contract.
    with_allocator(|a| unsafe { a.deallocate(ptr) });
}

/// POSIX `calloc` — allocates and zero-fills `nmemb * size` bytes. Returns
/// null if the multiplication overflows or the allocation fails.
///
/// # Safety
/// Caller must eventually `free` the returned pointer exactly once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    ensure_atexit_registered();
    with_allocator(|a| a.callocate(nmemb, size))
        .map(|p| p.as_ptr().cast::<c_void>())
        .unwrap_or(std::ptr::null_mut())
}

/// POSIX `realloc` — resizes a previous allocation, preserving
/// `min(old_size, size)` bytes. `ptr == NULL` behaves like `malloc`.
///
/// # Safety
/// `ptr` must be null or a value previously returned by `malloc`/`calloc`/
/// `realloc` and not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    ensure_atexit_registered();
    let ptr = NonNull::new(ptr.cast::<u8>());
    // SAFETY: forwarded from this function's contract.
    with_allocator(|a| unsafe { a.reallocate(ptr, size) })
        .map(|p| p.as_ptr().cast::<c_void>())
        .unwrap_or(std::ptr::null_mut())
}
