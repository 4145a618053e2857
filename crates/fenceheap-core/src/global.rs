//! The process-wide allocator singleton and its single critical section.

use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::allocator::Allocator;

static ALLOCATOR: OnceLock<Mutex<Allocator>> = OnceLock::new();

/// Runs `f` against the single process-wide allocator, holding the global
/// mutex for the duration of `f`. This is the one critical section every
/// public entry point passes through — there are no lock-free fast paths
/// and no fine-grained per-block locking.
pub fn with_allocator<R>(f: impl FnOnce(&mut Allocator) -> R) -> R {
    let mutex = ALLOCATOR.get_or_init(|| Mutex::new(Allocator::new()));
    let mut guard = mutex.lock();
    f(&mut guard)
}
