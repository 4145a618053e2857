//! Allocator error kinds.

use thiserror::Error;

/// Failure modes for the allocator's fallible entry points.
///
/// Both variants are reported to the caller as a null pointer; neither is
/// fatal to the process, and allocator state is left untouched on error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The rounded request does not fit in a single arena, even empty.
    #[error("requested size {0} exceeds arena capacity")]
    OversizedRequest(usize),
    /// The OS declined to extend the process break.
    #[error("operating system declined to extend the heap")]
    OsExhausted,
}
