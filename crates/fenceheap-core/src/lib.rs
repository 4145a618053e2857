//! Boundary-tag free-block management engine.
//!
//! This crate owns the part of the allocator that determines correctness
//! and fragmentation: the in-band header layout, the circular free list,
//! first-fit search with high-end splitting on allocation, and immediate
//! boundary-tag coalescing on deallocation. The C-ABI surface lives in
//! `fenceheap-abi`; this crate exposes a safe(ish), `Result`-typed API
//! instead.

pub mod allocator;
pub mod arena;
pub mod config;
pub mod error;
pub mod freelist;
pub mod global;
pub mod header;
pub mod stats;

pub use allocator::Allocator;
pub use arena::ARENA_SIZE;
pub use error::AllocError;
pub use global::with_allocator;
pub use header::HEADER_SIZE;
