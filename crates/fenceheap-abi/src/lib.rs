//! `extern "C"` boundary for `fenceheap`.
//!
//! Produces a `cdylib` exposing `malloc`/`free`/`calloc`/`realloc` under
//! their standard symbol names, suitable for `LD_PRELOAD`-style
//! interposition.
//!
//! Gated behind `cfg(not(test))`: exporting `#[no_mangle] malloc`/`free`
//! would shadow the system allocator inside the test binary itself,
//! causing infinite recursion the moment the test harness allocates
//! anything.
#[cfg(not(test))]
pub mod malloc_abi;
