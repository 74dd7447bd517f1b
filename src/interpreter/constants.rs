//! Execution limits
//!
//! The traced programs are trusted illustrative snippets, but a runaway loop
//! or unbounded recursion must fail the one invocation instead of taking the
//! process down (deep subject recursion otherwise maps straight onto the host
//! call stack). Both limits surface as ordinary runtime errors.

/// Maximum subject call depth
pub const MAX_CALL_DEPTH: usize = 200;

/// Maximum executed statements per invocation
pub const MAX_STEPS: u64 = 500_000;

/// Maximum number of elements an iterable may materialize (`range`, slices)
pub const MAX_ITERABLE_LEN: usize = 1_000_000;

/// Maximum nesting depth when deep-copying a value into a snapshot
pub const MAX_SERIALIZE_DEPTH: usize = 32;
