//! Tree-walking interpreter for the subject language
//!
//! - [`engine`]: the evaluator. Walks the instrumented AST, owns the heap,
//!   the scope arena, and the per-invocation trace recorder, and fires the
//!   snapshot hooks the instrumentation pass inserted.
//! - [`builtins`]: built-in functions and list/dict methods.
//! - [`errors`]: [`errors::RuntimeError`].
//! - [`constants`]: execution limits.

pub mod builtins;
pub mod constants;
pub mod engine;
pub mod errors;
