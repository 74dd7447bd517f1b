//! # Introduction
//!
//! steptrace parses and executes a small indentation-block scripting
//! language, capturing a snapshot of every in-scope variable after each
//! executed statement, and estimates the asymptotic complexity of the source
//! with a static heuristic. The frames and the label feed a step-through
//! visualizer.
//!
//! ## Pipeline
//!
//! ```text
//! source → Lexer → Parser → AST ──→ Complexity Estimator ──→ label
//!                            └────→ Instrumenter → Interpreter → frames
//! ```
//!
//! 1. [`parser`] — tokenises the source (layout-aware) and builds an AST.
//! 2. [`analysis`] — static complexity estimation over the original tree.
//! 3. [`instrument`] — inserts line/snapshot hooks after every statement.
//! 4. [`interpreter`] — walks the instrumented tree; [`memory`] holds the
//!    tagged values, the object arena, and the scope chains.
//! 5. [`trace`] — frame types, the per-invocation recorder, and the
//!    shape-classifying frame serializer.
//! 6. [`api`] — thin TCP transport speaking the JSON wire contract; not part
//!    of the core.
//!
//! ## Isolation
//!
//! Every call to [`trace`] builds a fresh interpreter, heap, and recorder.
//! Nothing is shared across invocations, so concurrent traces cannot observe
//! each other's state.

pub mod analysis;
pub mod api;
pub mod instrument;
pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod trace;

use interpreter::engine::Interpreter;
use parser::parser::Parser;
use thiserror::Error;

pub use analysis::estimate_complexity;
pub use interpreter::errors::RuntimeError;
pub use parser::parser::ParseError;
pub use trace::{TraceFrame, TraceResult};

/// Failure of one trace invocation. Parse errors and subject runtime errors
/// both surface here; snapshot-serialization problems never do (they are
/// contained per binding and logged).
#[derive(Debug, Clone, Error)]
pub enum TraceError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Trace the execution of a subject program.
///
/// Parses, instruments, and runs the source, returning the ordered frame
/// sequence together with the complexity label. Fails on a parse error or on
/// any uncaught failure of the subject program itself; no partial frame list
/// is returned on that path.
pub fn trace(source: &str) -> Result<TraceResult, TraceError> {
    let program = Parser::new(source)?.parse_program()?;
    let program = instrument::instrument(program);

    let mut interp = Interpreter::new();
    interp.run(&program)?;

    Ok(TraceResult {
        frames: interp.into_frames(),
        complexity: estimate_complexity(source),
    })
}
