//! Runtime error types for the subject-language interpreter
//!
//! [`RuntimeError`] represents every failure the subject program itself can
//! produce during instrumented execution (as opposed to parse errors or
//! snapshot-serialization errors). Runtime errors are fatal for the
//! invocation: execution halts and no partial frame list is returned.

use crate::parser::ast::SourceLocation;
use thiserror::Error;

/// Errors raised while executing a subject program
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("name '{name}' is not defined at line {}", location.line)]
    NameError {
        name: String,
        location: SourceLocation,
    },

    #[error("'{type_name}' object has no attribute '{attr}' at line {}", location.line)]
    AttributeError {
        type_name: &'static str,
        attr: String,
        location: SourceLocation,
    },

    #[error("type error at line {}: {message}", location.line)]
    TypeError {
        message: String,
        location: SourceLocation,
    },

    #[error("index {index} out of range for length {len} at line {}", location.line)]
    IndexError {
        index: i64,
        len: usize,
        location: SourceLocation,
    },

    #[error("key {key} not found at line {}", location.line)]
    KeyError {
        key: String,
        location: SourceLocation,
    },

    #[error("value error at line {}: {message}", location.line)]
    ValueError {
        message: String,
        location: SourceLocation,
    },

    #[error("division by zero at line {}", location.line)]
    ZeroDivision { location: SourceLocation },

    #[error("function '{name}' expects {expected} argument{}, got {got} at line {}",
        if *expected == 1 { "" } else { "s" }, location.line)]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        got: usize,
        location: SourceLocation,
    },

    #[error("maximum call depth of {limit} exceeded at line {}", location.line)]
    RecursionLimit {
        limit: usize,
        location: SourceLocation,
    },

    #[error("execution step budget of {limit} exceeded")]
    StepBudgetExceeded { limit: u64 },

    #[error("'break' outside loop at line {}", location.line)]
    BreakOutsideLoop { location: SourceLocation },

    #[error("'continue' outside loop at line {}", location.line)]
    ContinueOutsideLoop { location: SourceLocation },

    #[error("'return' outside function at line {}", location.line)]
    ReturnOutsideFunction { location: SourceLocation },
}

impl RuntimeError {
    /// Source location of the failure, when one is known
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            RuntimeError::NameError { location, .. }
            | RuntimeError::AttributeError { location, .. }
            | RuntimeError::TypeError { location, .. }
            | RuntimeError::IndexError { location, .. }
            | RuntimeError::KeyError { location, .. }
            | RuntimeError::ValueError { location, .. }
            | RuntimeError::ZeroDivision { location }
            | RuntimeError::ArgumentCountMismatch { location, .. }
            | RuntimeError::RecursionLimit { location, .. }
            | RuntimeError::BreakOutsideLoop { location }
            | RuntimeError::ContinueOutsideLoop { location }
            | RuntimeError::ReturnOutsideFunction { location } => Some(*location),
            RuntimeError::StepBudgetExceeded { .. } => None,
        }
    }
}
