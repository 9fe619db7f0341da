//! Error types for the expression core.
//!
//! Two kinds of failure, per the compiler's own discipline: a [`ParseError`]
//! is a recoverable user-facing problem (reported through [`crate::diag::Diagnostics`]
//! and replaced with a safe synthesized value so compilation can continue),
//! while [`InternalError`] means the compiler itself is in an inconsistent
//! state (stack pointer mismatch, non-exhaustive location tag, a non-empty
//! deferred-ops queue at a sequence point) and aborts.

use std::fmt;

/// A recoverable, user-facing parse/semantic error.
#[derive(Debug, Clone)]
pub enum ParseError {
    /// Malformed syntax (missing `;`, `)`, `]`, unexpected token, ...).
    Syntax(String),
    /// A type-checking failure (mismatched operand classes, assignment to
    /// a const lvalue, incompatible pointer comparison, ...).
    Type(String),
    /// Division or modulo by zero inside a constant expression.
    DivByZero,
    /// Too many or too few arguments at a call site.
    ArgCount(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Syntax(s) => write!(f, "{s}"),
            ParseError::Type(s) => write!(f, "{s}"),
            ParseError::DivByZero => write!(f, "division by zero in constant expression"),
            ParseError::ArgCount(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<String> for ParseError {
    fn from(s: String) -> Self {
        ParseError::Syntax(s)
    }
}

/// An internal compiler inconsistency. Not a user error: these indicate a
/// bug in the core itself (§7 "Internal inconsistencies").
#[derive(Debug, Clone)]
pub enum InternalError {
    /// The virtual stack pointer did not balance across an expression.
    StackPtrMismatch { entry: i32, exit: i32 },
    /// An `ExprDesc`'s `Location` tag had no handler in an exhaustive match.
    UnknownLocation(String),
    /// The deferred-ops queue was non-empty at a statement boundary.
    DeferredQueueNotDrained(usize),
    /// Any other invariant violation, described in prose.
    Invariant(String),
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::StackPtrMismatch { entry, exit } => write!(
                f,
                "internal error: virtual stack pointer mismatch (entry={entry}, exit={exit})"
            ),
            InternalError::UnknownLocation(s) => {
                write!(f, "internal error: unhandled location tag '{s}'")
            }
            InternalError::DeferredQueueNotDrained(n) => write!(
                f,
                "internal error: {n} deferred operation(s) left undrained at sequence point"
            ),
            InternalError::Invariant(s) => write!(f, "internal error: {s}"),
        }
    }
}

impl std::error::Error for InternalError {}

/// Code-emission failure: either a logical inconsistency in what's being
/// asked of the emitter, or a formatting failure while writing an
/// instruction line.
#[derive(Debug)]
pub enum CodeGenError {
    /// A logical error in code generation (bad flags combination, an
    /// operation requested on a location that can't support it, ...).
    Logic(String),
    /// A formatting error while writing an instruction line.
    Format(std::fmt::Error),
}

impl fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeGenError::Logic(s) => write!(f, "{s}"),
            CodeGenError::Format(e) => write!(f, "code emission error: {e}"),
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<String> for CodeGenError {
    fn from(s: String) -> Self {
        CodeGenError::Logic(s)
    }
}

impl From<std::fmt::Error> for CodeGenError {
    fn from(e: std::fmt::Error) -> Self {
        CodeGenError::Format(e)
    }
}

impl From<InternalError> for CodeGenError {
    fn from(e: InternalError) -> Self {
        CodeGenError::Logic(e.to_string())
    }
}
