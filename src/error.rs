//! Error taxonomy.
//!
//! Errors are layered the same way the engine is:
//!
//! ```text
//! ConversionError ─┐
//!                  ├─> InvokeError ─┐
//! EmptyStackError ─┼────────────────┼─> RuleError ─> DigestError::Rule { phase, path, position }
//!                  │                │
//! PatternError ────┴────────────────┴─> DigestError::Pattern   (configuration time)
//! ```
//!
//! Matching never fails: "no rules for this path" is an empty list, not an
//! error. Everything raised from a rule callback is wrapped by the dispatcher
//! with the active match path and document position and aborts the parse.

use crate::Position;
use crate::bean::ValueType;
use std::fmt;

/// A string could not be coerced into the requested type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot convert '{value}' to {target}")]
pub struct ConversionError {
    pub value: String,
    pub target: ValueType,
}

/// Failures of the [`Invoker`](crate::bean::Invoker) capability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    #[error("target is not an object (found {found})")]
    NotAnObject { found: String },

    #[error("{type_name} has no writable property '{property}'")]
    NoSuchProperty { type_name: String, property: String },

    #[error("{type_name} has no method '{method}' taking {arity} argument(s)")]
    NoSuchMethod { type_name: String, method: String, arity: usize },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("{type_name} is already borrowed (re-entrant call)")]
    Busy { type_name: String },

    #[error("{0}")]
    Failed(String),
}

/// A pattern was rejected at registration time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("pattern '{0}' contains an empty path segment")]
    EmptySegment(String),

    #[error("pattern '{pattern}': {reason}")]
    Misplaced { pattern: String, reason: &'static str },

    #[error("pattern '{pattern}' is not a valid regular expression: {message}")]
    InvalidRegex { pattern: String, message: String },
}

/// Raised when popping a named stack that is empty or was never created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("named stack '{name}' is empty")]
pub struct EmptyStackError {
    pub name: String,
}

/// Anything a rule callback can fail with.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    EmptyStack(#[from] EmptyStackError),

    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("unknown object creation factory '{0}'")]
    UnknownFactory(String),

    #[error("no class name configured and attribute '{0}' not present")]
    NoClassName(String),

    #[error("object stack is empty, {0} has nothing to work on")]
    NothingOnStack(&'static str),

    #[error("call target is null (target offset {offset}, stack depth {depth})")]
    NoCallTarget { offset: isize, depth: usize },

    #[error("no parameter frame on the parameter stack")]
    NoParameterFrame,

    #[error("parameter index {index} out of range for a frame of {len}")]
    ParamIndex { index: usize, len: usize },

    #[error("object creation failed: {0}")]
    Creation(String),

    #[error("{0}")]
    Custom(String),
}

/// Which rule callback raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    Body,
    End,
    Finish,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Begin => "begin",
            Phase::Body => "body",
            Phase::End => "end",
            Phase::Finish => "finish",
        };
        f.write_str(s)
    }
}

/// Parse-fatal errors returned by the dispatcher and the parse entry points.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("{rule}.{phase}() failed at '{path}'{}: {source}", fmt_position(.position))]
    Rule {
        rule: String,
        phase: Phase,
        path: String,
        position: Option<Position>,
        #[source]
        source: RuleError,
    },

    #[error("XML syntax error{}: {message}", fmt_position(.position))]
    Syntax { position: Option<Position>, message: String },

    #[error("end of element '{name}' without a matching start")]
    Unbalanced { name: String },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_position(position: &Option<Position>) -> String {
    match position {
        Some(pos) => format!(" (line {}, column {})", pos.line, pos.column),
        None => String::new(),
    }
}

impl DigestError {
    /// The failing rule's error, if this error came from a rule callback.
    pub fn rule_error(&self) -> Option<&RuleError> {
        match self {
            DigestError::Rule { source, .. } => Some(source),
            _ => None,
        }
    }
}
