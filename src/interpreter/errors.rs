//! Evaluation error types for the pattern evaluator
//!
//! This module defines [`EvalError`], the single fault channel of the evaluator.
//! Every variant aborts the whole run: the error unwinds through every
//! evaluation call via `?` and the partially built pattern data is discarded.
//!
//! The messages carry no line number; hosts read it through [`EvalError::location`].

use crate::parser::ast::SourceLocation;
use thiserror::Error;

/// Faults that abort an evaluation run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Explicit abort raised by a builtin or by the engine
    #[error("{message}")]
    Aborted { message: String, location: SourceLocation },

    /// Function call or type nesting deeper than the configured limit
    #[error("recursion limit exceeded (limit is {limit})")]
    RecursionLimit { limit: u32, location: SourceLocation },

    /// Call with the wrong number of arguments
    #[error("wrong argument count for function '{function}': expected {expected}, got {got}")]
    ArgumentCount {
        function: String,
        expected: String,
        got: usize,
        location: SourceLocation,
    },

    /// Builtin called with an argument of the wrong literal kind
    #[error("invalid argument {index} for function '{function}': expected {expected}, got {got}")]
    ArgumentKind {
        function: String,
        index: usize,
        expected: &'static str,
        got: &'static str,
        location: SourceLocation,
    },

    #[error("undefined function '{name}'")]
    UndefinedFunction { name: String, location: SourceLocation },

    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String, location: SourceLocation },

    #[error("undefined type '{name}'")]
    UndefinedType { name: String, location: SourceLocation },

    /// Operand or value of the wrong kind
    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: String,
        got: String,
        location: SourceLocation,
    },

    #[error("division by zero")]
    DivisionByZero { location: SourceLocation },

    /// Read past the end of the data source
    #[error("read of {size} bytes at address 0x{address:x} is out of range")]
    ReadOutOfRange {
        address: u64,
        size: u64,
        location: SourceLocation,
    },

    #[error("data source is not available")]
    SourceUnavailable { location: SourceLocation },
}

impl EvalError {
    pub fn aborted(message: impl Into<String>, location: SourceLocation) -> Self {
        EvalError::Aborted {
            message: message.into(),
            location,
        }
    }

    pub fn type_error(expected: impl Into<String>, got: impl Into<String>, location: SourceLocation) -> Self {
        EvalError::TypeError {
            expected: expected.into(),
            got: got.into(),
            location,
        }
    }

    /// Source location of the construct that raised the fault
    pub fn location(&self) -> SourceLocation {
        match self {
            EvalError::Aborted { location, .. }
            | EvalError::RecursionLimit { location, .. }
            | EvalError::ArgumentCount { location, .. }
            | EvalError::ArgumentKind { location, .. }
            | EvalError::UndefinedFunction { location, .. }
            | EvalError::UndefinedVariable { location, .. }
            | EvalError::UndefinedType { location, .. }
            | EvalError::TypeError { location, .. }
            | EvalError::DivisionByZero { location }
            | EvalError::ReadOutOfRange { location, .. }
            | EvalError::SourceUnavailable { location } => *location,
        }
    }

    /// Fill in the location of an error raised without one, e.g. by a builtin
    pub(crate) fn or_at(mut self, at: SourceLocation) -> Self {
        let location = match &mut self {
            EvalError::Aborted { location, .. }
            | EvalError::RecursionLimit { location, .. }
            | EvalError::ArgumentCount { location, .. }
            | EvalError::ArgumentKind { location, .. }
            | EvalError::UndefinedFunction { location, .. }
            | EvalError::UndefinedVariable { location, .. }
            | EvalError::UndefinedType { location, .. }
            | EvalError::TypeError { location, .. }
            | EvalError::DivisionByZero { location }
            | EvalError::ReadOutOfRange { location, .. }
            | EvalError::SourceUnavailable { location } => location,
        };
        if location.line == 0 {
            *location = at;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let loc = SourceLocation::new(3, 1);
        assert_eq!(
            EvalError::RecursionLimit { limit: 32, location: loc }.to_string(),
            "recursion limit exceeded (limit is 32)"
        );
        assert_eq!(EvalError::aborted("failed to find sequence", loc).to_string(), "failed to find sequence");
    }

    #[test]
    fn test_missing_location_is_filled() {
        let err = EvalError::aborted("address out of range", SourceLocation::default());
        assert_eq!(err.or_at(SourceLocation::new(7, 2)).location().line, 7);

        let err = EvalError::DivisionByZero {
            location: SourceLocation::new(1, 1),
        };
        assert_eq!(err.or_at(SourceLocation::new(7, 2)).location().line, 1);
    }
}
