//! Expression error types

use thiserror::Error;

/// Errors raised while building or inspecting expressions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Unknown aggregate function
    #[error("Unknown aggregate function: {0}")]
    UnknownAggregate(String),

    /// Unknown window function
    #[error("Unknown window function: {0}")]
    UnknownWindowFunction(String),

    /// Wrong number of arguments
    #[error("Function {func} expects {expected} argument(s), got {got}")]
    ArgumentCount {
        func: String,
        expected: usize,
        got: usize,
    },
}

/// Result type for expression operations
pub type ExprResult<T> = Result<T, ExprError>;
