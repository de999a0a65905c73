//! Planner error types

use thiserror::Error;

use crate::expression::ExprError;

/// Planner error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    /// Plan tree has an unexpected shape
    #[error("Invalid plan: {0}")]
    Schema(String),

    /// Error from the expression layer
    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),

    /// Session or planner context is unusable
    #[error("Planner context error: {0}")]
    Context(String),
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
