//! colprune - column pruning for relational logical plans
//!
//! Features:
//! - Logical plan model with a builder that allocates plan and column ids
//! - Column pruning rule with per-operator handlers
//! - Optimizer trace recording every pruning step

pub mod catalog;
pub mod expression;
pub mod planner;
