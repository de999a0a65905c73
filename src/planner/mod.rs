//! Query planner
//!
//! Logical plans and the rules that rewrite them.
//!
//! ## Pipeline
//!
//! ```text
//! LogicalPlanBuilder → LogicalPlan
//!   → Optimizer::optimize() → LogicalPlan (columns pruned)
//!   → ExplainOutput::format() → text
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use colprune::planner::{LogicalOptimizeOp, LogicalPlanBuilder, Optimizer, PlanContext};
//!
//! let mut ctx = PlanContext::new(SessionVars::new());
//! let plan = LogicalPlanBuilder::scan(&mut ctx, "test", table).build();
//! let mut trace = LogicalOptimizeOp::enabled();
//! let pruned = Optimizer::new().optimize(plan, &mut ctx, &mut trace)?;
//! ```

pub mod context;
pub mod error;
pub mod explain;
pub mod logical;
pub mod optimizer;

#[cfg(test)]
pub(crate) mod test_utils;

pub use context::{PlanContext, SessionVars, FIX_45822};
pub use error::{PlannerError, PlannerResult};
pub use explain::ExplainOutput;
pub use logical::{LogicalPlan, LogicalPlanBuilder};
pub use optimizer::{ColumnPruner, LogicalOptRule, LogicalOptimizeOp, Optimizer};
