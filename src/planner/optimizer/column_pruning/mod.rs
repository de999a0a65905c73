//! Column pruning
//!
//! Rewrites a logical plan so every operator produces only the columns its
//! parent consumes. Demand flows top-down: each handler adds the columns it
//! reads itself (predicates, keys, arguments) to what its parent asked for,
//! prunes its children with that, and then trims its own schema.
//!
//! Handlers take the node by value and return its replacement, which is
//! usually the same node but may be a projection on top of it or, for an
//! eliminated Apply, its outer child.

mod datasource;
mod expand;
mod join;
mod operators;
mod util;

use tracing::trace;

use crate::expression::Column;
use crate::planner::context::PlanContext;
use crate::planner::error::PlannerResult;
use crate::planner::logical::LogicalPlan;

use super::{LogicalOptRule, LogicalOptimizeOp};

use self::util::add_const_one_for_empty_projection;

/// Removes columns no ancestor consumes
#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnPruner;

impl LogicalOptRule for ColumnPruner {
    fn name(&self) -> &'static str {
        "column_prune"
    }

    fn optimize(
        &self,
        plan: LogicalPlan,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<(LogicalPlan, bool)> {
        let demand = plan.schema().columns.clone();
        let plan = plan.prune_columns(demand, ctx, opt)?;
        // schemas only shrink; nothing for other rules to revisit
        Ok((plan, false))
    }
}

impl LogicalPlan {
    /// Prune this subtree so it produces `parent_used` and what it needs itself
    pub fn prune_columns(
        self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        trace!(
            plan = %format!("{}_{}", self.tp(), self.id()),
            demand = parent_used.len(),
            "pruning columns"
        );
        match self {
            LogicalPlan::DataSource(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Join(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Apply(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Expand(p) => p.prune_columns(parent_used, ctx, opt),
            // CTE bodies are optimized on their own
            LogicalPlan::Cte(_) | LogicalPlan::CteTable(_) => Ok(self),
            LogicalPlan::Sequence(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Projection(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Aggregation(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Selection(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Sort(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::TopN(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Limit(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Window(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::Union(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::MaxOneRow(p) => p.prune_columns(parent_used, ctx, opt),
            LogicalPlan::TableDual(p) => p.prune_columns(parent_used, opt),
        }
    }
}

/// Prune a child and keep it from collapsing into an empty projection
fn prune_and_patch(
    plan: LogicalPlan,
    used: Vec<Column>,
    ctx: &mut PlanContext,
    opt: &mut LogicalOptimizeOp,
) -> PlannerResult<LogicalPlan> {
    let mut plan = plan.prune_columns(used, ctx, opt)?;
    add_const_one_for_empty_projection(&mut plan, ctx);
    Ok(plan)
}

fn prune_child(
    child: Box<LogicalPlan>,
    used: Vec<Column>,
    ctx: &mut PlanContext,
    opt: &mut LogicalOptimizeOp,
) -> PlannerResult<Box<LogicalPlan>> {
    prune_and_patch(*child, used, ctx, opt).map(Box::new)
}
