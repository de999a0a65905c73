//! Expand pruning
//!
//! Expand level projections are generated after logical optimization, so
//! only the schema is pruned here.

use crate::expression::{get_used_list, Column};
use crate::planner::context::PlanContext;
use crate::planner::error::PlannerResult;
use crate::planner::logical::{LogicalExpand, LogicalPlan};
use crate::planner::optimizer::LogicalOptimizeOp;

use super::prune_child;
use super::util::retain_used;

impl LogicalExpand {
    pub(super) fn prune_columns(
        mut self,
        mut parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        // the aggregation above groups by these; the input must keep producing them
        parent_used.extend(self.distinct_group_by_cols.iter().cloned());

        let used = get_used_list(&parent_used, &self.schema);
        let pruned = retain_used(&mut self.schema, Some(&mut self.output_names), &used);
        opt.append_column_prune_step("Expand", self.base.id, &pruned);

        self.input = prune_child(self.input, parent_used, ctx, opt)?;
        Ok(LogicalPlan::Expand(self))
    }
}
