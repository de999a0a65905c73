//! Join and Apply pruning

use tracing::debug;

use crate::expression::{extract_columns, Column};
use crate::planner::context::{PlanContext, FIX_45822};
use crate::planner::error::PlannerResult;
use crate::planner::logical::{
    extract_cor_columns_by_schema, JoinType, LogicalApply, LogicalJoin, LogicalPlan,
};
use crate::planner::optimizer::LogicalOptimizeOp;

use super::prune_child;
use super::util::inline_projection;

impl LogicalJoin {
    /// Split demand plus predicate columns by the input that produces them
    fn extract_used_cols(&self, parent_used: &[Column]) -> (Vec<Column>, Vec<Column>) {
        let mut used = parent_used.to_vec();
        for cond in self.conditions() {
            used.extend(extract_columns(cond));
        }

        let mut left_cols = Vec::new();
        let mut right_cols = Vec::new();
        for col in used {
            if self.left.schema().contains(&col) {
                left_cols.push(col);
            } else if self.right.schema().contains(&col) {
                right_cols.push(col);
            } else if !self.schema.contains(&col) {
                debug!(
                    plan_id = self.base.id,
                    column = %col,
                    "demanded column is produced by neither join input"
                );
            }
        }
        (left_cols, right_cols)
    }

    pub(super) fn prune_columns(
        mut self,
        mut parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let (left_cols, right_cols) = self.extract_used_cols(&parent_used);

        self.left = prune_child(self.left, left_cols, ctx, opt)?;
        self.right = prune_child(self.right, right_cols, ctx, opt)?;

        self.merge_schema();
        if self.join_type.is_left_outer_semi() {
            if let Some(match_col) = self.schema.columns.last() {
                parent_used.push(match_col.clone());
            }
        }
        inline_projection(
            "Join",
            self.base.id,
            &mut self.schema,
            &mut self.output_names,
            &parent_used,
            opt,
        );
        Ok(LogicalPlan::Join(self))
    }
}

impl LogicalApply {
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let (mut left_cols, right_cols) = self.join.extract_used_cols(&parent_used);

        let allow_eliminate = ctx.session_vars().fix_control_bool(FIX_45822, true);
        if allow_eliminate && right_cols.is_empty() && self.join.join_type == JoinType::LeftOuter {
            opt.apply_eliminate_step(self.join.right.tp(), self.join.right.id());
            debug!(
                plan_id = self.join.base.id,
                "left outer apply with unused inner side eliminated"
            );
            return (*self.join.left).prune_columns(parent_used, ctx, opt);
        }

        self.join.right = prune_child(self.join.right, right_cols, ctx, opt)?;

        self.cor_cols = extract_cor_columns_by_schema(&self.join.right, self.join.left.schema());
        left_cols.extend(self.cor_cols.iter().map(|c| c.column.clone()));

        self.join.left = prune_child(self.join.left, left_cols, ctx, opt)?;
        self.join.merge_schema();
        Ok(LogicalPlan::Apply(self))
    }
}
