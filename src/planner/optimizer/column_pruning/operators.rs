//! Pruning for single-schema operators, unions and sequences

use std::iter;

use crate::expression::{
    exprs_have_side_effects, extract_columns, extract_columns_from_expressions, get_used_list,
    Column, Expr,
};
use crate::planner::context::PlanContext;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::{
    AggFuncDesc, LogicalAggregation, LogicalLimit, LogicalMaxOneRow, LogicalPlan,
    LogicalProjection, LogicalSelection, LogicalSequence, LogicalSort, LogicalTableDual,
    LogicalTopN, LogicalUnionAll, LogicalWindow, PlanBase, AGG_FUNC_COUNT, AGG_FUNC_FIRST_ROW,
};
use crate::planner::optimizer::LogicalOptimizeOp;

use super::util::{
    add_const_one_for_empty_projection, inline_projection, prune_by_items, retain_used,
};
use super::{prune_and_patch, prune_child};

impl LogicalProjection {
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        if self.exprs.len() != self.schema.len() {
            return Err(PlannerError::Schema(format!(
                "Projection_{} has {} expressions for {} columns",
                self.base.id,
                self.exprs.len(),
                self.schema.len()
            )));
        }

        let used = get_used_list(&parent_used, &self.schema);
        let mut pruned = Vec::new();
        for i in (0..used.len()).rev() {
            if !used[i] && !exprs_have_side_effects(iter::once(&self.exprs[i])) {
                pruned.push(self.schema.columns.remove(i));
                self.exprs.remove(i);
                if i < self.output_names.len() {
                    self.output_names.remove(i);
                }
            }
        }
        opt.append_column_prune_step("Projection", self.base.id, &pruned);

        let self_used = extract_columns_from_expressions(Vec::new(), &self.exprs, None);
        let mut child = match (*self.input).prune_columns(self_used, ctx, opt)? {
            // the scan's own column projection is redundant below another projection
            LogicalPlan::Projection(proj) if is_mpp_projection_over_scan(&proj, ctx) => *proj.input,
            other => other,
        };
        add_const_one_for_empty_projection(&mut child, ctx);
        self.input = Box::new(child);
        Ok(LogicalPlan::Projection(self))
    }
}

/// Projection that only forwards columns of a TiFlash scan, as a scan adds for MPP
fn is_mpp_projection_over_scan(proj: &LogicalProjection, ctx: &PlanContext) -> bool {
    let LogicalPlan::DataSource(ds) = proj.input.as_ref() else {
        return false;
    };
    ctx.session_vars().is_mpp_enforced()
        && ds.table_info.tiflash_replica.is_some()
        && proj.exprs.len() == proj.schema.len()
        && proj
            .exprs
            .iter()
            .zip(&proj.schema.columns)
            .all(|(expr, col)| matches!(expr, Expr::Column(c) if c == col))
}

impl LogicalSelection {
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let used = extract_columns_from_expressions(parent_used, &self.conditions, None);
        self.input = prune_child(self.input, used, ctx, opt)?;
        Ok(LogicalPlan::Selection(self))
    }
}

impl LogicalAggregation {
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        if self.agg_funcs.len() != self.schema.len() {
            return Err(PlannerError::Schema(format!(
                "Aggregation_{} has {} functions for {} columns",
                self.base.id,
                self.agg_funcs.len(),
                self.schema.len()
            )));
        }
        let id = self.base.id;

        let used = get_used_list(&parent_used, &self.schema);
        let mut pruned_cols = Vec::new();
        let mut pruned_funcs = Vec::new();
        let mut all_first_row = true;
        let mut all_remain_first_row = true;
        for i in (0..used.len()).rev() {
            let is_first_row = self.agg_funcs[i].name == AGG_FUNC_FIRST_ROW;
            if !is_first_row {
                all_first_row = false;
            }
            if !used[i] && !exprs_have_side_effects(&self.agg_funcs[i].args) {
                pruned_cols.push(self.schema.columns.remove(i));
                pruned_funcs.push(self.agg_funcs.remove(i));
                if i < self.output_names.len() {
                    self.output_names.remove(i);
                }
            } else if !is_first_row {
                all_remain_first_row = false;
            }
        }
        opt.append_column_prune_step("Aggregation", id, &pruned_cols);
        opt.append_function_prune_step("Aggregation", id, &pruned_funcs);

        let mut self_used = Vec::new();
        for func in &mut self.agg_funcs {
            self_used = extract_columns_from_expressions(self_used, &func.args, None);
            let (items, cols) =
                prune_by_items("Aggregation", id, std::mem::take(&mut func.order_by_items), opt);
            func.order_by_items = items;
            self_used.extend(cols);
        }

        // An aggregation without functions loses the row count of its groups
        if self.agg_funcs.is_empty() || (!all_first_row && all_remain_first_row) {
            let name = if all_first_row {
                AGG_FUNC_FIRST_ROW
            } else {
                AGG_FUNC_COUNT
            };
            let func = AggFuncDesc::new(name, vec![Expr::new_one()], false)?;
            self.schema
                .append(Column::new(ctx.alloc_plan_column_id(), func.ret_type.clone()));
            self.output_names.push(func.to_string());
            self.agg_funcs.push(func);
        }

        if !self.group_by_items.is_empty() {
            let mut pruned_items = Vec::new();
            for i in (0..self.group_by_items.len()).rev() {
                let cols = extract_columns(&self.group_by_items[i]);
                if cols.is_empty() && !exprs_have_side_effects(iter::once(&self.group_by_items[i])) {
                    pruned_items.push(self.group_by_items.remove(i));
                } else {
                    self_used.extend(cols);
                }
            }
            opt.append_group_by_items_prune_step("Aggregation", id, &pruned_items);
            // GROUP BY 1 differs from no GROUP BY on empty input
            if self.group_by_items.is_empty() {
                self.group_by_items.push(Expr::new_one());
            }
        }

        let child = (*self.input).prune_columns(self_used, ctx, opt)?;
        self.input = Box::new(match child {
            LogicalPlan::Projection(proj) if proj.exprs.is_empty() && proj.schema.is_empty() => {
                *proj.input
            }
            other => other,
        });
        Ok(LogicalPlan::Aggregation(self))
    }
}

impl LogicalSort {
    pub(super) fn prune_columns(
        mut self,
        mut parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let (by_items, cols) = prune_by_items("Sort", self.base.id, self.by_items, opt);
        self.by_items = by_items;
        parent_used.extend(cols);
        self.input = prune_child(self.input, parent_used, ctx, opt)?;
        Ok(LogicalPlan::Sort(self))
    }
}

impl LogicalTopN {
    pub(super) fn prune_columns(
        mut self,
        mut parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let (by_items, cols) = prune_by_items("TopN", self.base.id, self.by_items, opt);
        self.by_items = by_items;
        parent_used.extend(cols);
        self.input = prune_child(self.input, parent_used, ctx, opt)?;
        Ok(LogicalPlan::TopN(self))
    }
}

impl LogicalLimit {
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        // LIMIT under UPDATE/DELETE demands nothing and must keep every column
        if parent_used.is_empty() {
            return Ok(LogicalPlan::Limit(self));
        }
        self.input = prune_child(self.input, parent_used.clone(), ctx, opt)?;
        self.schema = self.input.schema().clone();
        self.output_names = self.input.output_names().to_vec();
        inline_projection(
            "Limit",
            self.base.id,
            &mut self.schema,
            &mut self.output_names,
            &parent_used,
            opt,
        );
        Ok(LogicalPlan::Limit(self))
    }
}

impl LogicalWindow {
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        if self.schema.len() < self.window_funcs.len() {
            return Err(PlannerError::Schema(format!(
                "Window_{} has {} functions but only {} columns",
                self.base.id,
                self.window_funcs.len(),
                self.schema.len()
            )));
        }
        let window_cols = self.window_result_columns().to_vec();
        let first_window_col = self.schema.len() - window_cols.len();
        let window_names = self.output_names.get(first_window_col..).unwrap_or_default().to_vec();

        let mut used: Vec<Column> = parent_used
            .into_iter()
            .filter(|c| !window_cols.contains(c))
            .collect();
        for func in &self.window_funcs {
            for arg in &func.args {
                used.extend(extract_columns(arg));
            }
        }
        used.extend(self.partition_by.iter().map(|p| p.col.clone()));
        used.extend(self.order_by.iter().map(|p| p.col.clone()));

        self.input = prune_child(self.input, used, ctx, opt)?;

        let mut schema = self.input.schema().clone();
        let mut output_names = self.input.output_names().to_vec();
        for col in window_cols {
            schema.append(col);
        }
        output_names.extend(window_names);
        self.schema = schema;
        self.output_names = output_names;
        Ok(LogicalPlan::Window(self))
    }
}

impl LogicalUnionAll {
    pub(super) fn prune_columns(
        mut self,
        mut parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let has_been_used = get_used_list(&parent_used, &self.schema).contains(&true);
        if !has_been_used {
            parent_used = self.schema.columns.clone();
        }

        let children = std::mem::take(&mut self.children);
        for child in children {
            self.children
                .push(prune_and_patch(child, parent_used.clone(), ctx, opt)?);
        }

        if has_been_used {
            // children produce the union's own columns
            if let Some(first) = self.children.first() {
                let used = get_used_list(&first.schema().columns, &self.schema);
                let pruned = retain_used(&mut self.schema, Some(&mut self.output_names), &used);
                opt.append_column_prune_step("Union", self.base.id, &pruned);
            }

            // an aggregation below may have added a column the union does not carry
            let children = std::mem::take(&mut self.children);
            for child in children {
                if child.schema().len() > self.schema.len() {
                    self.children.push(LogicalPlan::Projection(LogicalProjection {
                        base: PlanBase::new(ctx, self.base.query_block_offset),
                        exprs: self.schema.columns.iter().map(Expr::col).collect(),
                        schema: self.schema.clone(),
                        output_names: self.output_names.clone(),
                        input: Box::new(child),
                    }));
                } else {
                    self.children.push(child);
                }
            }
        }
        Ok(LogicalPlan::Union(self))
    }
}

impl LogicalMaxOneRow {
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        self.input = prune_child(self.input, parent_used, ctx, opt)?;
        Ok(LogicalPlan::MaxOneRow(self))
    }
}

impl LogicalTableDual {
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let used = get_used_list(&parent_used, &self.schema);
        let pruned = retain_used(&mut self.schema, Some(&mut self.output_names), &used);
        opt.append_column_prune_step("TableDual", self.base.id, &pruned);
        Ok(LogicalPlan::TableDual(self))
    }
}

impl LogicalSequence {
    /// Only the last child is visible; earlier ones run for their effects
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        let last = self.children.pop().ok_or_else(|| {
            PlannerError::Schema(format!("Sequence_{} has no children", self.base.id))
        })?;
        self.children.push(prune_and_patch(last, parent_used, ctx, opt)?);
        Ok(LogicalPlan::Sequence(self))
    }
}
