//! Helpers shared by the per-operator pruning handlers

use std::collections::HashSet;

use tracing::debug;

use crate::catalog::{ColumnInfo, SqlType};
use crate::expression::{extract_columns, get_used_list, is_runtime_const_expr, Column, Expr, Schema};
use crate::planner::context::PlanContext;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::{new_extra_handle_column, ByItem, DataSource, LogicalPlan};
use crate::planner::optimizer::LogicalOptimizeOp;

/// Drop duplicate, constant and NULL-typed ordering keys
///
/// Returns the kept items and the columns they read.
pub(super) fn prune_by_items(
    tp: &str,
    id: usize,
    old: Vec<ByItem>,
    opt: &mut LogicalOptimizeOp,
) -> (Vec<ByItem>, Vec<Column>) {
    let mut seen = HashSet::with_capacity(old.len());
    let mut kept = Vec::with_capacity(old.len());
    let mut pruned = Vec::new();
    let mut used_cols = Vec::new();

    for item in old {
        let is_new = seen.insert(item.expr.hash_code());
        let cols = extract_columns(&item.expr);
        let keep = if !is_new {
            false
        } else if cols.is_empty() {
            !is_runtime_const_expr(&item.expr)
        } else {
            item.expr.ret_type().sql_type() != SqlType::Null
        };
        if keep {
            used_cols.extend(cols);
            kept.push(item);
        } else {
            pruned.push(item);
        }
    }
    opt.append_by_items_prune_step(tp, id, &pruned);
    (kept, used_cols)
}

/// Give an empty projection a constant `1` column so it survives later rules
pub(super) fn add_const_one_for_empty_projection(plan: &mut LogicalPlan, ctx: &mut PlanContext) {
    let LogicalPlan::Projection(proj) = plan else {
        return;
    };
    if !proj.schema.is_empty() {
        return;
    }
    let one = Expr::new_one();
    proj.schema
        .append(Column::new(ctx.alloc_plan_column_id(), one.ret_type().clone()));
    proj.output_names.push(one.to_string());
    proj.exprs.push(one);
}

/// Restrict a schema to the demanded columns, keeping relative order
///
/// With nothing demanded the narrowest column is kept so the node still
/// produces rows of some shape.
pub(super) fn inline_projection(
    tp: &str,
    id: usize,
    schema: &mut Schema,
    output_names: &mut Vec<String>,
    parent_used: &[Column],
    opt: &mut LogicalOptimizeOp,
) {
    let mut used = get_used_list(parent_used, schema);
    if parent_used.is_empty() {
        let narrowest = schema
            .columns
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.ret_type.flen)
            .map(|(i, _)| i);
        if let Some(i) = narrowest {
            used[i] = true;
        }
    }
    let pruned = retain_used(schema, Some(output_names), &used);
    opt.append_column_prune_step(tp, id, &pruned);
}

/// Remove unused positions from a schema and its names, last to first
///
/// Returns the removed columns in removal order.
pub(super) fn retain_used(
    schema: &mut Schema,
    mut output_names: Option<&mut Vec<String>>,
    used: &[bool],
) -> Vec<Column> {
    let mut pruned = Vec::new();
    for i in (0..used.len()).rev() {
        if used[i] {
            continue;
        }
        pruned.push(schema.columns.remove(i));
        if let Some(names) = output_names.as_deref_mut() {
            if i < names.len() {
                names.remove(i);
            }
        }
    }
    pruned
}

/// Pick the column a data source keeps when nothing else is needed
pub(super) fn prefer_key_column_from_table(
    ds: &DataSource,
    origin_schema_cols: &[Column],
    origin_columns: &[ColumnInfo],
    ctx: &mut PlanContext,
) -> PlannerResult<(Column, ColumnInfo)> {
    if ds.table_info.table_type.is_cluster_table() {
        if let (Some(col), Some(info)) = (origin_schema_cols.first(), origin_columns.first()) {
            return Ok((col.clone(), info.clone()));
        }
    }
    if let Some(col) = ds.handle_cols.as_ref().and_then(|h| h.get_col(0)) {
        return Ok((col.clone(), col.to_info()));
    }
    if ds.table_info.pk_is_handle {
        // handle_cols may have been cleared by an earlier run
        let col = ds
            .unmutable_handle_cols
            .as_ref()
            .and_then(|h| h.get_col(0))
            .ok_or_else(|| {
                PlannerError::Schema(format!(
                    "table {} has an integer handle but DataSource_{} has no immutable handle",
                    ds.table_info.name, ds.base.id
                ))
            })?;
        return Ok((col.clone(), col.to_info()));
    }
    let col = new_extra_handle_column(ctx, &ds.db_name, &ds.table_info.name);
    debug!(
        plan_id = ds.base.id,
        column = col.unique_id,
        "synthesized extra handle column"
    );
    Ok((col, ColumnInfo::new_extra_handle()))
}
