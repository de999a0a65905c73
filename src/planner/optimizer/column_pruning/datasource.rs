//! Table scan pruning

use tracing::debug;

use crate::expression::{
    column_to_exprs, extract_columns_from_expressions, gc_column_expr_is_tidb_shard,
    get_used_list, Column, Schema,
};
use crate::planner::context::PlanContext;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::{DataSource, LogicalPlan, LogicalProjection, PlanBase};
use crate::planner::optimizer::LogicalOptimizeOp;

use super::util::prefer_key_column_from_table;

impl DataSource {
    /// Keep demanded and filtered columns, and always at least one column
    pub(super) fn prune_columns(
        mut self,
        parent_used: Vec<Column>,
        ctx: &mut PlanContext,
        opt: &mut LogicalOptimizeOp,
    ) -> PlannerResult<LogicalPlan> {
        if self.schema.len() != self.columns.len() {
            return Err(PlannerError::Schema(format!(
                "DataSource_{} has {} schema columns but {} column infos",
                self.base.id,
                self.schema.len(),
                self.columns.len()
            )));
        }

        let used = get_used_list(&parent_used, &self.schema);
        let expr_cols = extract_columns_from_expressions(Vec::new(), &self.all_conds, None);
        let expr_used = get_used_list(&expr_cols, &self.schema);

        let origin_schema_cols = self.schema.columns.clone();
        let origin_columns = self.columns.clone();

        let shard_kept = |col: &Column| {
            self.contains_expr_prefix_uk && gc_column_expr_is_tidb_shard(col.virtual_expr.as_deref())
        };
        let cols_requiring_full_len: Vec<Column> = self
            .schema
            .columns
            .iter()
            .zip(&used)
            .filter(|(col, used)| **used || shard_kept(col))
            .map(|(col, _)| col.clone())
            .collect();
        let keep: Vec<bool> = self
            .schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| used[i] || expr_used[i] || shard_kept(col))
            .collect();
        self.cols_requiring_full_len = cols_requiring_full_len;

        let mut pruned = Vec::new();
        for i in (0..keep.len()).rev() {
            if !keep[i] {
                pruned.push(self.schema.columns.remove(i));
                self.columns.remove(i);
                if i < self.output_names.len() {
                    self.output_names.remove(i);
                }
            }
        }
        opt.append_column_prune_step("DataSource", self.base.id, &pruned);

        let mut added_one_handle = false;
        if self.schema.is_empty() {
            let (col, info) =
                prefer_key_column_from_table(&self, &origin_schema_cols, &origin_columns, ctx)?;
            self.output_names.push(info.name.clone());
            self.columns.push(info);
            self.schema.append(col);
            added_one_handle = true;
        }

        // An integer handle kept alive for an aggregate that is gone now; let
        // the next run choose again.
        let handle_gone = matches!(
            &self.handle_cols,
            Some(h) if h.is_int() && h.get_col(0).map_or(true, |c| !self.schema.contains(c))
        );
        if handle_gone {
            self.handle_cols = None;
        }

        let needs_mpp_projection = !added_one_handle
            && self.schema.len() > parent_used.len()
            && ctx.session_vars().is_mpp_enforced()
            && self.table_info.tiflash_replica.is_some();
        if needs_mpp_projection {
            let base = PlanBase {
                id: ctx.alloc_plan_id(),
                query_block_offset: self.base.query_block_offset,
                stats: self.base.stats.clone(),
            };
            debug!(
                plan_id = base.id,
                data_source = self.base.id,
                "projection over DataSource for MPP"
            );
            let output_names = parent_used
                .iter()
                .map(|c| {
                    self.schema
                        .column_index(c)
                        .and_then(|i| self.output_names.get(i))
                        .cloned()
                        .unwrap_or_else(|| c.to_string())
                })
                .collect();
            return Ok(LogicalPlan::Projection(LogicalProjection {
                base,
                exprs: column_to_exprs(&parent_used),
                schema: Schema::new(parent_used),
                output_names,
                input: Box::new(LogicalPlan::DataSource(self)),
            }));
        }
        Ok(LogicalPlan::DataSource(self))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::catalog::{ColumnInfo, FieldType, SqlType, TableInfo, TableType, EXTRA_HANDLE_ID};
    use crate::expression::Expr;
    use crate::planner::context::SessionVars;
    use crate::planner::logical::{HandleCols, LogicalPlanBuilder};
    use crate::planner::test_utils::{table_pk, table_t};

    use super::*;

    fn prune(plan: LogicalPlan, used: Vec<Column>, ctx: &mut PlanContext) -> LogicalPlan {
        let mut opt = LogicalOptimizeOp::enabled();
        plan.prune_columns(used, ctx, &mut opt).unwrap()
    }

    fn data_source(plan: &LogicalPlan) -> &DataSource {
        match plan {
            LogicalPlan::DataSource(ds) => ds,
            other => panic!("Expected DataSource, got {}", other.tp()),
        }
    }

    #[test]
    fn test_keeps_demanded_and_filtered_columns() {
        let mut ctx = PlanContext::new(SessionVars::new());
        let scan = LogicalPlanBuilder::scan(&mut ctx, "test", table_t()).build();
        let cols = scan.schema().columns.clone();
        let scan = LogicalPlanBuilder::from_plan(&mut ctx, scan)
            .push_conds(vec![Expr::gt(Expr::col(&cols[2]), Expr::int(0))])
            .unwrap()
            .build();

        let plan = prune(scan, vec![cols[0].clone()], &mut ctx);
        let ds = data_source(&plan);
        assert_eq!(ds.schema.columns, vec![cols[0].clone(), cols[2].clone()]);
        assert_eq!(ds.columns.len(), 2);
        assert_eq!(ds.output_names, vec!["a", "c"]);
        assert_eq!(ds.cols_requiring_full_len, vec![cols[0].clone()]);
    }

    #[test]
    fn test_empty_demand_synthesizes_handle() {
        let mut ctx = PlanContext::new(SessionVars::new());
        let scan = LogicalPlanBuilder::scan(&mut ctx, "test", table_t()).build();
        let plan = prune(scan, vec![], &mut ctx);
        let ds = data_source(&plan);
        assert_eq!(ds.schema.len(), 1);
        assert_eq!(ds.schema.columns[0].id, EXTRA_HANDLE_ID);
        assert_eq!(ds.columns[0].id, EXTRA_HANDLE_ID);
        // the builder's row id handle is still the chosen one
        assert!(ds.handle_cols.is_some());
    }

    #[test]
    fn test_empty_demand_prefers_int_pk() {
        let mut ctx = PlanContext::new(SessionVars::new());
        let scan = LogicalPlanBuilder::scan(&mut ctx, "test", table_pk()).build();
        let id_col = scan.schema().columns[0].clone();
        let plan = prune(scan, vec![], &mut ctx);
        let ds = data_source(&plan);
        assert_eq!(ds.schema.columns, vec![id_col.clone()]);
        assert_eq!(ds.handle_cols, Some(HandleCols::Int(id_col)));
    }

    #[test]
    fn test_handle_reset_and_rechoose() {
        let mut ctx = PlanContext::new(SessionVars::new());
        let scan = LogicalPlanBuilder::scan(&mut ctx, "test", table_pk()).build();
        let id_col = scan.schema().columns[0].clone();
        let v = scan.schema().columns[1].clone();

        let plan = prune(scan, vec![v.clone()], &mut ctx);
        assert_eq!(data_source(&plan).handle_cols, None);

        // second run with nothing demanded falls back to the immutable handle
        let plan = prune(plan, vec![], &mut ctx);
        let ds = data_source(&plan);
        assert_eq!(ds.schema.columns, vec![id_col.clone()]);
        assert_eq!(ds.columns[0].name, "id");
        assert_eq!(ds.unmutable_handle_cols, Some(HandleCols::Int(id_col)));
    }

    #[test]
    fn test_cluster_table_prefers_first_column() {
        let table = Arc::new(
            TableInfo::new(7, "cluster_info")
                .column(ColumnInfo::new("type", FieldType::varchar(64)))
                .column(ColumnInfo::new("instance", FieldType::varchar(64)))
                .table_type(TableType::Cluster),
        );
        let mut ctx = PlanContext::new(SessionVars::new());
        let scan = LogicalPlanBuilder::scan(&mut ctx, "information_schema", table).build();
        let first = scan.schema().columns[0].clone();
        let plan = prune(scan, vec![], &mut ctx);
        let ds = data_source(&plan);
        assert_eq!(ds.schema.columns, vec![first]);
        assert_eq!(ds.columns[0].name, "type");
    }

    #[test]
    fn test_shard_column_retained() {
        let table = Arc::new(
            TableInfo::new(8, "sharded")
                .column(ColumnInfo::new("a", FieldType::new(SqlType::Int)))
                .column(
                    ColumnInfo::new("sh", FieldType::new(SqlType::Int))
                        .generated("tidb_shard", &["a"]),
                )
                .column(ColumnInfo::new("b", FieldType::new(SqlType::Int))),
        );
        let mut ctx = PlanContext::new(SessionVars::new());
        let scan = LogicalPlanBuilder::scan(&mut ctx, "test", table)
            .with_expr_prefix_uk()
            .unwrap()
            .build();
        let cols = scan.schema().columns.clone();
        let plan = prune(scan, vec![cols[2].clone()], &mut ctx);
        let ds = data_source(&plan);
        assert_eq!(ds.schema.columns, vec![cols[1].clone(), cols[2].clone()]);
        assert_eq!(ds.cols_requiring_full_len, vec![cols[1].clone(), cols[2].clone()]);
    }

    #[test]
    fn test_mpp_projection_over_scan() {
        let table = Arc::new(
            TableInfo::new(1, "t")
                .column(ColumnInfo::new("a", FieldType::new(SqlType::Int)))
                .column(ColumnInfo::new("b", FieldType::new(SqlType::Int)))
                .tiflash_replica(1),
        );
        let mut ctx = PlanContext::new(SessionVars::new().with_enforce_mpp(true));
        let scan = LogicalPlanBuilder::scan(&mut ctx, "test", table)
            .with_stats(100.0)
            .build();
        let cols = scan.schema().columns.clone();
        let scan = LogicalPlanBuilder::from_plan(&mut ctx, scan)
            .push_conds(vec![Expr::gt(Expr::col(&cols[1]), Expr::int(0))])
            .unwrap()
            .build();

        let plan = prune(scan, vec![cols[0].clone()], &mut ctx);
        let LogicalPlan::Projection(proj) = &plan else {
            panic!("Expected Projection, got {}", plan.tp());
        };
        assert_eq!(proj.schema.columns, vec![cols[0].clone()]);
        assert_eq!(proj.exprs, vec![Expr::col(&cols[0])]);
        assert_eq!(proj.output_names, vec!["a"]);
        assert_eq!(proj.base.stats.as_ref().map(|s| s.row_count), Some(100.0));
        assert_eq!(proj.input.schema().len(), 2);
    }

    #[test]
    fn test_misaligned_columns_error() {
        let mut ctx = PlanContext::new(SessionVars::new());
        let mut scan = LogicalPlanBuilder::scan(&mut ctx, "test", table_t()).build();
        if let LogicalPlan::DataSource(ds) = &mut scan {
            ds.columns.pop();
        }
        let mut opt = LogicalOptimizeOp::disabled();
        let err = scan.prune_columns(vec![], &mut ctx, &mut opt).unwrap_err();
        assert!(matches!(err, PlannerError::Schema(_)));
    }
}
