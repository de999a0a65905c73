//! Logical plan builder
//!
//! Assembles logical plans bottom-up. Every node gets a fresh plan id and
//! every column a node introduces gets a fresh unique id from the context.
//! Operators that only forward columns (bare column projections, filters,
//! sorts, limits) reuse their input's columns.

use std::sync::Arc;

use crate::catalog::{FieldType, SqlType, TableInfo};
use crate::expression::{extract_columns, Column, Expr, Schema};
use crate::planner::context::PlanContext;
use crate::planner::error::{PlannerError, PlannerResult};

use super::{
    extract_cor_columns_by_schema, new_extra_handle_column, AggFuncDesc, ByItem, DataSource,
    HandleCols, JoinType, LogicalAggregation, LogicalApply, LogicalCte, LogicalCteTable,
    LogicalExpand, LogicalJoin, LogicalLimit, LogicalMaxOneRow, LogicalPlan, LogicalProjection,
    LogicalSelection, LogicalSequence, LogicalSort, LogicalTableDual, LogicalTopN,
    LogicalUnionAll, LogicalWindow, PlanBase, PropertyItem, StatsInfo, WindowFuncDesc,
};

/// Builder for logical query plans
pub struct LogicalPlanBuilder<'a> {
    ctx: &'a mut PlanContext,
    plan: LogicalPlan,
}

impl<'a> LogicalPlanBuilder<'a> {
    /// Continue building on top of an existing plan
    pub fn from_plan(ctx: &'a mut PlanContext, plan: LogicalPlan) -> Self {
        Self { ctx, plan }
    }

    /// Scan every column of a table
    pub fn scan(ctx: &'a mut PlanContext, db_name: &str, table: Arc<TableInfo>) -> Self {
        let base = PlanBase::new(ctx, 0);

        let mut columns: Vec<Column> = table
            .columns
            .iter()
            .map(|info| {
                Column::new(ctx.alloc_plan_column_id(), info.field_type.clone())
                    .with_id(info.id)
                    .with_orig_name(format!("{}.{}.{}", db_name, table.name, info.name))
            })
            .collect();

        for (i, info) in table.columns.iter().enumerate() {
            if let Some(generated) = &info.generated {
                let args: Vec<Expr> = generated
                    .args
                    .iter()
                    .filter_map(|name| table.get_column(name))
                    .map(|arg| Expr::col(&columns[arg.offset]))
                    .collect();
                columns[i].virtual_expr = Some(Box::new(Expr::func(
                    generated.func.clone(),
                    args,
                    info.field_type.clone(),
                )));
            }
        }

        let handle_cols = if let Some(pk) = table.pk_handle_column() {
            HandleCols::Int(columns[pk.offset].clone())
        } else if table.is_common_handle {
            HandleCols::Common(
                table
                    .common_handle_columns
                    .iter()
                    .filter_map(|name| table.get_column(name))
                    .map(|info| columns[info.offset].clone())
                    .collect(),
            )
        } else {
            HandleCols::Int(new_extra_handle_column(ctx, db_name, &table.name))
        };

        let output_names = table.columns.iter().map(|c| c.name.clone()).collect();
        let plan = LogicalPlan::DataSource(DataSource {
            base,
            db_name: db_name.to_string(),
            all_conds: Vec::new(),
            columns: table.columns.clone(),
            schema: Schema::new(columns),
            output_names,
            handle_cols: Some(handle_cols.clone()),
            unmutable_handle_cols: Some(handle_cols),
            contains_expr_prefix_uk: false,
            cols_requiring_full_len: Vec::new(),
            table_info: table,
        });
        Self { ctx, plan }
    }

    /// Attach table filters to the data source being built
    pub fn push_conds(mut self, conds: Vec<Expr>) -> PlannerResult<Self> {
        match &mut self.plan {
            LogicalPlan::DataSource(ds) => {
                ds.all_conds.extend(conds);
                Ok(self)
            }
            other => Err(PlannerError::Schema(format!(
                "table filters can only be attached to a DataSource, not {}",
                other.tp()
            ))),
        }
    }

    /// Mark the data source as having a `tidb_shard()` prefixed unique index
    pub fn with_expr_prefix_uk(mut self) -> PlannerResult<Self> {
        match &mut self.plan {
            LogicalPlan::DataSource(ds) => {
                ds.contains_expr_prefix_uk = true;
                Ok(self)
            }
            other => Err(PlannerError::Schema(format!(
                "expression prefix index on {}",
                other.tp()
            ))),
        }
    }

    /// Set the row count estimate of the current node
    pub fn with_stats(mut self, row_count: f64) -> Self {
        self.plan.base_mut().stats = Some(StatsInfo { row_count });
        self
    }

    /// Filter rows
    pub fn select(mut self, conditions: Vec<Expr>) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        self.plan = LogicalPlan::Selection(LogicalSelection {
            base,
            input: Box::new(self.plan),
            conditions,
        });
        self
    }

    /// Compute expressions; bare columns keep their identity
    pub fn project(mut self, exprs: Vec<Expr>) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        let mut columns = Vec::with_capacity(exprs.len());
        let mut names = Vec::with_capacity(exprs.len());
        for expr in &exprs {
            match expr {
                Expr::Column(col) => {
                    let name = self
                        .plan
                        .schema()
                        .column_index(col)
                        .and_then(|i| self.plan.output_names().get(i))
                        .cloned()
                        .unwrap_or_else(|| col.to_string());
                    columns.push(col.clone());
                    names.push(name);
                }
                other => {
                    columns.push(Column::new(
                        self.ctx.alloc_plan_column_id(),
                        other.ret_type().clone(),
                    ));
                    names.push(other.to_string());
                }
            }
        }
        self.plan = LogicalPlan::Projection(LogicalProjection {
            base,
            input: Box::new(self.plan),
            exprs,
            schema: Schema::new(columns),
            output_names: names,
        });
        self
    }

    /// Aggregate; one output column per function
    pub fn aggregate(mut self, group_by_items: Vec<Expr>, agg_funcs: Vec<AggFuncDesc>) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        let columns = agg_funcs
            .iter()
            .map(|f| Column::new(self.ctx.alloc_plan_column_id(), f.ret_type.clone()))
            .collect();
        let output_names = agg_funcs.iter().map(|f| f.to_string()).collect();
        self.plan = LogicalPlan::Aggregation(LogicalAggregation {
            base,
            input: Box::new(self.plan),
            agg_funcs,
            group_by_items,
            schema: Schema::new(columns),
            output_names,
        });
        self
    }

    /// Sort rows
    pub fn sort(mut self, by_items: Vec<ByItem>) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        self.plan = LogicalPlan::Sort(LogicalSort {
            base,
            input: Box::new(self.plan),
            by_items,
        });
        self
    }

    /// Sort and keep `count` rows after `offset`
    pub fn top_n(mut self, by_items: Vec<ByItem>, offset: u64, count: u64) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        self.plan = LogicalPlan::TopN(LogicalTopN {
            base,
            input: Box::new(self.plan),
            by_items,
            offset,
            count,
        });
        self
    }

    /// Keep `count` rows after `offset`
    pub fn limit(mut self, offset: u64, count: u64) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        let schema = self.plan.schema().clone();
        let output_names = self.plan.output_names().to_vec();
        self.plan = LogicalPlan::Limit(LogicalLimit {
            base,
            input: Box::new(self.plan),
            offset,
            count,
            schema,
            output_names,
        });
        self
    }

    /// Window functions over the input; results are appended to its columns
    pub fn window(
        mut self,
        window_funcs: Vec<WindowFuncDesc>,
        partition_by: Vec<PropertyItem>,
        order_by: Vec<PropertyItem>,
    ) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        let mut schema = self.plan.schema().clone();
        let mut output_names = self.plan.output_names().to_vec();
        for func in &window_funcs {
            schema.append(Column::new(
                self.ctx.alloc_plan_column_id(),
                func.ret_type.clone(),
            ));
            output_names.push(func.name.clone());
        }
        self.plan = LogicalPlan::Window(LogicalWindow {
            base,
            input: Box::new(self.plan),
            window_funcs,
            partition_by,
            order_by,
            schema,
            output_names,
        });
        self
    }

    /// Join with `right`; `other_conds` are classified by the side they read
    pub fn join(
        self,
        right: LogicalPlan,
        join_type: JoinType,
        eq_conds: Vec<Expr>,
        other_conds: Vec<Expr>,
    ) -> Self {
        let Self { ctx, plan } = self;
        let join = new_join(ctx, plan, right, join_type, eq_conds, other_conds);
        Self {
            ctx,
            plan: LogicalPlan::Join(join),
        }
    }

    /// Correlated join; `right` may reference columns of the current plan
    pub fn apply(self, right: LogicalPlan, join_type: JoinType, conds: Vec<Expr>) -> Self {
        let Self { ctx, plan } = self;
        let cor_cols = extract_cor_columns_by_schema(&right, plan.schema());
        let join = new_join(ctx, plan, right, join_type, Vec::new(), conds);
        Self {
            ctx,
            plan: LogicalPlan::Apply(LogicalApply { join, cor_cols }),
        }
    }

    /// Replicate rows for grouping sets, adding a grouping id column
    pub fn expand(mut self, distinct_group_by_cols: Vec<Column>) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        let mut schema = self.plan.schema().clone();
        let mut output_names = self.plan.output_names().to_vec();
        schema.append(Column::new(
            self.ctx.alloc_plan_column_id(),
            FieldType::new(SqlType::BigInt).not_null(),
        ));
        output_names.push("gid".to_string());
        self.plan = LogicalPlan::Expand(LogicalExpand {
            base,
            input: Box::new(self.plan),
            schema,
            output_names,
            distinct_group_by_cols,
        });
        self
    }

    /// Assert at most one row
    pub fn max_one_row(mut self) -> Self {
        let base = PlanBase::new(self.ctx, 0);
        self.plan = LogicalPlan::MaxOneRow(LogicalMaxOneRow {
            base,
            input: Box::new(self.plan),
        });
        self
    }

    /// UNION ALL of `children`; each child is wrapped in a projection onto the union's columns
    pub fn union_all(ctx: &'a mut PlanContext, children: Vec<LogicalPlan>) -> PlannerResult<Self> {
        let first = children
            .first()
            .ok_or_else(|| PlannerError::Schema("UNION ALL without inputs".to_string()))?;
        let width = first.schema().len();
        if let Some(bad) = children.iter().find(|c| c.schema().len() != width) {
            return Err(PlannerError::Schema(format!(
                "UNION ALL input {}_{} has {} columns, expected {}",
                bad.tp(),
                bad.id(),
                bad.schema().len(),
                width
            )));
        }
        let output_names = first.output_names().to_vec();
        let union_cols: Vec<Column> = first
            .schema()
            .columns
            .iter()
            .map(|c| Column::new(ctx.alloc_plan_column_id(), c.ret_type.clone()))
            .collect();
        let schema = Schema::new(union_cols);

        let base = PlanBase::new(ctx, 0);
        let mut projected = Vec::with_capacity(children.len());
        for child in children {
            let exprs = child.schema().columns.iter().map(Expr::col).collect();
            projected.push(LogicalPlan::Projection(LogicalProjection {
                base: PlanBase::new(ctx, 0),
                input: Box::new(child),
                exprs,
                schema: schema.clone(),
                output_names: output_names.clone(),
            }));
        }
        let plan = LogicalPlan::Union(LogicalUnionAll {
            base,
            children: projected,
            schema,
            output_names,
        });
        Ok(Self { ctx, plan })
    }

    /// Evaluate `children` in order, exposing the last one
    pub fn sequence(ctx: &'a mut PlanContext, children: Vec<LogicalPlan>) -> PlannerResult<Self> {
        if children.is_empty() {
            return Err(PlannerError::Schema("Sequence without children".to_string()));
        }
        let plan = LogicalPlan::Sequence(LogicalSequence {
            base: PlanBase::new(ctx, 0),
            children,
        });
        Ok(Self { ctx, plan })
    }

    /// Reference to a common table expression
    pub fn cte(ctx: &'a mut PlanContext, name: &str, cols: &[(&str, FieldType)]) -> Self {
        let base = PlanBase::new(ctx, 0);
        let (schema, output_names) = new_columns(ctx, cols);
        let plan = LogicalPlan::Cte(LogicalCte {
            base,
            cte_name: name.to_string(),
            schema,
            output_names,
        });
        Self { ctx, plan }
    }

    /// Recursive self-reference inside a CTE definition
    pub fn cte_table(ctx: &'a mut PlanContext, name: &str, cols: &[(&str, FieldType)]) -> Self {
        let base = PlanBase::new(ctx, 0);
        let (schema, output_names) = new_columns(ctx, cols);
        let plan = LogicalPlan::CteTable(LogicalCteTable {
            base,
            cte_name: name.to_string(),
            schema,
            output_names,
        });
        Self { ctx, plan }
    }

    /// Constant rows without a table
    pub fn table_dual(ctx: &'a mut PlanContext, row_count: u64, cols: &[(&str, FieldType)]) -> Self {
        let base = PlanBase::new(ctx, 0);
        let (schema, output_names) = new_columns(ctx, cols);
        let plan = LogicalPlan::TableDual(LogicalTableDual {
            base,
            row_count,
            schema,
            output_names,
        });
        Self { ctx, plan }
    }

    /// Schema of the plan built so far
    pub fn schema(&self) -> &Schema {
        self.plan.schema()
    }

    /// Finish building
    pub fn build(self) -> LogicalPlan {
        self.plan
    }
}

fn new_join(
    ctx: &mut PlanContext,
    left: LogicalPlan,
    right: LogicalPlan,
    join_type: JoinType,
    eq_conditions: Vec<Expr>,
    conds: Vec<Expr>,
) -> LogicalJoin {
    let base = PlanBase::new(ctx, 0);
    let mut left_conditions = Vec::new();
    let mut right_conditions = Vec::new();
    let mut other_conditions = Vec::new();
    for cond in conds {
        let cols = extract_columns(&cond);
        if cols.is_empty() {
            other_conditions.push(cond);
        } else if cols.iter().all(|c| left.schema().contains(c)) {
            left_conditions.push(cond);
        } else if cols.iter().all(|c| right.schema().contains(c)) {
            right_conditions.push(cond);
        } else {
            other_conditions.push(cond);
        }
    }

    // merge_schema keeps the trailing column as the match flag
    let (schema, output_names) = if join_type.is_left_outer_semi() {
        let aux = Column::new(ctx.alloc_plan_column_id(), FieldType::new(SqlType::Boolean));
        (Schema::new(vec![aux]), vec!["aux".to_string()])
    } else {
        (Schema::default(), Vec::new())
    };

    let mut join = LogicalJoin {
        base,
        join_type,
        left: Box::new(left),
        right: Box::new(right),
        eq_conditions,
        left_conditions,
        right_conditions,
        other_conditions,
        naeq_conditions: Vec::new(),
        schema,
        output_names,
    };
    join.merge_schema();
    join
}

fn new_columns(ctx: &mut PlanContext, cols: &[(&str, FieldType)]) -> (Schema, Vec<String>) {
    let columns = cols
        .iter()
        .map(|(_, tp)| Column::new(ctx.alloc_plan_column_id(), tp.clone()))
        .collect();
    let names = cols.iter().map(|(name, _)| name.to_string()).collect();
    (Schema::new(columns), names)
}
