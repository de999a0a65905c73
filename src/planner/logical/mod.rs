//! Logical plan representation
//!
//! Logical plans represent the structure of a query before physical
//! implementation details are decided. Every node owns its children, its
//! output schema and its expressions. Columns are shared between nodes by
//! unique id only.

pub mod builder;
pub mod expr;

pub use builder::LogicalPlanBuilder;
pub use expr::{
    AggFuncDesc, ByItem, HandleCols, JoinType, PropertyItem, StatsInfo, WindowFuncDesc,
    AGG_FUNC_COUNT, AGG_FUNC_FIRST_ROW,
};

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{
    ColumnInfo, FieldType, SqlType, TableInfo, EXTRA_HANDLE_ID, EXTRA_HANDLE_NAME,
};
use crate::expression::{extract_correlated_columns, Column, CorrelatedColumn, Expr, Schema};
use crate::planner::context::PlanContext;

static EMPTY_SCHEMA: Schema = Schema {
    columns: Vec::new(),
};

/// Fields shared by every plan node
#[derive(Debug, Clone)]
pub struct PlanBase {
    /// Plan id, unique within a context
    pub id: usize,
    /// Query block the node was built for
    pub query_block_offset: usize,
    /// Statistics, if derived
    pub stats: Option<StatsInfo>,
}

impl PlanBase {
    /// Allocate a new node id
    pub fn new(ctx: &mut PlanContext, query_block_offset: usize) -> Self {
        Self {
            id: ctx.alloc_plan_id(),
            query_block_offset,
            stats: None,
        }
    }
}

/// Table access
#[derive(Debug, Clone)]
pub struct DataSource {
    pub base: PlanBase,
    pub db_name: String,
    pub table_info: Arc<TableInfo>,
    /// Every filter on this table; their columns are always produced
    pub all_conds: Vec<Expr>,
    /// Column metadata, aligned with `schema`
    pub columns: Vec<ColumnInfo>,
    pub schema: Schema,
    pub output_names: Vec<String>,
    /// Row handle; cleared when its integer column gets pruned
    pub handle_cols: Option<HandleCols>,
    /// Row handle as built, never cleared
    pub unmutable_handle_cols: Option<HandleCols>,
    /// A unique index has a `tidb_shard()` expression prefix
    pub contains_expr_prefix_uk: bool,
    /// Columns whose full value is needed (output of pruning)
    pub cols_requiring_full_len: Vec<Column>,
}

/// Join of two inputs
#[derive(Debug, Clone)]
pub struct LogicalJoin {
    pub base: PlanBase,
    pub join_type: JoinType,
    pub left: Box<LogicalPlan>,
    pub right: Box<LogicalPlan>,
    pub eq_conditions: Vec<Expr>,
    pub left_conditions: Vec<Expr>,
    pub right_conditions: Vec<Expr>,
    pub other_conditions: Vec<Expr>,
    /// Null-aware equal conditions (NOT IN)
    pub naeq_conditions: Vec<Expr>,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

impl LogicalJoin {
    /// All join predicates
    pub fn conditions(&self) -> impl Iterator<Item = &Expr> {
        self.eq_conditions
            .iter()
            .chain(&self.left_conditions)
            .chain(&self.right_conditions)
            .chain(&self.other_conditions)
            .chain(&self.naeq_conditions)
    }

    /// Rebuild the output schema from the children according to the join type
    pub fn merge_schema(&mut self) {
        let left_schema = self.left.schema();
        let left_names = self.left.output_names();
        let (schema, names) = match self.join_type {
            JoinType::Semi | JoinType::AntiSemi => (left_schema.clone(), left_names.to_vec()),
            JoinType::LeftOuterSemi | JoinType::AntiLeftOuterSemi => {
                let mut schema = left_schema.clone();
                let mut names = left_names.to_vec();
                if let Some(aux) = self.schema.columns.last() {
                    schema.append(aux.clone());
                    names.push(self.output_names.last().cloned().unwrap_or_default());
                }
                (schema, names)
            }
            JoinType::Inner | JoinType::LeftOuter | JoinType::RightOuter => {
                let mut schema = Schema::merge(left_schema, self.right.schema());
                let names = left_names
                    .iter()
                    .chain(self.right.output_names())
                    .cloned()
                    .collect();
                let left_len = left_schema.len();
                let nullable = match self.join_type {
                    JoinType::LeftOuter => left_len..schema.len(),
                    JoinType::RightOuter => 0..left_len,
                    _ => 0..0,
                };
                for col in &mut schema.columns[nullable] {
                    col.ret_type.not_null = false;
                }
                (schema, names)
            }
        };
        self.schema = schema;
        self.output_names = names;
    }
}

/// Join whose inner side may reference outer columns
#[derive(Debug, Clone)]
pub struct LogicalApply {
    pub join: LogicalJoin,
    /// Outer columns referenced by the inner side
    pub cor_cols: Vec<CorrelatedColumn>,
}

/// Row replication for grouping sets
#[derive(Debug, Clone)]
pub struct LogicalExpand {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
    pub schema: Schema,
    pub output_names: Vec<String>,
    /// Columns the aggregation above groups by; kept alive below
    pub distinct_group_by_cols: Vec<Column>,
}

/// Common table expression reference
#[derive(Debug, Clone)]
pub struct LogicalCte {
    pub base: PlanBase,
    pub cte_name: String,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

/// Recursive reference to a CTE from inside its own definition
#[derive(Debug, Clone)]
pub struct LogicalCteTable {
    pub base: PlanBase,
    pub cte_name: String,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

/// Evaluates every child; only the last one is visible
#[derive(Debug, Clone)]
pub struct LogicalSequence {
    pub base: PlanBase,
    pub children: Vec<LogicalPlan>,
}

/// Computes expressions (SELECT list)
#[derive(Debug, Clone)]
pub struct LogicalProjection {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
    /// Aligned with `schema`
    pub exprs: Vec<Expr>,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

/// Grouping and aggregation
#[derive(Debug, Clone)]
pub struct LogicalAggregation {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
    /// Aligned with `schema`
    pub agg_funcs: Vec<AggFuncDesc>,
    pub group_by_items: Vec<Expr>,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

/// Filter rows based on predicates
#[derive(Debug, Clone)]
pub struct LogicalSelection {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
    pub conditions: Vec<Expr>,
}

/// Sort rows
#[derive(Debug, Clone)]
pub struct LogicalSort {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
    pub by_items: Vec<ByItem>,
}

/// Sort with limit
#[derive(Debug, Clone)]
pub struct LogicalTopN {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
    pub by_items: Vec<ByItem>,
    pub offset: u64,
    pub count: u64,
}

/// Limit rows returned
#[derive(Debug, Clone)]
pub struct LogicalLimit {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
    pub offset: u64,
    pub count: u64,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

/// Window functions
#[derive(Debug, Clone)]
pub struct LogicalWindow {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
    /// Results occupy the tail of `schema`, one column each
    pub window_funcs: Vec<WindowFuncDesc>,
    pub partition_by: Vec<PropertyItem>,
    pub order_by: Vec<PropertyItem>,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

impl LogicalWindow {
    /// Columns holding the window function results
    pub fn window_result_columns(&self) -> &[Column] {
        let n = self.window_funcs.len().min(self.schema.len());
        &self.schema.columns[self.schema.len() - n..]
    }
}

/// UNION ALL; every child produces the union's own columns
#[derive(Debug, Clone)]
pub struct LogicalUnionAll {
    pub base: PlanBase,
    pub children: Vec<LogicalPlan>,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

/// Asserts at most one input row
#[derive(Debug, Clone)]
pub struct LogicalMaxOneRow {
    pub base: PlanBase,
    pub input: Box<LogicalPlan>,
}

/// Constant rows without a table
#[derive(Debug, Clone)]
pub struct LogicalTableDual {
    pub base: PlanBase,
    pub row_count: u64,
    pub schema: Schema,
    pub output_names: Vec<String>,
}

/// Logical plan node
#[derive(Debug, Clone)]
pub enum LogicalPlan {
    DataSource(DataSource),
    Join(LogicalJoin),
    Apply(LogicalApply),
    Expand(LogicalExpand),
    Cte(LogicalCte),
    CteTable(LogicalCteTable),
    Sequence(LogicalSequence),
    Projection(LogicalProjection),
    Aggregation(LogicalAggregation),
    Selection(LogicalSelection),
    Sort(LogicalSort),
    TopN(LogicalTopN),
    Limit(LogicalLimit),
    Window(LogicalWindow),
    Union(LogicalUnionAll),
    MaxOneRow(LogicalMaxOneRow),
    TableDual(LogicalTableDual),
}

impl LogicalPlan {
    /// Operator name
    pub fn tp(&self) -> &'static str {
        match self {
            LogicalPlan::DataSource(_) => "DataSource",
            LogicalPlan::Join(_) => "Join",
            LogicalPlan::Apply(_) => "Apply",
            LogicalPlan::Expand(_) => "Expand",
            LogicalPlan::Cte(_) => "CTE",
            LogicalPlan::CteTable(_) => "CTETable",
            LogicalPlan::Sequence(_) => "Sequence",
            LogicalPlan::Projection(_) => "Projection",
            LogicalPlan::Aggregation(_) => "Aggregation",
            LogicalPlan::Selection(_) => "Selection",
            LogicalPlan::Sort(_) => "Sort",
            LogicalPlan::TopN(_) => "TopN",
            LogicalPlan::Limit(_) => "Limit",
            LogicalPlan::Window(_) => "Window",
            LogicalPlan::Union(_) => "Union",
            LogicalPlan::MaxOneRow(_) => "MaxOneRow",
            LogicalPlan::TableDual(_) => "TableDual",
        }
    }

    /// Shared node fields
    pub fn base(&self) -> &PlanBase {
        match self {
            LogicalPlan::DataSource(p) => &p.base,
            LogicalPlan::Join(p) => &p.base,
            LogicalPlan::Apply(p) => &p.join.base,
            LogicalPlan::Expand(p) => &p.base,
            LogicalPlan::Cte(p) => &p.base,
            LogicalPlan::CteTable(p) => &p.base,
            LogicalPlan::Sequence(p) => &p.base,
            LogicalPlan::Projection(p) => &p.base,
            LogicalPlan::Aggregation(p) => &p.base,
            LogicalPlan::Selection(p) => &p.base,
            LogicalPlan::Sort(p) => &p.base,
            LogicalPlan::TopN(p) => &p.base,
            LogicalPlan::Limit(p) => &p.base,
            LogicalPlan::Window(p) => &p.base,
            LogicalPlan::Union(p) => &p.base,
            LogicalPlan::MaxOneRow(p) => &p.base,
            LogicalPlan::TableDual(p) => &p.base,
        }
    }

    /// Mutable shared node fields
    pub fn base_mut(&mut self) -> &mut PlanBase {
        match self {
            LogicalPlan::DataSource(p) => &mut p.base,
            LogicalPlan::Join(p) => &mut p.base,
            LogicalPlan::Apply(p) => &mut p.join.base,
            LogicalPlan::Expand(p) => &mut p.base,
            LogicalPlan::Cte(p) => &mut p.base,
            LogicalPlan::CteTable(p) => &mut p.base,
            LogicalPlan::Sequence(p) => &mut p.base,
            LogicalPlan::Projection(p) => &mut p.base,
            LogicalPlan::Aggregation(p) => &mut p.base,
            LogicalPlan::Selection(p) => &mut p.base,
            LogicalPlan::Sort(p) => &mut p.base,
            LogicalPlan::TopN(p) => &mut p.base,
            LogicalPlan::Limit(p) => &mut p.base,
            LogicalPlan::Window(p) => &mut p.base,
            LogicalPlan::Union(p) => &mut p.base,
            LogicalPlan::MaxOneRow(p) => &mut p.base,
            LogicalPlan::TableDual(p) => &mut p.base,
        }
    }

    /// Plan id
    pub fn id(&self) -> usize {
        self.base().id
    }

    /// Output schema of this node
    pub fn schema(&self) -> &Schema {
        match self {
            LogicalPlan::DataSource(p) => &p.schema,
            LogicalPlan::Join(p) => &p.schema,
            LogicalPlan::Apply(p) => &p.join.schema,
            LogicalPlan::Expand(p) => &p.schema,
            LogicalPlan::Cte(p) => &p.schema,
            LogicalPlan::CteTable(p) => &p.schema,
            LogicalPlan::Sequence(p) => p.children.last().map_or(&EMPTY_SCHEMA, |c| c.schema()),
            LogicalPlan::Projection(p) => &p.schema,
            LogicalPlan::Aggregation(p) => &p.schema,
            LogicalPlan::Selection(p) => p.input.schema(),
            LogicalPlan::Sort(p) => p.input.schema(),
            LogicalPlan::TopN(p) => p.input.schema(),
            LogicalPlan::Limit(p) => &p.schema,
            LogicalPlan::Window(p) => &p.schema,
            LogicalPlan::Union(p) => &p.schema,
            LogicalPlan::MaxOneRow(p) => p.input.schema(),
            LogicalPlan::TableDual(p) => &p.schema,
        }
    }

    /// Display names, aligned with `schema`
    pub fn output_names(&self) -> &[String] {
        match self {
            LogicalPlan::DataSource(p) => &p.output_names,
            LogicalPlan::Join(p) => &p.output_names,
            LogicalPlan::Apply(p) => &p.join.output_names,
            LogicalPlan::Expand(p) => &p.output_names,
            LogicalPlan::Cte(p) => &p.output_names,
            LogicalPlan::CteTable(p) => &p.output_names,
            LogicalPlan::Sequence(p) => p
                .children
                .last()
                .map_or(&[] as &[String], |c| c.output_names()),
            LogicalPlan::Projection(p) => &p.output_names,
            LogicalPlan::Aggregation(p) => &p.output_names,
            LogicalPlan::Selection(p) => p.input.output_names(),
            LogicalPlan::Sort(p) => p.input.output_names(),
            LogicalPlan::TopN(p) => p.input.output_names(),
            LogicalPlan::Limit(p) => &p.output_names,
            LogicalPlan::Window(p) => &p.output_names,
            LogicalPlan::Union(p) => &p.output_names,
            LogicalPlan::MaxOneRow(p) => p.input.output_names(),
            LogicalPlan::TableDual(p) => &p.output_names,
        }
    }

    /// Child plans in declaration order
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Join(p) => vec![p.left.as_ref(), p.right.as_ref()],
            LogicalPlan::Apply(p) => vec![p.join.left.as_ref(), p.join.right.as_ref()],
            LogicalPlan::Expand(p) => vec![p.input.as_ref()],
            LogicalPlan::Projection(p) => vec![p.input.as_ref()],
            LogicalPlan::Aggregation(p) => vec![p.input.as_ref()],
            LogicalPlan::Selection(p) => vec![p.input.as_ref()],
            LogicalPlan::Sort(p) => vec![p.input.as_ref()],
            LogicalPlan::TopN(p) => vec![p.input.as_ref()],
            LogicalPlan::Limit(p) => vec![p.input.as_ref()],
            LogicalPlan::Window(p) => vec![p.input.as_ref()],
            LogicalPlan::MaxOneRow(p) => vec![p.input.as_ref()],
            LogicalPlan::Sequence(p) => p.children.iter().collect(),
            LogicalPlan::Union(p) => p.children.iter().collect(),
            LogicalPlan::DataSource(_)
            | LogicalPlan::Cte(_)
            | LogicalPlan::CteTable(_)
            | LogicalPlan::TableDual(_) => vec![],
        }
    }

    /// Expressions evaluated by this node itself
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            LogicalPlan::DataSource(p) => p.all_conds.iter().collect(),
            LogicalPlan::Join(p) => p.conditions().collect(),
            LogicalPlan::Apply(p) => p.join.conditions().collect(),
            LogicalPlan::Projection(p) => p.exprs.iter().collect(),
            LogicalPlan::Aggregation(p) => p
                .agg_funcs
                .iter()
                .flat_map(|f| f.args.iter().chain(f.order_by_items.iter().map(|b| &b.expr)))
                .chain(&p.group_by_items)
                .collect(),
            LogicalPlan::Selection(p) => p.conditions.iter().collect(),
            LogicalPlan::Sort(p) => p.by_items.iter().map(|b| &b.expr).collect(),
            LogicalPlan::TopN(p) => p.by_items.iter().map(|b| &b.expr).collect(),
            LogicalPlan::Window(p) => p.window_funcs.iter().flat_map(|f| &f.args).collect(),
            _ => vec![],
        }
    }

    /// Check if this is a projection with an empty schema
    pub fn is_empty_projection(&self) -> bool {
        matches!(self, LogicalPlan::Projection(p) if p.schema.is_empty())
    }

    /// Outer columns referenced anywhere in this subtree
    pub fn extract_correlated_cols(&self) -> Vec<CorrelatedColumn> {
        let mut cor_cols: Vec<CorrelatedColumn> = self
            .expressions()
            .into_iter()
            .flat_map(extract_correlated_columns)
            .collect();
        for child in self.children() {
            cor_cols.extend(child.extract_correlated_cols());
        }
        cor_cols
    }
}

/// Hidden row id column for a table, with a fresh unique id
pub fn new_extra_handle_column(ctx: &mut PlanContext, db_name: &str, table_name: &str) -> Column {
    Column::new(
        ctx.alloc_plan_column_id(),
        FieldType::new(SqlType::BigInt).primary_key(),
    )
    .with_id(EXTRA_HANDLE_ID)
    .with_orig_name(format!("{}.{}.{}", db_name, table_name, EXTRA_HANDLE_NAME))
}

/// Outer columns referenced from `plan` that resolve to `schema`
///
/// The result follows `schema` order and holds each column once.
pub fn extract_cor_columns_by_schema(plan: &LogicalPlan, schema: &Schema) -> Vec<CorrelatedColumn> {
    let mut found: HashMap<usize, CorrelatedColumn> = HashMap::new();
    for cor in plan.extract_correlated_cols() {
        if let Some(idx) = schema.column_index(&cor.column) {
            found
                .entry(idx)
                .or_insert_with(|| CorrelatedColumn::new(schema.columns[idx].clone()));
        }
    }
    let mut positions: Vec<usize> = found.keys().copied().collect();
    positions.sort_unstable();
    positions
        .into_iter()
        .filter_map(|idx| found.remove(&idx))
        .collect()
}
