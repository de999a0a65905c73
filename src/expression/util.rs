//! Column extraction and expression classification helpers

use std::collections::HashSet;

use super::{Column, CorrelatedColumn, Expr, Schema};

/// Functions whose result can differ between evaluations of the same row
const UNFOLDABLE_FUNCTIONS: &[&str] = &[
    "sysdate",
    "found_rows",
    "rand",
    "uuid",
    "sleep",
    "row_count",
    "last_insert_id",
    "getvar",
    "setvar",
    "get_lock",
    "release_lock",
];

/// Functions that must be evaluated even when their result is unused
const MUTABLE_EFFECT_FUNCTIONS: &[&str] = &[
    "rand",
    "sysdate",
    "uuid",
    "uuid_short",
    "sleep",
    "setvar",
    "get_lock",
    "release_lock",
    "nextval",
    "lastval",
    "setval",
];

/// Name of the shard generation function
const TIDB_SHARD: &str = "tidb_shard";

/// Columns read by an expression, in visit order (correlated columns excluded)
pub fn extract_columns(expr: &Expr) -> Vec<Column> {
    let mut result = Vec::new();
    collect_columns(expr, &mut result);
    result
}

fn collect_columns(expr: &Expr, out: &mut Vec<Column>) {
    match expr {
        Expr::Column(col) => out.push(col.clone()),
        Expr::ScalarFunction(f) => {
            for arg in &f.args {
                collect_columns(arg, out);
            }
        }
        Expr::CorrelatedColumn(_) | Expr::Constant(_) => {}
    }
}

/// Append the distinct columns read by `exprs` to `result`
///
/// Columns rejected by `filter` are skipped. Columns already in the seed
/// are not checked for duplicates.
pub fn extract_columns_from_expressions<'a>(
    mut result: Vec<Column>,
    exprs: impl IntoIterator<Item = &'a Expr>,
    filter: Option<&dyn Fn(&Column) -> bool>,
) -> Vec<Column> {
    let mut seen = HashSet::new();
    for expr in exprs {
        for col in extract_columns(expr) {
            if let Some(keep) = filter {
                if !keep(&col) {
                    continue;
                }
            }
            if seen.insert(col.unique_id) {
                result.push(col);
            }
        }
    }
    result
}

/// Outer-column references inside an expression
pub fn extract_correlated_columns(expr: &Expr) -> Vec<CorrelatedColumn> {
    let mut result = Vec::new();
    collect_correlated(expr, &mut result);
    result
}

fn collect_correlated(expr: &Expr, out: &mut Vec<CorrelatedColumn>) {
    match expr {
        Expr::CorrelatedColumn(cor) => out.push(cor.clone()),
        Expr::ScalarFunction(f) => {
            for arg in &f.args {
                collect_correlated(arg, out);
            }
        }
        Expr::Column(_) | Expr::Constant(_) => {}
    }
}

/// Mask over `schema` marking the columns present in `used_cols`
pub fn get_used_list(used_cols: &[Column], schema: &Schema) -> Vec<bool> {
    let used: HashSet<i64> = used_cols.iter().map(|c| c.unique_id).collect();
    schema
        .columns
        .iter()
        .map(|c| used.contains(&c.unique_id))
        .collect()
}

/// Check if the expression has the same value for every row of a query
pub fn is_runtime_const_expr(expr: &Expr) -> bool {
    match expr {
        Expr::Constant(_) | Expr::CorrelatedColumn(_) => true,
        Expr::Column(_) => false,
        Expr::ScalarFunction(f) => {
            !UNFOLDABLE_FUNCTIONS.contains(&f.func_name.as_str())
                && f.args.iter().all(is_runtime_const_expr)
        }
    }
}

/// Check if evaluating any of the expressions has observable effects
pub fn exprs_have_side_effects<'a>(exprs: impl IntoIterator<Item = &'a Expr>) -> bool {
    exprs.into_iter().any(has_side_effects)
}

fn has_side_effects(expr: &Expr) -> bool {
    match expr {
        Expr::ScalarFunction(f) => {
            MUTABLE_EFFECT_FUNCTIONS.contains(&f.func_name.as_str())
                || f.args.iter().any(has_side_effects)
        }
        _ => false,
    }
}

/// Check if a virtual column is generated by `tidb_shard()`
pub fn gc_column_expr_is_tidb_shard(virtual_expr: Option<&Expr>) -> bool {
    matches!(virtual_expr, Some(Expr::ScalarFunction(f)) if f.func_name == TIDB_SHARD)
}

/// Columns as expressions
pub fn column_to_exprs(cols: &[Column]) -> Vec<Expr> {
    cols.iter().map(Expr::col).collect()
}
