//! Per-operator descriptors for the logical plan

use std::fmt;

use crate::catalog::{FieldType, SqlType};
use crate::expression::{Column, Expr, ExprError, ExprResult};

/// Aggregate function name: COUNT
pub const AGG_FUNC_COUNT: &str = "count";
/// Aggregate function name: internal FIRST_ROW
pub const AGG_FUNC_FIRST_ROW: &str = "first_row";

/// Join type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    Semi,
    AntiSemi,
    LeftOuterSemi,
    AntiLeftOuterSemi,
}

impl JoinType {
    /// Semi variants that append a boolean match column to the left side
    pub fn is_left_outer_semi(&self) -> bool {
        matches!(self, JoinType::LeftOuterSemi | JoinType::AntiLeftOuterSemi)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Inner => "inner join",
            JoinType::LeftOuter => "left outer join",
            JoinType::RightOuter => "right outer join",
            JoinType::Semi => "semi join",
            JoinType::AntiSemi => "anti semi join",
            JoinType::LeftOuterSemi => "left outer semi join",
            JoinType::AntiLeftOuterSemi => "anti left outer semi join",
        };
        write!(f, "{}", s)
    }
}

/// Plan statistics carried along structural rewrites
#[derive(Debug, Clone, PartialEq)]
pub struct StatsInfo {
    /// Estimated row count
    pub row_count: f64,
}

/// One ordering key
#[derive(Debug, Clone, PartialEq)]
pub struct ByItem {
    pub expr: Expr,
    pub desc: bool,
}

impl ByItem {
    /// Ascending key
    pub fn asc(expr: Expr) -> Self {
        Self { expr, desc: false }
    }

    /// Descending key
    pub fn desc(expr: Expr) -> Self {
        Self { expr, desc: true }
    }
}

impl fmt::Display for ByItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.desc {
            write!(f, "{} true", self.expr)
        } else {
            write!(f, "{}", self.expr)
        }
    }
}

/// Ordering or partitioning column of a window
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyItem {
    pub col: Column,
    pub desc: bool,
}

/// Aggregate function specification
#[derive(Debug, Clone, PartialEq)]
pub struct AggFuncDesc {
    /// Lower-case function name
    pub name: String,
    /// Arguments to the function
    pub args: Vec<Expr>,
    /// Whether DISTINCT is specified
    pub distinct: bool,
    /// ORDER BY inside the function (GROUP_CONCAT)
    pub order_by_items: Vec<ByItem>,
    /// Result type of the aggregate
    pub ret_type: FieldType,
}

impl AggFuncDesc {
    /// Create an aggregate function, deriving its result type
    pub fn new(name: &str, args: Vec<Expr>, distinct: bool) -> ExprResult<Self> {
        let name = name.to_lowercase();
        let ret_type = match name.as_str() {
            AGG_FUNC_COUNT => {
                check_min_args(&name, &args, 1)?;
                FieldType::new(SqlType::BigInt).with_flen(21).not_null()
            }
            "sum" | "avg" => {
                check_args(&name, &args, 1)?;
                match args[0].ret_type().sql_type() {
                    SqlType::Float | SqlType::Double => FieldType::new(SqlType::Double),
                    _ => FieldType::new(SqlType::Decimal),
                }
            }
            "min" | "max" | AGG_FUNC_FIRST_ROW => {
                check_args(&name, &args, 1)?;
                let mut tp = args[0].ret_type().clone();
                tp.not_null = false;
                tp.primary_key = false;
                tp
            }
            "group_concat" => {
                check_min_args(&name, &args, 1)?;
                FieldType::new(SqlType::Text)
            }
            _ => return Err(ExprError::UnknownAggregate(name)),
        };
        Ok(Self {
            name,
            args,
            distinct,
            order_by_items: Vec::new(),
            ret_type,
        })
    }

    /// Attach ORDER BY items
    #[must_use]
    pub fn with_order_by(mut self, items: Vec<ByItem>) -> Self {
        self.order_by_items = items;
        self
    }
}

impl fmt::Display for AggFuncDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        if self.distinct {
            write!(f, "distinct ")?;
        }
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// Window function specification
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFuncDesc {
    /// Lower-case function name
    pub name: String,
    /// Arguments
    pub args: Vec<Expr>,
    /// Result type
    pub ret_type: FieldType,
}

impl WindowFuncDesc {
    /// Create a window function, deriving its result type
    pub fn new(name: &str, args: Vec<Expr>) -> ExprResult<Self> {
        let name = name.to_lowercase();
        let ret_type = match name.as_str() {
            "row_number" | "rank" | "dense_rank" | "ntile" => {
                FieldType::new(SqlType::BigInt).not_null()
            }
            "percent_rank" | "cume_dist" => FieldType::new(SqlType::Double).not_null(),
            "lead" | "lag" | "first_value" | "last_value" | "nth_value" => {
                check_min_args(&name, &args, 1)?;
                let mut tp = args[0].ret_type().clone();
                tp.not_null = false;
                tp
            }
            _ => match AggFuncDesc::new(&name, args.clone(), false) {
                Ok(agg) => agg.ret_type,
                Err(ExprError::UnknownAggregate(_)) => {
                    return Err(ExprError::UnknownWindowFunction(name))
                }
                Err(e) => return Err(e),
            },
        };
        Ok(Self {
            name,
            args,
            ret_type,
        })
    }
}

fn check_args(name: &str, args: &[Expr], expected: usize) -> ExprResult<()> {
    if args.len() != expected {
        return Err(ExprError::ArgumentCount {
            func: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn check_min_args(name: &str, args: &[Expr], min: usize) -> ExprResult<()> {
    if args.len() < min {
        return Err(ExprError::ArgumentCount {
            func: name.to_string(),
            expected: min,
            got: args.len(),
        });
    }
    Ok(())
}

/// Columns that identify a row of a data source
#[derive(Debug, Clone, PartialEq)]
pub enum HandleCols {
    /// Integer handle (int primary key or hidden row id)
    Int(Column),
    /// Clustered primary key over one or more columns
    Common(Vec<Column>),
}

impl HandleCols {
    /// Check if this is an integer handle
    pub fn is_int(&self) -> bool {
        matches!(self, HandleCols::Int(_))
    }

    /// Handle column at position `idx`
    pub fn get_col(&self, idx: usize) -> Option<&Column> {
        match self {
            HandleCols::Int(col) if idx == 0 => Some(col),
            HandleCols::Int(_) => None,
            HandleCols::Common(cols) => cols.get(idx),
        }
    }
}

impl fmt::Display for HandleCols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleCols::Int(col) => write!(f, "{}", col),
            HandleCols::Common(cols) => {
                write!(f, "[")?;
                for (i, col) in cols.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", col)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_col(id: i64) -> Column {
        Column::new(id, FieldType::new(SqlType::Int).not_null())
    }

    #[test]
    fn test_agg_result_types() {
        let count = AggFuncDesc::new("COUNT", vec![Expr::col(&int_col(1))], false).unwrap();
        assert_eq!(count.name, "count");
        assert!(count.ret_type.not_null);

        let max = AggFuncDesc::new("max", vec![Expr::col(&int_col(1))], false).unwrap();
        assert_eq!(max.ret_type.tp, SqlType::Int);
        assert!(!max.ret_type.not_null);

        let sum = AggFuncDesc::new("sum", vec![Expr::col(&int_col(1))], false).unwrap();
        assert_eq!(sum.ret_type.tp, SqlType::Decimal);
    }

    #[test]
    fn test_agg_errors() {
        assert_eq!(
            AggFuncDesc::new("median", vec![Expr::new_one()], false),
            Err(ExprError::UnknownAggregate("median".to_string()))
        );
        assert!(matches!(
            AggFuncDesc::new("sum", vec![], false),
            Err(ExprError::ArgumentCount { expected: 1, got: 0, .. })
        ));
    }

    #[test]
    fn test_window_funcs() {
        let rn = WindowFuncDesc::new("row_number", vec![]).unwrap();
        assert_eq!(rn.ret_type.tp, SqlType::BigInt);
        let sum = WindowFuncDesc::new("sum", vec![Expr::col(&int_col(1))]).unwrap();
        assert_eq!(sum.ret_type.tp, SqlType::Decimal);
        assert_eq!(
            WindowFuncDesc::new("bogus", vec![]),
            Err(ExprError::UnknownWindowFunction("bogus".to_string()))
        );
    }

    #[test]
    fn test_handle_cols() {
        let int = HandleCols::Int(int_col(1));
        assert!(int.is_int());
        assert_eq!(int.get_col(0), Some(&int_col(1)));
        assert_eq!(int.get_col(1), None);

        let common = HandleCols::Common(vec![int_col(2), int_col(3)]);
        assert!(!common.is_int());
        assert_eq!(common.get_col(1), Some(&int_col(3)));
    }

    #[test]
    fn test_join_type_classes() {
        assert!(!JoinType::Semi.is_left_outer_semi());
        assert!(JoinType::AntiLeftOuterSemi.is_left_outer_semi());
        assert_eq!(JoinType::LeftOuter.to_string(), "left outer join");
    }
}
