//! Expressions referenced by logical plan nodes
//!
//! The planner only inspects expressions; it never evaluates them. What it
//! needs is:
//! - which columns an expression reads (`extract_columns`)
//! - whether it is constant at runtime or has side effects
//! - its result type
//! - a canonical byte encoding for duplicate detection (`hash_code`)

pub mod column;
pub mod error;
pub mod schema;
pub mod util;

pub use column::{Column, CorrelatedColumn};
pub use error::{ExprError, ExprResult};
pub use schema::Schema;
pub use util::{
    column_to_exprs, extract_columns, extract_columns_from_expressions,
    extract_correlated_columns, exprs_have_side_effects, gc_column_expr_is_tidb_shard,
    get_used_list, is_runtime_const_expr,
};

use std::fmt;

use crate::catalog::{FieldType, SqlType};

/// Constant value
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// NULL
    Null,
    /// Signed integer
    Int(i64),
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Int(v) => write!(f, "{}", v),
        }
    }
}

/// Typed constant
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    /// Value
    pub value: Datum,
    /// Result type
    pub ret_type: FieldType,
}

/// Function call
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFunction {
    /// Lower-case function name
    pub func_name: String,
    /// Arguments
    pub args: Vec<Expr>,
    /// Result type
    pub ret_type: FieldType,
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column of a child plan
    Column(Column),
    /// Column of an outer plan
    CorrelatedColumn(CorrelatedColumn),
    /// Constant
    Constant(Constant),
    /// Function call
    ScalarFunction(ScalarFunction),
}

impl Expr {
    /// Column reference
    pub fn col(col: &Column) -> Expr {
        Expr::Column(col.clone())
    }

    /// Outer column reference
    pub fn cor_col(col: &Column) -> Expr {
        Expr::CorrelatedColumn(CorrelatedColumn::new(col.clone()))
    }

    /// Integer constant
    pub fn int(v: i64) -> Expr {
        Expr::Constant(Constant {
            value: Datum::Int(v),
            ret_type: FieldType::new(SqlType::BigInt)
                .with_flen(v.to_string().len() as u32)
                .not_null(),
        })
    }

    /// The constant `1`
    pub fn new_one() -> Expr {
        Expr::int(1)
    }

    /// The NULL literal
    pub fn null() -> Expr {
        Expr::Constant(Constant {
            value: Datum::Null,
            ret_type: FieldType::new(SqlType::Null),
        })
    }

    /// Function call
    pub fn func(name: impl Into<String>, args: Vec<Expr>, ret_type: FieldType) -> Expr {
        Expr::ScalarFunction(ScalarFunction {
            func_name: name.into().to_lowercase(),
            args,
            ret_type,
        })
    }

    /// `left = right`
    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::func("eq", vec![left, right], FieldType::new(SqlType::Boolean))
    }

    /// `left > right`
    pub fn gt(left: Expr, right: Expr) -> Expr {
        Expr::func("gt", vec![left, right], FieldType::new(SqlType::Boolean))
    }

    /// `left + right`
    pub fn plus(left: Expr, right: Expr) -> Expr {
        let ret_type = left.ret_type().clone();
        Expr::func("plus", vec![left, right], ret_type)
    }

    /// Result type
    pub fn ret_type(&self) -> &FieldType {
        match self {
            Expr::Column(col) => &col.ret_type,
            Expr::CorrelatedColumn(cor) => &cor.column.ret_type,
            Expr::Constant(c) => &c.ret_type,
            Expr::ScalarFunction(f) => &f.ret_type,
        }
    }

    /// Canonical byte encoding; equal encodings mean equal expressions
    pub fn hash_code(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_hash(&mut buf);
        buf
    }

    fn encode_hash(&self, buf: &mut Vec<u8>) {
        match self {
            Expr::Column(col) => {
                buf.push(b'c');
                buf.extend_from_slice(&col.unique_id.to_le_bytes());
            }
            Expr::CorrelatedColumn(cor) => {
                buf.push(b'o');
                buf.extend_from_slice(&cor.column.unique_id.to_le_bytes());
            }
            Expr::Constant(c) => {
                buf.push(b'k');
                match &c.value {
                    Datum::Null => buf.push(0),
                    Datum::Int(v) => {
                        buf.push(1);
                        buf.extend_from_slice(&v.to_le_bytes());
                    }
                }
            }
            Expr::ScalarFunction(f) => {
                buf.push(b'f');
                buf.extend_from_slice(&(f.func_name.len() as u64).to_le_bytes());
                buf.extend_from_slice(f.func_name.as_bytes());
                buf.extend_from_slice(&(f.args.len() as u64).to_le_bytes());
                for arg in &f.args {
                    arg.encode_hash(buf);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(col) => write!(f, "{}", col),
            Expr::CorrelatedColumn(cor) => write!(f, "{}", cor),
            Expr::Constant(c) => write!(f, "{}", c.value),
            Expr::ScalarFunction(func) => {
                write!(f, "{}(", func.func_name)?;
                for (i, arg) in func.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
