//! Plan columns
//!
//! A `Column` is identified by its plan-wide `unique_id`. Two columns with
//! the same unique id are the same column no matter what else differs, so
//! equality and hashing only look at that id.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::catalog::{ColumnInfo, FieldType};

use super::Expr;

/// Column produced by a plan node
#[derive(Debug, Clone)]
pub struct Column {
    /// Plan-wide identity
    pub unique_id: i64,
    /// Column id inside the source table (0 for derived columns)
    pub id: i64,
    /// Result type
    pub ret_type: FieldType,
    /// Qualified origin name (`db.table.column`), empty for derived columns
    pub orig_name: String,
    /// Generation expression of a virtual column
    pub virtual_expr: Option<Box<Expr>>,
}

impl Column {
    /// Create a derived column
    pub fn new(unique_id: i64, ret_type: FieldType) -> Self {
        Self {
            unique_id,
            id: 0,
            ret_type,
            orig_name: String::new(),
            virtual_expr: None,
        }
    }

    /// Set the qualified origin name
    #[must_use]
    pub fn with_orig_name(mut self, name: impl Into<String>) -> Self {
        self.orig_name = name.into();
        self
    }

    /// Set the table column id
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Rebuild catalog metadata for this column
    pub fn to_info(&self) -> ColumnInfo {
        let name = self
            .orig_name
            .rsplit('.')
            .next()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string());
        let mut info = ColumnInfo::new(name, self.ret_type.clone());
        info.id = self.id;
        info
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state);
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.orig_name.is_empty() {
            write!(f, "Column#{}", self.unique_id)
        } else {
            write!(f, "{}", self.orig_name)
        }
    }
}

/// Reference from a subquery to a column of an outer plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedColumn {
    /// The outer column
    pub column: Column,
}

impl CorrelatedColumn {
    /// Wrap an outer column
    pub fn new(column: Column) -> Self {
        Self { column }
    }
}

impl fmt::Display for CorrelatedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Column#{}(cor)", self.column.unique_id)
    }
}
