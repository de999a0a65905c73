//! Ordered column lists produced by plan nodes

use std::fmt;

use super::Column;

/// Output schema of a plan node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    /// Columns in output order
    pub columns: Vec<Column>,
}

impl Schema {
    /// Create a schema from columns
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check if the column is part of this schema
    pub fn contains(&self, col: &Column) -> bool {
        self.column_index(col).is_some()
    }

    /// Position of the column, by unique id
    pub fn column_index(&self, col: &Column) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.unique_id == col.unique_id)
    }

    /// Append a column
    pub fn append(&mut self, col: Column) {
        self.columns.push(col);
    }

    /// Concatenate two schemas
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        let mut columns = Vec::with_capacity(left.len() + right.len());
        columns.extend(left.columns.iter().cloned());
        columns.extend(right.columns.iter().cloned());
        Schema { columns }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", col)?;
        }
        write!(f, "]")
    }
}
