//! Catalog - table metadata consumed by the planner
//!
//! The planner only needs a narrow view of a table: its column
//! definitions, how rows are addressed (integer handle, clustered common
//! handle or the hidden row id), whether a columnar replica exists, and
//! what kind of table it is.

use serde::{Deserialize, Serialize};

/// Column id of the hidden row id column
pub const EXTRA_HANDLE_ID: i64 = -1;

/// Name of the hidden row id column
pub const EXTRA_HANDLE_NAME: &str = "_tidb_rowid";

/// SQL types known to the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Type of the NULL literal
    Null,
    /// Boolean (true/false)
    Boolean,
    /// 8-bit signed integer
    TinyInt,
    /// 16-bit signed integer
    SmallInt,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    BigInt,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// Fixed-point decimal
    Decimal,
    /// Variable-length string
    Varchar,
    /// Unlimited text
    Text,
    /// Binary data
    Blob,
    /// Timestamp (date and time)
    Timestamp,
}

impl SqlType {
    /// Default display length for values of this type
    pub fn default_flen(&self) -> u32 {
        match self {
            SqlType::Null => 0,
            SqlType::Boolean => 1,
            SqlType::TinyInt => 4,
            SqlType::SmallInt => 6,
            SqlType::Int => 11,
            SqlType::BigInt => 20,
            SqlType::Float => 12,
            SqlType::Double => 22,
            SqlType::Decimal => 11,
            SqlType::Varchar => 255,
            SqlType::Text | SqlType::Blob => 65535,
            SqlType::Timestamp => 19,
        }
    }

    /// Check if this type is an integer
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt
        )
    }
}

/// Full type of a column or expression result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    /// Underlying SQL type
    pub tp: SqlType,
    /// Display length
    pub flen: u32,
    /// NOT NULL flag
    pub not_null: bool,
    /// PRIMARY KEY flag
    pub primary_key: bool,
}

impl FieldType {
    /// Create a nullable field type with the default length
    pub fn new(tp: SqlType) -> Self {
        Self {
            tp,
            flen: tp.default_flen(),
            not_null: false,
            primary_key: false,
        }
    }

    /// VARCHAR(n)
    pub fn varchar(len: u32) -> Self {
        Self::new(SqlType::Varchar).with_flen(len)
    }

    /// Set the display length
    #[must_use]
    pub fn with_flen(mut self, flen: u32) -> Self {
        self.flen = flen;
        self
    }

    /// Set NOT NULL
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Set PRIMARY KEY (implies NOT NULL)
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// Get the SQL type
    pub fn sql_type(&self) -> SqlType {
        self.tp
    }
}

/// Generated (virtual) column definition: `func(args...)`
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedColumn {
    /// Function name, e.g. `tidb_shard`
    pub func: String,
    /// Names of the argument columns
    pub args: Vec<String>,
}

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column id inside its table
    pub id: i64,
    /// Column name
    pub name: String,
    /// Position inside the table definition
    pub offset: usize,
    /// Column type
    pub field_type: FieldType,
    /// Generation expression for virtual columns
    pub generated: Option<GeneratedColumn>,
}

impl ColumnInfo {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: 0,
            name: name.into(),
            offset: 0,
            field_type,
            generated: None,
        }
    }

    /// The hidden row id column
    pub fn new_extra_handle() -> Self {
        Self {
            id: EXTRA_HANDLE_ID,
            name: EXTRA_HANDLE_NAME.to_string(),
            offset: 0,
            field_type: FieldType::new(SqlType::BigInt).primary_key(),
            generated: None,
        }
    }

    /// Mark as a generated column
    #[must_use]
    pub fn generated(mut self, func: impl Into<String>, args: &[&str]) -> Self {
        self.generated = Some(GeneratedColumn {
            func: func.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        self
    }
}

/// Kind of table behind a data source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableType {
    /// Ordinary table
    #[default]
    Normal,
    /// Memory table (information schema)
    Virtual,
    /// Cluster-wide memory table, rows come from every node
    Cluster,
}

impl TableType {
    /// Check if this is a cluster table
    pub fn is_cluster_table(&self) -> bool {
        matches!(self, TableType::Cluster)
    }
}

/// Columnar replica settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiFlashReplicaInfo {
    /// Number of replicas
    pub count: u64,
    /// Whether the replica is ready for reads
    pub available: bool,
}

/// Table definition
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Table id
    pub id: i64,
    /// Table name
    pub name: String,
    /// Column definitions
    pub columns: Vec<ColumnInfo>,
    /// The integer primary key doubles as the row handle
    pub pk_is_handle: bool,
    /// Rows are clustered by a non-integer primary key
    pub is_common_handle: bool,
    /// Columns of the clustered primary key
    pub common_handle_columns: Vec<String>,
    /// Columnar replica, if any
    pub tiflash_replica: Option<TiFlashReplicaInfo>,
    /// Table kind
    pub table_type: TableType,
}

impl TableInfo {
    /// Create a new table definition
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            columns: Vec::new(),
            pk_is_handle: false,
            is_common_handle: false,
            common_handle_columns: Vec::new(),
            tiflash_replica: None,
            table_type: TableType::Normal,
        }
    }

    /// Add a column
    #[must_use]
    pub fn column(mut self, mut col: ColumnInfo) -> Self {
        col.offset = self.columns.len();
        col.id = self.columns.len() as i64 + 1;
        self.columns.push(col);
        self
    }

    /// Declare an integer primary key that is also the row handle
    #[must_use]
    pub fn int_handle(mut self, name: &str) -> Self {
        if let Some(col) = self.columns.iter_mut().find(|c| c.name == name) {
            col.field_type = col.field_type.clone().primary_key();
            self.pk_is_handle = true;
        }
        self
    }

    /// Declare a clustered primary key over the given columns
    #[must_use]
    pub fn common_handle(mut self, names: &[&str]) -> Self {
        for col in self.columns.iter_mut() {
            if names.contains(&col.name.as_str()) {
                col.field_type = col.field_type.clone().primary_key();
            }
        }
        self.is_common_handle = true;
        self.common_handle_columns = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Add a columnar replica
    #[must_use]
    pub fn tiflash_replica(mut self, count: u64) -> Self {
        self.tiflash_replica = Some(TiFlashReplicaInfo {
            count,
            available: true,
        });
        self
    }

    /// Set the table kind
    #[must_use]
    pub fn table_type(mut self, table_type: TableType) -> Self {
        self.table_type = table_type;
        self
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get the integer primary key column when it is the handle
    pub fn pk_handle_column(&self) -> Option<&ColumnInfo> {
        if !self.pk_is_handle {
            return None;
        }
        self.columns
            .iter()
            .find(|c| c.field_type.primary_key && c.field_type.tp.is_integer())
    }
}
