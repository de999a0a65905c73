//! Shared test utilities for planner module tests

use std::sync::Arc;

use crate::catalog::{ColumnInfo, FieldType, SqlType, TableInfo};

/// `t(a int, b varchar(64), c bigint)` without an integer handle
pub fn table_t() -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new(1, "t")
            .column(ColumnInfo::new("a", FieldType::new(SqlType::Int)))
            .column(ColumnInfo::new("b", FieldType::varchar(64)))
            .column(ColumnInfo::new("c", FieldType::new(SqlType::BigInt))),
    )
}

/// `u(d int, e int)` without an integer handle
pub fn table_u() -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new(2, "u")
            .column(ColumnInfo::new("d", FieldType::new(SqlType::Int)))
            .column(ColumnInfo::new("e", FieldType::new(SqlType::Int))),
    )
}

/// `pk(id bigint primary key, v int)` with `id` as the row handle
pub fn table_pk() -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new(3, "pk")
            .column(ColumnInfo::new("id", FieldType::new(SqlType::BigInt)))
            .column(ColumnInfo::new("v", FieldType::new(SqlType::Int)))
            .int_handle("id"),
    )
}
