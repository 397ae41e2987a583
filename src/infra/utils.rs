use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row as _, TypeInfo};

use crate::models::response::Row;

/// 按数据库原生类型名归类，两种驱动共用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Int16,
    Int32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Decimal,
    Bool,
    Date,
    Timestamp,
    TimestampTz,
    Json,
    Text,
}

impl ValueKind {
    fn of(type_name: &str) -> Self {
        if type_name.ends_with(" UNSIGNED") {
            return ValueKind::UInt64;
        }
        match type_name {
            "INT2" => ValueKind::Int16,
            "INT4" => ValueKind::Int32,
            "INT8" | "TINYINT" | "SMALLINT" | "INT" | "MEDIUMINT" | "BIGINT" => ValueKind::Int64,
            "FLOAT4" | "FLOAT" => ValueKind::Float32,
            "FLOAT8" | "DOUBLE" => ValueKind::Float64,
            "NUMERIC" | "DECIMAL" | "NEWDECIMAL" => ValueKind::Decimal,
            "BOOL" | "BOOLEAN" => ValueKind::Bool,
            "DATE" => ValueKind::Date,
            "TIMESTAMP" | "DATETIME" => ValueKind::Timestamp,
            "TIMESTAMPTZ" => ValueKind::TimestampTz,
            "JSON" | "JSONB" => ValueKind::Json,
            _ => ValueKind::Text,
        }
    }
}

// 金额类保持为数字返回给表格，超出 f64 时退回字符串
fn decimal_value(v: Option<Decimal>) -> Value {
    match v {
        Some(d) => d
            .to_f64()
            .map(|f| json!(f))
            .unwrap_or_else(|| json!(d.to_string())),
        None => Value::Null,
    }
}

pub fn pg_row_to_map(row: &PgRow) -> Row {
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        let val = match ValueKind::of(col.type_info().name()) {
            ValueKind::Int16 => json!(row.try_get::<Option<i16>, _>(name).unwrap_or(None)),
            ValueKind::Int32 => json!(row.try_get::<Option<i32>, _>(name).unwrap_or(None)),
            ValueKind::Int64 | ValueKind::UInt64 => {
                json!(row.try_get::<Option<i64>, _>(name).unwrap_or(None))
            }
            ValueKind::Float32 => json!(row.try_get::<Option<f32>, _>(name).unwrap_or(None)),
            ValueKind::Float64 => json!(row.try_get::<Option<f64>, _>(name).unwrap_or(None)),
            ValueKind::Decimal => decimal_value(row.try_get(name).unwrap_or(None)),
            ValueKind::Bool => json!(row.try_get::<Option<bool>, _>(name).unwrap_or(None)),
            ValueKind::Date => json!(row
                .try_get::<Option<NaiveDate>, _>(name)
                .unwrap_or(None)
                .map(|d| d.to_string())),
            ValueKind::Timestamp => json!(row
                .try_get::<Option<NaiveDateTime>, _>(name)
                .unwrap_or(None)
                .map(|dt| dt.to_string())),
            ValueKind::TimestampTz => json!(row
                .try_get::<Option<DateTime<Utc>>, _>(name)
                .unwrap_or(None)
                .map(|dt| dt.to_rfc3339())),
            ValueKind::Json => row
                .try_get::<Option<Value>, _>(name)
                .unwrap_or(None)
                .unwrap_or(Value::Null),
            ValueKind::Text => json!(row.try_get::<Option<String>, _>(name).unwrap_or(None)),
        };
        map.insert(name.to_string(), val);
    }
    map
}

pub fn mysql_row_to_map(row: &MySqlRow) -> Row {
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        let val = match ValueKind::of(col.type_info().name()) {
            ValueKind::Int16 | ValueKind::Int32 | ValueKind::Int64 => {
                json!(row.try_get::<Option<i64>, _>(name).unwrap_or(None))
            }
            ValueKind::UInt64 => json!(row.try_get::<Option<u64>, _>(name).unwrap_or(None)),
            ValueKind::Float32 => json!(row.try_get::<Option<f32>, _>(name).unwrap_or(None)),
            ValueKind::Float64 => json!(row.try_get::<Option<f64>, _>(name).unwrap_or(None)),
            ValueKind::Decimal => decimal_value(row.try_get(name).unwrap_or(None)),
            ValueKind::Bool => json!(row.try_get::<Option<bool>, _>(name).unwrap_or(None)),
            ValueKind::Date => json!(row
                .try_get::<Option<NaiveDate>, _>(name)
                .unwrap_or(None)
                .map(|d| d.to_string())),
            ValueKind::Timestamp | ValueKind::TimestampTz => json!(row
                .try_get::<Option<NaiveDateTime>, _>(name)
                .unwrap_or(None)
                .map(|dt| dt.to_string())),
            ValueKind::Json => row
                .try_get::<Option<Value>, _>(name)
                .unwrap_or(None)
                .unwrap_or(Value::Null),
            ValueKind::Text => json!(row.try_get::<Option<String>, _>(name).unwrap_or(None)),
        };
        map.insert(name.to_string(), val);
    }
    map
}
