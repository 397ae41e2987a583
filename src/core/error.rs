use thiserror::Error;

use crate::models::request::ColumnType;

/// 行模型查询的错误分类
///
/// 除 `ExecutionFailure` 外均为调用方错误，在生成任何 SQL 文本之前即被检出。
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid filter on column '{column}': {reason}")]
    InvalidFilter { column: String, reason: String },

    #[error("column '{0}' appears more than once among grouping and value columns")]
    DuplicateColumn(String),

    #[error("group key '{value}' does not match type {expected} of column '{column}'")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        value: String,
    },

    #[error("unsafe identifier: '{0}'")]
    UnsafeIdentifier(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("query on '{relation}' failed [{query}]: {source}")]
    ExecutionFailure {
        relation: String,
        query: String,
        #[source]
        source: anyhow::Error,
    },
}

impl QueryError {
    pub fn invalid_filter(column: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidFilter {
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    /// 调用方错误 (400) 与执行错误 (502) 的划分
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, QueryError::ExecutionFailure { .. })
    }
}
