//! 集成测试共用的内存数据源

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use ssrm_backend::core::source::RowSource;
use ssrm_backend::core::sql::Ident;
use ssrm_backend::models::request::{AggFunc, ColumnVO};
use ssrm_backend::models::response::Row;

/// 记录收到的每条查询，按列返回预置的去重取值
#[derive(Default)]
pub struct FakeSource {
    rows: Vec<Row>,
    distinct: HashMap<String, Vec<String>>,
    fail: AtomicBool,
    queries: Mutex<Vec<String>>,
    distinct_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = rows
            .into_iter()
            .map(|v| v.as_object().cloned().expect("row fixtures must be objects"))
            .collect();
        self
    }

    pub fn with_distinct(mut self, column: &str, values: &[&str]) -> Self {
        self.distinct
            .insert(column.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn distinct_calls(&self) -> usize {
        self.distinct_calls.load(Ordering::SeqCst)
    }
}

impl RowSource for FakeSource {
    async fn execute(&self, sql: &str) -> anyhow::Result<Vec<Row>> {
        self.queries.lock().unwrap().push(sql.to_string());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }
        Ok(self.rows.clone())
    }

    async fn distinct_values(&self, relation: &Ident, column: &Ident) -> anyhow::Result<Vec<String>> {
        self.distinct_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("relation {} is offline", relation);
        }
        Ok(self.distinct.get(column.as_str()).cloned().unwrap_or_default())
    }
}

pub fn group(name: &str) -> ColumnVO {
    ColumnVO::new(name, name, name, None)
}

pub fn sum(name: &str) -> ColumnVO {
    ColumnVO::new(name, name, name, Some(AggFunc::Sum))
}
