//! 取数请求 -> 单条 SQL
//!
//! 先校验 (标识符、分页窗口、分组键类型、过滤条件、列名冲突)，
//! 再构造类型化的 `SelectPlan`，最后渲染。校验失败时不会产生任何 SQL 文本。
//!
//! 两种形态：
//! - 明细层：`SELECT * FROM t [WHERE ..] [ORDER BY ..] LIMIT ..`
//! - 分组层：`SELECT g, sum(c) as c[, sum(CASE WHEN p = 'v' THEN c END) as v_c] FROM t
//!   [WHERE ..] GROUP BY g [ORDER BY ..] LIMIT ..`

use std::collections::HashSet;
use tracing::debug;

use super::error::QueryError;
use super::pivot::{self, PivotDomains};
use super::plan::{Predicate, SelectItem, SelectPlan, SortKey};
use super::sql::{Alias, Dialect, Ident, Literal};
use crate::models::request::{AggFunc, ColumnType, ColumnVO, GetRowsRequest, GroupKey, SortDirection};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlQueryBuilder {
    dialect: Dialect,
}

impl SqlQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn create_sql(
        &self,
        request: &GetRowsRequest,
        table: &str,
        pivot_values: &PivotDomains,
    ) -> Result<String, QueryError> {
        let plan = self.plan(request, table, pivot_values)?;
        Ok(plan.to_sql(&self.dialect))
    }

    /// 不依赖透视取值域的全部调用方错误检查
    pub fn validate(&self, request: &GetRowsRequest, table: &str) -> Result<(), QueryError> {
        Ident::relation(table)?;
        if request.start_row > request.end_row {
            return Err(QueryError::InvalidRequest(format!(
                "startRow {} is after endRow {}",
                request.start_row, request.end_row
            )));
        }
        if request.group_keys.len() > request.row_group_cols.len() {
            return Err(QueryError::InvalidRequest(format!(
                "{} group keys for {} grouping columns",
                request.group_keys.len(),
                request.row_group_cols.len()
            )));
        }
        for col in request
            .row_group_cols
            .iter()
            .chain(&request.value_cols)
            .chain(&request.pivot_cols)
        {
            Ident::new(&col.field)?;
        }
        check_duplicates(request)?;
        group_key_predicates(request)?;
        filter_predicates(request)?;

        if !request.is_leaf_level() {
            for col in &request.value_cols {
                Ident::new(col.alias())?;
                agg_func(col)?;
            }
        } else {
            for sort in &request.sort_model {
                Ident::new(&sort.col_id)?;
            }
        }
        Ok(())
    }

    pub fn plan(
        &self,
        request: &GetRowsRequest,
        table: &str,
        pivot_values: &PivotDomains,
    ) -> Result<SelectPlan, QueryError> {
        self.validate(request, table)?;

        let mut predicates = group_key_predicates(request)?;
        predicates.extend(filter_predicates(request)?);

        let (items, group_by, order_by) = match request.next_group_col() {
            None => (vec![SelectItem::Wildcard], None, leaf_order_by(request)?),
            Some(group_col) => {
                let group = Ident::new(&group_col.field)?;
                let mut items = vec![SelectItem::Column(group.clone())];
                items.extend(value_items(request)?);
                if request.is_pivoting() {
                    items.extend(pivot_items(request, pivot_values)?);
                }
                check_output_names(&items)?;
                let order_by = grouped_order_by(request, group_col)?;
                (items, Some(group), order_by)
            }
        };

        Ok(SelectPlan {
            items,
            relation: Ident::relation(table)?,
            predicates,
            group_by,
            order_by,
            start_row: request.start_row,
            end_row: request.end_row,
        })
    }
}

/// 分组源列与值列别名不能重名
fn check_duplicates(request: &GetRowsRequest) -> Result<(), QueryError> {
    let mut seen = HashSet::new();
    let names = request
        .row_group_cols
        .iter()
        .map(|c| c.field.as_str())
        .chain(request.value_cols.iter().map(|c| c.alias()));
    for name in names {
        if !seen.insert(name) {
            return Err(QueryError::DuplicateColumn(name.to_string()));
        }
    }
    Ok(())
}

/// 结果行按字段名取值，同名输出列会互相覆盖
///
/// 透视合成名只有拿到取值域之后才知道，所以在构造计划时再查一遍。
fn check_output_names(items: &[SelectItem]) -> Result<(), QueryError> {
    let mut seen = HashSet::new();
    for name in items.iter().filter_map(SelectItem::output_name) {
        if !seen.insert(name) {
            return Err(QueryError::DuplicateColumn(name.to_string()));
        }
    }
    Ok(())
}

/// 已展开分组层级的等值条件
fn group_key_predicates(request: &GetRowsRequest) -> Result<Vec<Predicate>, QueryError> {
    request
        .row_group_cols
        .iter()
        .zip(&request.group_keys)
        .map(|(col, key)| Ok(Predicate::eq(Ident::new(&col.field)?, typed_literal(col, key)?)))
        .collect()
}

fn filter_predicates(request: &GetRowsRequest) -> Result<Vec<Predicate>, QueryError> {
    request
        .filter_model
        .iter()
        .map(|(column, filter)| filter.to_predicate(column))
        .collect()
}

/// 按列的语义类型渲染键值，类型不符是调用方错误
fn typed_literal(col: &ColumnVO, key: &GroupKey) -> Result<Literal, QueryError> {
    let mismatch = || QueryError::TypeMismatch {
        column: col.field.clone(),
        expected: col.data_type,
        value: key.to_string(),
    };
    match (col.data_type, key) {
        (ColumnType::Text, GroupKey::Text(s)) => Ok(Literal::text(s)),
        (ColumnType::Text, GroupKey::Number(_)) => Err(mismatch()),
        (ColumnType::Number, GroupKey::Number(n)) => Ok(Literal::json_number(n)),
        (ColumnType::Number, GroupKey::Text(s)) => Literal::parse_number(s).ok_or_else(mismatch),
    }
}

fn value_items(request: &GetRowsRequest) -> Result<Vec<SelectItem>, QueryError> {
    request
        .value_cols
        .iter()
        .map(|col| {
            Ok(SelectItem::Aggregate {
                func: agg_func(col)?,
                column: Ident::new(&col.field)?,
                alias: Ident::new(col.alias())?,
            })
        })
        .collect()
}

fn agg_func(col: &ColumnVO) -> Result<AggFunc, QueryError> {
    col.agg_func.ok_or_else(|| {
        QueryError::InvalidRequest(format!("value column '{}' has no aggregation function", col.field))
    })
}

/// 每个 (透视取值组合 × 值列) 一个条件聚合列
fn pivot_items(
    request: &GetRowsRequest,
    pivot_values: &PivotDomains,
) -> Result<Vec<SelectItem>, QueryError> {
    let combos = pivot::combinations(&request.pivot_cols, pivot_values).ok_or_else(|| {
        QueryError::InvalidRequest("pivot values missing for a pivot column".to_string())
    })?;
    if combos.is_empty() {
        debug!("透视取值域为空，退化为普通聚合");
    }

    let mut items = Vec::with_capacity(combos.len() * request.value_cols.len());
    for combo in &combos {
        let matches = request
            .pivot_cols
            .iter()
            .zip(combo)
            .map(|(col, value)| {
                let key = GroupKey::Text(value.to_string());
                Ok((Ident::new(&col.field)?, typed_literal(col, &key)?))
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        for value_col in &request.value_cols {
            items.push(SelectItem::Pivoted {
                func: agg_func(value_col)?,
                column: Ident::new(&value_col.field)?,
                matches: matches.clone(),
                alias: Alias::new(&pivot::secondary_field_name(combo, value_col.alias()))?,
            });
        }
    }
    Ok(items)
}

fn leaf_order_by(request: &GetRowsRequest) -> Result<Vec<(SortKey, SortDirection)>, QueryError> {
    request
        .sort_model
        .iter()
        .map(|s| Ok((SortKey::Column(Ident::new(&s.col_id)?), s.sort)))
        .collect()
}

/// 分组查询只能按分组列或值列排序，其余排序项跳过
fn grouped_order_by(
    request: &GetRowsRequest,
    group_col: &ColumnVO,
) -> Result<Vec<(SortKey, SortDirection)>, QueryError> {
    let mut keys = Vec::new();
    for sort in &request.sort_model {
        if group_col.is_referenced_by(&sort.col_id) {
            keys.push((SortKey::Column(Ident::new(&group_col.field)?), sort.sort));
        } else if let Some(value_col) = request.value_cols.iter().find(|c| c.is_referenced_by(&sort.col_id)) {
            keys.push((SortKey::Output(Ident::new(value_col.alias())?), sort.sort));
        } else {
            debug!("分组层忽略排序列 {}", sort.col_id);
        }
    }
    Ok(keys)
}
