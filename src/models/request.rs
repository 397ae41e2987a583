use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::filter::ColumnFilter;

/// 列的语义类型，决定分组键与透视值按数字还是字符串渲染
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Number => write!(f, "number"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl AggFunc {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
        }
    }
}

impl FromStr for AggFunc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(AggFunc::Sum),
            "avg" => Ok(AggFunc::Avg),
            "min" => Ok(AggFunc::Min),
            "max" => Ok(AggFunc::Max),
            "count" => Ok(AggFunc::Count),
            other => Err(format!("unsupported aggregation function '{}'", other)),
        }
    }
}

// 表格端对"无聚合"会发送空串或 null
fn agg_func_or_none<'de, D>(deserializer: D) -> Result<Option<AggFunc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// 列引用：分组列、值列、透视列共用
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnVO {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// 物理表中的源列名
    pub field: String,
    #[serde(default, deserialize_with = "agg_func_or_none")]
    pub agg_func: Option<AggFunc>,
    #[serde(default)]
    pub data_type: ColumnType,
}

impl ColumnVO {
    pub fn new(id: &str, display_name: &str, field: &str, agg_func: Option<AggFunc>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            field: field.to_string(),
            agg_func,
            data_type: ColumnType::Text,
        }
    }

    pub fn with_type(mut self, data_type: ColumnType) -> Self {
        self.data_type = data_type;
        self
    }

    /// 聚合结果的输出别名，未给出展示名时退回源列名
    pub fn alias(&self) -> &str {
        if self.display_name.is_empty() {
            &self.field
        } else {
            &self.display_name
        }
    }

    /// 排序模型里的 colId 是否指向该列
    pub fn is_referenced_by(&self, col_id: &str) -> bool {
        col_id == self.id || col_id == self.field || col_id == self.alias()
    }
}

/// 已展开分组路径上的一个键值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupKey {
    Number(serde_json::Number),
    Text(String),
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        GroupKey::Text(value.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        GroupKey::Text(value)
    }
}

impl From<i64> for GroupKey {
    fn from(value: i64) -> Self {
        GroupKey::Number(value.into())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Number(n) => write!(f, "{}", n),
            GroupKey::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortModel {
    pub col_id: String,
    pub sort: SortDirection,
}

impl SortModel {
    pub fn new(col_id: &str, sort: SortDirection) -> Self {
        Self {
            col_id: col_id.to_string(),
            sort,
        }
    }
}

/// 表格一次取数请求的完整描述
///
/// 分页窗口为半开区间 `[start_row, end_row)`；`group_keys[i]` 对应
/// `row_group_cols[i]`。过滤模型按列名有序存放，保证生成的 SQL 稳定。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetRowsRequest {
    pub start_row: usize,
    pub end_row: usize,
    pub row_group_cols: Vec<ColumnVO>,
    pub value_cols: Vec<ColumnVO>,
    pub pivot_cols: Vec<ColumnVO>,
    pub group_keys: Vec<GroupKey>,
    pub filter_model: BTreeMap<String, ColumnFilter>,
    pub sort_model: Vec<SortModel>,
}

impl GetRowsRequest {
    /// 没有分组，或者调用方已经展开到最后一层分组之下
    pub fn is_leaf_level(&self) -> bool {
        self.row_group_cols.is_empty() || self.group_keys.len() >= self.row_group_cols.len()
    }

    /// 本次请求要查询的分组列
    pub fn next_group_col(&self) -> Option<&ColumnVO> {
        if self.is_leaf_level() {
            None
        } else {
            self.row_group_cols.get(self.group_keys.len())
        }
    }

    /// 只有分组层级的请求才需要透视列展开
    pub fn is_pivoting(&self) -> bool {
        !self.pivot_cols.is_empty() && !self.is_leaf_level()
    }

    pub fn window_size(&self) -> usize {
        self.end_row.saturating_sub(self.start_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_grid_payload() {
        let request: GetRowsRequest = serde_json::from_value(json!({
            "startRow": 0,
            "endRow": 100,
            "rowGroupCols": [{ "id": "country", "displayName": "Country", "field": "country" }],
            "valueCols": [{ "id": "gold", "displayName": "gold", "field": "gold", "aggFunc": "sum" }],
            "pivotCols": [],
            "groupKeys": ["Ireland", 2012],
            "filterModel": { "sport": { "filterType": "set", "values": ["Rowing"] } },
            "sortModel": [{ "colId": "gold", "sort": "desc" }]
        }))
        .unwrap();

        assert_eq!(request.end_row, 100);
        assert_eq!(request.row_group_cols[0].agg_func, None);
        assert_eq!(request.value_cols[0].agg_func, Some(AggFunc::Sum));
        assert_eq!(request.group_keys[0], GroupKey::from("Ireland"));
        assert_eq!(request.group_keys[1], GroupKey::from(2012_i64));
        assert_eq!(request.sort_model[0].sort, SortDirection::Desc);
        assert!(request.filter_model.contains_key("sport"));
    }

    #[test]
    fn empty_agg_func_is_none() {
        let col: ColumnVO =
            serde_json::from_value(json!({ "field": "athlete", "aggFunc": "" })).unwrap();
        assert_eq!(col.agg_func, None);
        assert_eq!(col.alias(), "athlete");
        assert_eq!(col.data_type, ColumnType::Text);
    }

    #[test]
    fn unknown_agg_func_is_rejected() {
        let res = serde_json::from_value::<ColumnVO>(json!({ "field": "gold", "aggFunc": "median" }));
        assert!(res.is_err());
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let request: GetRowsRequest =
            serde_json::from_value(json!({ "startRow": 5, "endRow": 10 })).unwrap();
        assert!(request.is_leaf_level());
        assert!(!request.is_pivoting());
        assert_eq!(request.window_size(), 5);
    }

    #[test]
    fn leaf_level_after_last_group_key() {
        let mut request = GetRowsRequest {
            row_group_cols: vec![ColumnVO::new("a", "a", "a", None)],
            ..Default::default()
        };
        assert!(!request.is_leaf_level());
        assert_eq!(request.next_group_col().map(|c| c.field.as_str()), Some("a"));

        request.group_keys.push("x".into());
        assert!(request.is_leaf_level());
        assert!(request.next_group_col().is_none());
    }
}
