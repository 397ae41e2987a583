use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// 一行结果：输出字段名 -> 值
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRowsResponse {
    pub data: Vec<Row>,
    /// 总行数已知时给出，未知时在线上写作 -1
    #[serde(serialize_with = "last_row_or_unknown")]
    pub last_row: Option<usize>,
    pub secondary_column_fields: Vec<String>,
}

fn last_row_or_unknown<S: Serializer>(value: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(n) => s.serialize_u64(*n as u64),
        None => s.serialize_i64(-1),
    }
}
