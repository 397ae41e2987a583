use super::pivot::{secondary_column_fields, PivotDomains};
use crate::models::request::GetRowsRequest;
use crate::models::response::{GetRowsResponse, Row};

/// 把查询结果整理成表格端的响应
///
/// 分组与透视展开都已在 SQL 里完成，这里只补充合成列名和总行数。
pub fn create_response(
    request: &GetRowsRequest,
    rows: Vec<Row>,
    pivot_values: &PivotDomains,
) -> GetRowsResponse {
    let last_row = last_row(request, rows.len());
    GetRowsResponse {
        data: rows,
        last_row,
        secondary_column_fields: secondary_column_fields(request, pivot_values),
    }
}

/// 返回行数不足一页时总数已知
fn last_row(request: &GetRowsRequest, returned: usize) -> Option<usize> {
    (returned < request.window_size()).then(|| request.start_row + returned)
}
